//! Exact planning for finite Markov decision processes
//!
//! When the transition model is known, an optimal policy can be computed
//! without any interaction. This module implements the two classic exact
//! solvers, one per horizon kind.
//!
//! ## Solvers
//!
//! - **Dynamic programming**: backward induction for finite-horizon tasks,
//!   producing a time-dependent policy
//! - **Value iteration**: fixed-point iteration for discounted tasks,
//!   producing a stationary policy
//!
//! ## Key Differences
//!
//! | Aspect | Dynamic programming | Value iteration |
//! |--------|---------------------|-----------------|
//! | Horizon | Finite, `T` steps | Discounted, infinite |
//! | Policy | One action per (step, state) | One action per state |
//! | Termination | Exactly `T` sweeps | Convergence of the value function |
//! | Guarantee | Exact optimum | Within `precision` of the optimum |
//!
//! ## Usage Example
//!
//! ```
//! use dprl::mdp::{Horizon, Mdp};
//! use dprl::planning::DynamicProgramming;
//!
//! // Two-cell corridor: action 0 stays put at a small cost, action 1 moves
//! // right into the absorbing goal cell and pays 1.
//! struct Corridor {
//!     states: Vec<usize>,
//! }
//!
//! impl Mdp for Corridor {
//!     type State = usize;
//!
//!     fn states(&self) -> &[usize] {
//!         &self.states
//!     }
//!
//!     fn valid_actions(&self, state: &usize) -> Vec<usize> {
//!         if *state == 1 { vec![0] } else { vec![0, 1] }
//!     }
//!
//!     fn mean_reward(&self, state: &usize, action: usize) -> f64 {
//!         match (*state, action) {
//!             (0, 1) => 1.0,
//!             (0, 0) => -0.1,
//!             _ => 0.0,
//!         }
//!     }
//!
//!     fn next_states(&self, state: &usize, action: usize) -> (Vec<usize>, Vec<f64>) {
//!         let next = if action == 1 { *state + 1 } else { *state };
//!         (vec![next], vec![1.0])
//!     }
//!
//!     fn state_index(&self, state: &usize) -> usize {
//!         *state
//!     }
//!
//!     fn horizon(&self) -> Horizon {
//!         Horizon::Finite(3)
//!     }
//! }
//!
//! let mdp = Corridor { states: vec![0, 1] };
//! let mut solver = DynamicProgramming::new();
//! solver.solve(&mdp)?;
//! assert_eq!(solver.compute_action(&mdp, &0, 0)?, 1);
//! # Ok::<(), dprl::Error>(())
//! ```

pub mod dynamic_programming;
pub mod value_iteration;

// Public re-exports
pub use dynamic_programming::DynamicProgramming;
pub use value_iteration::{SolveStats, ValueIteration};

use ndarray::ArrayView1;

use crate::error::Result;
use crate::mdp::Mdp;

/// A solver that computes a policy from the transition model alone.
pub trait Planner<M: Mdp> {
    /// Solve the process, storing the value function and policy internally.
    fn solve(&mut self, mdp: &M) -> Result<()>;

    /// Whether [`solve`](Planner::solve) has completed successfully.
    fn is_solved(&self) -> bool;
}

/// One-step lookahead value of taking `action` in `state`, given the value
/// function `values` over successor states.
///
/// This is the Bellman backup `r(s, a) + gamma * sum_s' P(s' | s, a) V(s')`,
/// with `gamma` equal to 1 for finite-horizon processes.
pub fn q_value<M: Mdp>(
    mdp: &M,
    state: &M::State,
    action: usize,
    values: ArrayView1<'_, f64>,
) -> f64 {
    let (next_states, probabilities) = mdp.next_states(state, action);
    let continuation: f64 = next_states
        .iter()
        .zip(&probabilities)
        .map(|(next_state, probability)| probability * values[mdp.state_index(next_state)])
        .sum();
    mdp.mean_reward(state, action) + mdp.horizon().discount() * continuation
}

/// Best action and its backup value for `state`, with ties broken toward the
/// lowest action code.
pub(crate) fn greedy_backup<M: Mdp>(
    mdp: &M,
    state: &M::State,
    values: ArrayView1<'_, f64>,
) -> (usize, f64) {
    let mut best: Option<(usize, f64)> = None;
    for action in mdp.valid_actions(state) {
        let value = q_value(mdp, state, action, values);
        best = match best {
            None => Some((action, value)),
            Some((best_action, best_value))
                if value > best_value || (value == best_value && action < best_action) =>
            {
                Some((action, value))
            }
            other => other,
        };
    }
    best.expect("every state must offer at least one valid action")
}
