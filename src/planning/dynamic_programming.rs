//! Backward-induction solver for finite-horizon processes

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::mdp::{Horizon, Mdp};
use crate::planning::{Planner, greedy_backup};

/// Exact finite-horizon solver.
///
/// Backward induction fills the value function from the terminal layer down
/// to time step 0. The terminal layer holds the best immediately collectable
/// mean reward per state; every earlier layer is a Bellman backup against the
/// layer above it. Because the optimal behavior depends on how many steps
/// remain, the resulting policy is indexed by time step as well as state.
#[derive(Debug, Clone, Default)]
pub struct DynamicProgramming {
    values: Option<Array2<f64>>,
    policy: Option<Array2<usize>>,
}

impl DynamicProgramming {
    /// Create an unsolved solver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run backward induction over the full horizon.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HorizonMismatch`] for discounted processes and
    /// [`Error::InvalidHorizon`] for a zero-step horizon.
    pub fn solve<M: Mdp>(&mut self, mdp: &M) -> Result<()> {
        let steps = match mdp.horizon() {
            Horizon::Finite(steps) => steps,
            horizon @ Horizon::Discounted(_) => {
                return Err(Error::HorizonMismatch {
                    solver: "dynamic programming",
                    required: "a finite horizon",
                    found: horizon.to_string(),
                });
            }
        };
        if steps == 0 {
            return Err(Error::InvalidHorizon);
        }

        let states = mdp.states();
        let n_states = states.len();
        let mut values = Array2::zeros((steps + 1, n_states));
        let mut policy = Array2::zeros((steps, n_states));

        // Terminal layer: the best reward still collectable in one decision.
        for (index, state) in states.iter().enumerate() {
            let valid = mdp.valid_actions(state);
            assert!(
                !valid.is_empty(),
                "state {state:?} must offer at least one valid action"
            );
            values[[steps, index]] = valid
                .into_iter()
                .map(|action| mdp.mean_reward(state, action))
                .fold(f64::NEG_INFINITY, f64::max);
        }

        for time_step in (0..steps).rev() {
            let next_values = values.row(time_step + 1).to_owned();
            for (index, state) in states.iter().enumerate() {
                let (action, value) = greedy_backup(mdp, state, next_values.view());
                values[[time_step, index]] = value;
                policy[[time_step, index]] = action;
            }
        }

        self.values = Some(values);
        self.policy = Some(policy);
        Ok(())
    }

    /// Optimal action for `state` at `time_step`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSolved`] before a successful
    /// [`solve`](DynamicProgramming::solve).
    ///
    /// # Panics
    ///
    /// Panics when `time_step` lies outside the solved horizon.
    pub fn compute_action<M: Mdp>(
        &self,
        mdp: &M,
        state: &M::State,
        time_step: usize,
    ) -> Result<usize> {
        let policy = self.policy.as_ref().ok_or(Error::NotSolved)?;
        assert!(
            time_step < policy.nrows(),
            "time step {time_step} is outside the planning horizon of {} steps",
            policy.nrows()
        );
        Ok(policy[[time_step, mdp.state_index(state)]])
    }

    /// Solved value function, laid out as `(steps + 1) x n_states`.
    ///
    /// Row `t` holds the optimal expected return from time step `t` on; the
    /// last row is the terminal layer.
    #[must_use]
    pub fn values(&self) -> Option<&Array2<f64>> {
        self.values.as_ref()
    }

    /// Solved policy, laid out as `steps x n_states`.
    #[must_use]
    pub fn policy(&self) -> Option<&Array2<usize>> {
        self.policy.as_ref()
    }
}

impl<M: Mdp> Planner<M> for DynamicProgramming {
    fn solve(&mut self, mdp: &M) -> Result<()> {
        DynamicProgramming::solve(self, mdp)
    }

    fn is_solved(&self) -> bool {
        self.policy.is_some()
    }
}
