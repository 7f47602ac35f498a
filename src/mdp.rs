//! Core contracts for finite Markov decision processes
//!
//! A [`Mdp`] exposes the model quantities the exact solvers consume: the
//! finite state space, per-state valid actions, mean rewards, and transition
//! distributions. An [`Environment`] is an `Mdp` that can additionally be
//! interacted with step by step, which is what the learning agents train
//! against.
//!
//! Keeping the two as separate capability sets lets planners accept models
//! that cannot be simulated, and keeps the simulation surface (`reset`,
//! `step`, `seed`) off the solvers entirely.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Time-horizon declaration of a decision process.
///
/// A process is either episodic with a fixed number of steps, or continuing
/// with a discount factor. The two are mutually exclusive by construction:
/// there is no way to hold both a step count and a discount at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    /// Episodic task that ends after exactly this many time steps.
    Finite(usize),
    /// Continuing task with rewards discounted by this factor per step.
    Discounted(f64),
}

impl Horizon {
    /// Finite horizon of `steps` time steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHorizon`] when `steps` is zero.
    pub fn finite(steps: usize) -> Result<Self> {
        if steps == 0 {
            return Err(Error::InvalidHorizon);
        }
        Ok(Horizon::Finite(steps))
    }

    /// Infinite horizon discounted by `discount` per step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDiscount`] unless `discount` lies strictly
    /// between 0 and 1.
    pub fn discounted(discount: f64) -> Result<Self> {
        if !(discount > 0.0 && discount < 1.0) {
            return Err(Error::InvalidDiscount { discount });
        }
        Ok(Horizon::Discounted(discount))
    }

    /// Discount factor applied to successor values.
    ///
    /// Finite-horizon tasks are undiscounted, so this is 1.0 for them.
    pub fn discount(&self) -> f64 {
        match self {
            Horizon::Finite(_) => 1.0,
            Horizon::Discounted(discount) => *discount,
        }
    }

    /// Number of time steps for finite horizons, `None` otherwise.
    pub fn steps(&self) -> Option<usize> {
        match self {
            Horizon::Finite(steps) => Some(*steps),
            Horizon::Discounted(_) => None,
        }
    }

    /// Whether this is an episodic, fixed-length horizon.
    pub fn is_finite(&self) -> bool {
        matches!(self, Horizon::Finite(_))
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Finite(steps) => write!(f, "a finite horizon of {steps} steps"),
            Horizon::Discounted(discount) => {
                write!(f, "a discounted horizon (discount = {discount})")
            }
        }
    }
}

/// Outcome of a single environment transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<S> {
    /// State the environment moved to.
    pub state: S,
    /// Reward observed for the transition.
    pub reward: f64,
    /// Whether the episode ended with this transition.
    pub done: bool,
}

/// One observed transition, as consumed by the learning agents.
///
/// The episode index is carried along so that on-policy updates can evaluate
/// the exploration schedule at the episode the transition came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience<S> {
    /// 1-based index of the episode this transition belongs to.
    pub episode: u32,
    /// State the action was taken in.
    pub state: S,
    /// Action code that was taken.
    pub action: usize,
    /// Reward observed for the transition.
    pub reward: f64,
    /// State the environment moved to.
    pub next_state: S,
    /// Whether the episode ended with this transition.
    pub done: bool,
}

/// Model-side contract of a finite Markov decision process.
///
/// # Contract
///
/// Implementations must uphold the following, which the solvers rely on and
/// do not re-check on every call:
///
/// - [`states`](Mdp::states) enumerates every reachable state exactly once,
///   and [`state_index`](Mdp::state_index) maps each of those states to its
///   position in that slice.
/// - [`valid_actions`](Mdp::valid_actions) is non-empty for every state in
///   [`states`](Mdp::states). Absorbing states expose a self-loop action
///   rather than an empty action set.
/// - The probabilities returned by [`next_states`](Mdp::next_states) sum
///   to 1.
/// - [`mean_reward`](Mdp::mean_reward) is the expectation of the reward, free
///   of any sampling noise. Noisy realizations belong in
///   [`Environment::step`].
pub trait Mdp {
    /// State representation. Small value types such as grid coordinates work
    /// well.
    type State: Clone + PartialEq + fmt::Debug;

    /// All states of the process, in index order.
    fn states(&self) -> &[Self::State];

    /// Action codes available in `state`. Never empty for a valid state.
    fn valid_actions(&self, state: &Self::State) -> Vec<usize>;

    /// Expected one-step reward for taking `action` in `state`.
    ///
    /// # Panics
    ///
    /// May panic when `action` is not valid in `state`.
    fn mean_reward(&self, state: &Self::State, action: usize) -> f64;

    /// Successor states and their transition probabilities for taking
    /// `action` in `state`.
    fn next_states(&self, state: &Self::State, action: usize) -> (Vec<Self::State>, Vec<f64>);

    /// Dense index of `state`, equal to its position in [`states`](Mdp::states).
    fn state_index(&self, state: &Self::State) -> usize;

    /// Horizon declaration of the process.
    fn horizon(&self) -> Horizon;

    /// Number of states.
    fn n_states(&self) -> usize {
        self.states().len()
    }

    /// Size of the dense action space, i.e. one past the largest action code
    /// any state declares valid.
    fn n_actions(&self) -> usize {
        self.states()
            .iter()
            .flat_map(|state| self.valid_actions(state))
            .max()
            .map_or(0, |max_action| max_action + 1)
    }
}

/// A decision process that can be simulated step by step.
///
/// Learning agents interact with the process exclusively through this
/// surface; they never read the transition model directly.
pub trait Environment: Mdp {
    /// Reset to an initial state and return it.
    fn reset(&mut self) -> Self::State;

    /// Apply `action` to the current state.
    ///
    /// The reward in the returned [`Step`] is a sample; its expectation over
    /// the environment's noise must equal
    /// [`mean_reward`](Mdp::mean_reward) for the same state and action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAction`] when `action` is not valid in the
    /// current state. Invalid actions are rejected, never clamped to a legal
    /// one.
    fn step(&mut self, action: usize) -> Result<Step<Self::State>>;

    /// Reseed the environment's own randomness (transition noise, reward
    /// noise). Does not affect any agent's generator.
    fn seed(&mut self, seed: u64);
}
