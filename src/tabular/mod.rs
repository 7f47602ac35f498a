//! Q-learning and SARSA over dense Q-tables
//!
//! This module implements tabular temporal difference (TD) control for
//! processes small enough to enumerate. TD methods bootstrap value estimates
//! from successor states, so they learn during the episode instead of
//! waiting for its return.
//!
//! ## Algorithms
//!
//! - **Q-learning**: off-policy TD control that learns optimal Q* values
//! - **SARSA**: on-policy TD control that learns Q^pi for the followed policy
//!
//! ## Key Differences
//!
//! | Aspect | Q-learning | SARSA |
//! |--------|------------|-------|
//! | Policy | Off-policy (learns Q*) | On-policy (learns Q^pi) |
//! | Bootstrap | max over valid next actions | the action actually taken next |
//! | Exploration | Can be reckless | More conservative |
//! | Convergence | To the optimal policy | To the followed policy |
//!
//! Both agents share the same update mechanics: per-pair visit counts drive
//! a `1 / n^alpha` step size, and behavior is epsilon-greedy under an
//! [`EpsilonSchedule`](crate::schedule::EpsilonSchedule) evaluated per
//! episode.

pub mod q_learning;
pub mod sarsa;
pub mod serialization;
pub mod table;

// Public re-exports
pub use q_learning::QLearningAgent;
pub use sarsa::SarsaAgent;
pub use serialization::{SavedTabularAgent, TabularAlgorithm, TabularLearner};
pub use table::QTable;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schedule::EpsilonSchedule;
use crate::utils::random_decide;

/// Shared construction parameters of the tabular agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabularConfig {
    /// Step-size exponent: updates use `1 / n(s, a)^alpha`.
    pub alpha: f64,
    /// Initial Q-value for every state-action pair.
    pub q_init: f64,
    /// Exploration schedule.
    pub epsilon: EpsilonSchedule,
    /// Seed for the agent's own generator. `None` draws fresh entropy.
    pub seed: Option<u64>,
}

impl TabularConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step-size exponent.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the initial Q-value.
    #[must_use]
    pub fn with_q_init(mut self, q_init: f64) -> Self {
        self.q_init = q_init;
        self
    }

    /// Set the exploration schedule.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: EpsilonSchedule) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the seed for the agent's generator.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(crate::error::Error::InvalidStepSize { alpha: self.alpha });
        }
        self.epsilon.validate()
    }
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            alpha: 2.0 / 3.0,
            q_init: 0.0,
            epsilon: EpsilonSchedule::Constant(0.1),
            seed: None,
        }
    }
}

/// Epsilon-greedy selection over the valid actions of one state.
///
/// Explores uniformly with probability `epsilon`, otherwise exploits the
/// table's greedy action.
pub(crate) fn epsilon_greedy<R>(
    table: &QTable,
    rng: &mut R,
    epsilon: f64,
    state_index: usize,
    valid_actions: &[usize],
) -> usize
where
    R: Rng + ?Sized,
{
    if random_decide(rng, epsilon) {
        *valid_actions
            .choose(rng)
            .expect("at least one valid action")
    } else {
        table.greedy_action(state_index, valid_actions)
    }
}
