//! Dense Q-table with visit-driven step sizes

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Q-table over dense state and action indices.
///
/// Q-values live in an `n_states x n_actions` array alongside a visit
/// counter per pair. The step size of an update is derived from the visit
/// count as `1 / n(s, a)^alpha`; the count is read before it is bumped, so
/// the first update of a pair runs at the full step size of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    /// Q-values, indexed `[state, action]`
    values: Array2<f64>,
    /// Visit counts, indexed `[state, action]`
    visits: Array2<u64>,
    /// Step-size exponent alpha
    alpha: f64,
    /// Initial Q-value for every pair
    q_init: f64,
}

impl QTable {
    /// Create a table with every Q-value at `q_init` and every visit count
    /// at 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStepSize`] when `alpha` falls outside (0, 1]
    /// and [`Error::InvalidConfiguration`] for empty dimensions.
    pub fn new(n_states: usize, n_actions: usize, alpha: f64, q_init: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::InvalidStepSize { alpha });
        }
        if n_states == 0 || n_actions == 0 {
            return Err(Error::InvalidConfiguration {
                message: format!("table dimensions {n_states} x {n_actions} must be positive"),
            });
        }
        Ok(Self {
            values: Array2::from_elem((n_states, n_actions), q_init),
            visits: Array2::ones((n_states, n_actions)),
            alpha,
            q_init,
        })
    }

    /// Number of states the table covers.
    pub fn n_states(&self) -> usize {
        self.values.nrows()
    }

    /// Number of action codes the table covers.
    pub fn n_actions(&self) -> usize {
        self.values.ncols()
    }

    /// Step-size exponent.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Get the Q-value of a state-action pair.
    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.values[[state, action]]
    }

    /// Set the Q-value of a state-action pair.
    pub fn set(&mut self, state: usize, action: usize, value: f64) {
        self.values[[state, action]] = value;
    }

    /// Visit count of a state-action pair. Starts at 1.
    pub fn visits(&self, state: usize, action: usize) -> u64 {
        self.visits[[state, action]]
    }

    /// Step size the next update of this pair will use.
    pub fn step_size(&self, state: usize, action: usize) -> f64 {
        1.0 / (self.visits[[state, action]] as f64).powf(self.alpha)
    }

    /// Maximum Q-value over the valid actions of a state.
    pub fn max_q(&self, state: usize, valid_actions: &[usize]) -> f64 {
        valid_actions
            .iter()
            .map(|&action| self.get(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Action with the highest Q-value among `valid_actions`, ties broken
    /// toward the lowest action code.
    ///
    /// # Panics
    ///
    /// Panics when `valid_actions` is empty.
    pub fn greedy_action(&self, state: usize, valid_actions: &[usize]) -> usize {
        let mut best: Option<(usize, f64)> = None;
        for &action in valid_actions {
            let value = self.get(state, action);
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
        best.map(|(action, _)| action)
            .expect("at least one valid action")
    }

    /// Move the pair's Q-value toward `target` and bump its visit count.
    ///
    /// The step size is computed from the count before the bump:
    /// `Q(s,a) += (target - Q(s,a)) / n(s,a)^alpha`.
    pub fn td_update(&mut self, state: usize, action: usize, target: f64) {
        let step_size = self.step_size(state, action);
        let current = self.values[[state, action]];
        self.values[[state, action]] = current + step_size * (target - current);
        self.visits[[state, action]] += 1;
    }

    /// Restore every Q-value to `q_init` and every visit count to 1.
    pub fn reset(&mut self) {
        self.values.fill(self.q_init);
        self.visits.fill(1);
    }
}
