//! Fixed-point solver for discounted processes

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mdp::{Horizon, Mdp};
use crate::planning::{Planner, greedy_backup};

/// Convergence record of a value-iteration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    /// Number of full sweeps performed.
    pub iterations: usize,
    /// Max-norm change of the final sweep.
    pub residual: f64,
}

impl SolveStats {
    /// Save the stats to a JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load stats from a JSON file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let stats = serde_json::from_reader(file)?;
        Ok(stats)
    }
}

/// Value iteration for discounted, infinite-horizon processes.
///
/// Sweeps the Bellman optimality operator over the full state space until
/// the value function moves by less than `precision * (1 - gamma) / gamma`
/// in the max norm. The contraction property of the operator then guarantees
/// the result lies within `precision` of the true optimum, and the greedy
/// policy is extracted from that fixed point.
#[derive(Debug, Clone)]
pub struct ValueIteration {
    precision: f64,
    max_iterations: usize,
    values: Option<Array1<f64>>,
    policy: Option<Vec<usize>>,
    stats: Option<SolveStats>,
}

impl ValueIteration {
    /// Default cap on the number of sweeps before giving up.
    pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

    /// Create a solver targeting the given approximation precision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless `precision` is a
    /// positive finite number.
    pub fn new(precision: f64) -> Result<Self> {
        if !(precision.is_finite() && precision > 0.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("precision {precision} must be positive and finite"),
            });
        }
        Ok(Self {
            precision,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            values: None,
            policy: None,
            stats: None,
        })
    }

    /// Override the sweep cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Iterate to the fixed point and extract the greedy policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HorizonMismatch`] for finite-horizon processes,
    /// [`Error::InvalidDiscount`] when the declared discount does not lie
    /// strictly between 0 and 1, and [`Error::NotConverged`] when the sweep
    /// cap is reached before the stopping condition holds.
    pub fn solve<M: Mdp>(&mut self, mdp: &M) -> Result<()> {
        let discount = match mdp.horizon() {
            Horizon::Discounted(discount) => discount,
            horizon @ Horizon::Finite(_) => {
                return Err(Error::HorizonMismatch {
                    solver: "value iteration",
                    required: "a discounted horizon",
                    found: horizon.to_string(),
                });
            }
        };
        // The stopping bound divides by the discount, so reject degenerate
        // values even when the Horizon was built by hand.
        if !(discount > 0.0 && discount < 1.0) {
            return Err(Error::InvalidDiscount { discount });
        }

        let states = mdp.states();
        let tolerance = self.precision * (1.0 - discount) / discount;
        let mut values = Array1::zeros(states.len());
        let mut iterations = 0;
        let mut residual = f64::INFINITY;

        while residual >= tolerance {
            if iterations == self.max_iterations {
                return Err(Error::NotConverged {
                    iterations,
                    residual,
                });
            }
            let mut updated = Array1::zeros(states.len());
            for (index, state) in states.iter().enumerate() {
                let (_, value) = greedy_backup(mdp, state, values.view());
                updated[index] = value;
            }
            residual = updated
                .iter()
                .zip(values.iter())
                .map(|(new, old)| (new - old).abs())
                .fold(0.0, f64::max);
            values = updated;
            iterations += 1;
        }

        let policy = states
            .iter()
            .map(|state| greedy_backup(mdp, state, values.view()).0)
            .collect();

        self.values = Some(values);
        self.policy = Some(policy);
        self.stats = Some(SolveStats {
            iterations,
            residual,
        });
        Ok(())
    }

    /// Greedy action for `state` under the solved stationary policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSolved`] before a successful
    /// [`solve`](ValueIteration::solve).
    pub fn compute_action<M: Mdp>(&self, mdp: &M, state: &M::State) -> Result<usize> {
        let policy = self.policy.as_ref().ok_or(Error::NotSolved)?;
        Ok(policy[mdp.state_index(state)])
    }

    /// Solved value function, one entry per state.
    #[must_use]
    pub fn values(&self) -> Option<&Array1<f64>> {
        self.values.as_ref()
    }

    /// Solved stationary policy, one action per state.
    #[must_use]
    pub fn policy(&self) -> Option<&[usize]> {
        self.policy.as_deref()
    }

    /// Convergence record of the last successful solve.
    #[must_use]
    pub fn stats(&self) -> Option<SolveStats> {
        self.stats
    }
}

impl<M: Mdp> Planner<M> for ValueIteration {
    fn solve(&mut self, mdp: &M) -> Result<()> {
        ValueIteration::solve(self, mdp)
    }

    fn is_solved(&self) -> bool {
        self.policy.is_some()
    }
}
