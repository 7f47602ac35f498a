//! Exploration-rate schedules for epsilon-greedy agents
//!
//! Every learning agent in this crate explores with probability epsilon and
//! exploits otherwise. [`EpsilonSchedule`] captures the supported ways of
//! driving that probability over the course of training. Schedules are
//! validated once at agent construction, so a malformed schedule fails before
//! any training step runs.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Exploration-rate schedule, evaluated per episode.
///
/// Episodes are 1-based: the first training episode queries
/// [`epsilon(1)`](EpsilonSchedule::epsilon).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// The same exploration rate for every episode.
    Constant(f64),
    /// Linear interpolation from `max` at episode 1 down to `min` at episode
    /// `decay_episodes`, constant at `min` afterwards.
    LinearDecay {
        max: f64,
        min: f64,
        decay_episodes: u32,
    },
    /// Polynomial decay `1 / episode^exponent`.
    ///
    /// Exponents in (1/2, 1] satisfy the classic stochastic-approximation
    /// conditions; the full (0, 1] range is accepted.
    PowerDecay { exponent: f64 },
}

impl EpsilonSchedule {
    /// Check the schedule parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEpsilon`] when a rate falls outside [0, 1] and
    /// [`Error::InvalidEpsilonSchedule`] when the shape parameters are
    /// inconsistent.
    pub fn validate(&self) -> Result<()> {
        match *self {
            EpsilonSchedule::Constant(epsilon) => check_rate(epsilon),
            EpsilonSchedule::LinearDecay {
                max,
                min,
                decay_episodes,
            } => {
                check_rate(max)?;
                check_rate(min)?;
                if min > max {
                    return Err(Error::InvalidEpsilonSchedule {
                        message: format!("min {min} exceeds max {max}"),
                    });
                }
                if decay_episodes < 2 {
                    return Err(Error::InvalidEpsilonSchedule {
                        message: format!(
                            "decay must span at least 2 episodes, got {decay_episodes}"
                        ),
                    });
                }
                Ok(())
            }
            EpsilonSchedule::PowerDecay { exponent } => {
                if !(exponent > 0.0 && exponent <= 1.0) {
                    return Err(Error::InvalidEpsilonSchedule {
                        message: format!("exponent {exponent} must lie in (0, 1]"),
                    });
                }
                Ok(())
            }
        }
    }

    /// Exploration rate for a 1-based episode index.
    ///
    /// # Panics
    ///
    /// Panics when `episode` is 0.
    pub fn epsilon(&self, episode: u32) -> f64 {
        assert!(episode >= 1, "episode indices are 1-based");
        match *self {
            EpsilonSchedule::Constant(epsilon) => epsilon,
            EpsilonSchedule::LinearDecay {
                max,
                min,
                decay_episodes,
            } => {
                if episode >= decay_episodes {
                    min
                } else {
                    let progress = f64::from(episode - 1) / f64::from(decay_episodes - 1);
                    max - (max - min) * progress
                }
            }
            EpsilonSchedule::PowerDecay { exponent } => 1.0 / f64::from(episode).powf(exponent),
        }
    }
}

fn check_rate(epsilon: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(Error::InvalidEpsilon { epsilon });
    }
    Ok(())
}
