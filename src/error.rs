//! Error types for the dprl crate

use thiserror::Error;

/// Main error type for the dprl crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("horizon must cover at least one time step")]
    InvalidHorizon,

    #[error("discount factor {discount} must lie strictly between 0 and 1")]
    InvalidDiscount { discount: f64 },

    #[error("{solver} requires {required}, but the decision process declares {found}")]
    HorizonMismatch {
        solver: &'static str,
        required: &'static str,
        found: String,
    },

    #[error("action {action} is not valid in state {state}")]
    InvalidAction { action: usize, state: String },

    #[error("state {state} has no valid actions")]
    NoValidActions { state: String },

    #[error("no policy available: call solve() before compute_action()")]
    NotSolved,

    #[error("value iteration did not converge within {iterations} sweeps (residual {residual:.3e})")]
    NotConverged { iterations: usize, residual: f64 },

    #[error("step-size exponent {alpha} must lie in (0, 1]")]
    InvalidStepSize { alpha: f64 },

    #[error("epsilon {epsilon} must lie in [0, 1]")]
    InvalidEpsilon { epsilon: f64 },

    #[error("invalid epsilon schedule: {message}")]
    InvalidEpsilonSchedule { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("{feature} is not supported")]
    NotSupported { feature: String },

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedSnapshotVersion { found: u32, expected: u32 },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to {operation}: {message}")]
    SerializationContext { operation: String, message: String },
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
