//! Deep Q-learning with experience replay and a target network
//!
//! The tabular agents index values by state; the agent here generalizes
//! across states through a function approximator instead, so it applies when
//! the state space is too large to enumerate. Training follows the classic
//! recipe: epsilon-greedy behavior, uniform minibatch sampling from a replay
//! buffer, and bootstrap targets computed from a frozen copy of the network
//! that is refreshed on a fixed update schedule.
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`QNetwork`] | Feedforward action-value estimator |
//! | [`ReplayBuffer`](crate::replay::ReplayBuffer) | Bounded store of past experiences |
//! | [`Adam`] | Gradient optimizer with per-parameter moments |
//! | [`DqnAgent`] | Ties the pieces together behind the usual agent surface |
//!
//! ## Usage
//!
//! ```
//! use dprl::dqn::{DqnAgent, DqnConfig};
//! use dprl::mdp::Experience;
//!
//! let config = DqnConfig::new(4, 2)
//!     .with_hidden_layers(1, 16)
//!     .with_batch_size(4)
//!     .with_warmup_steps(8)
//!     .with_seed(42);
//! let mut agent = DqnAgent::new(config)?;
//!
//! let state = vec![0.0, 0.5, -0.5, 1.0];
//! let action = agent.compute_action(&state, 1, true);
//! agent.record_experience(Experience {
//!     episode: 1,
//!     state,
//!     action,
//!     reward: 1.0,
//!     next_state: vec![0.1, 0.4, -0.6, 1.0],
//!     done: false,
//! });
//!
//! // Updates are skipped until the warmup threshold is reached.
//! assert!(agent.update().is_none());
//! # Ok::<(), dprl::Error>(())
//! ```

pub mod agent;
pub mod network;
pub mod optimizer;
pub mod serialization;

// Public re-exports
pub use agent::{DqnAgent, DqnConfig, UpdateStats};
pub use network::{Activation, Architecture, QNetwork};
pub use optimizer::Adam;
pub use serialization::{SavedDqnAgent, SavedQNetwork};
