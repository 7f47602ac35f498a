//! Planning and reinforcement learning for finite Markov decision processes
//!
//! This crate provides:
//! - A decision process contract with finite and discounted horizons
//! - Exact planners: backward induction and value iteration
//! - Tabular temporal-difference agents: Q-learning and SARSA
//! - A deep Q-network agent with experience replay and a target network
//! - Versioned MessagePack snapshots for every agent

pub mod dqn;
pub mod error;
pub mod mdp;
pub mod planning;
pub mod replay;
pub mod schedule;
pub mod tabular;
pub mod utils;

pub use dqn::{DqnAgent, DqnConfig};
pub use error::{Error, Result};
pub use mdp::{Environment, Experience, Horizon, Mdp, Step};
pub use planning::{DynamicProgramming, Planner, ValueIteration};
pub use replay::ReplayBuffer;
pub use schedule::EpsilonSchedule;
pub use tabular::{QLearningAgent, SarsaAgent, TabularConfig};
