//! Serialization support for the DQN agent

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::dqn::agent::{DqnAgent, DqnAgentState};
use crate::dqn::network::QNetwork;
use crate::error::{Error, Result};

/// Versioned on-disk snapshot of a [`DqnAgent`].
///
/// The snapshot carries the configuration, both networks, and the optimizer
/// state, so training resumes exactly where it stopped. The replay buffer is
/// not persisted; a restored agent refills it before its first update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedDqnAgent {
    pub version: u32,
    state: DqnAgentState,
}

impl SavedDqnAgent {
    pub const VERSION: u32 = 1;

    /// Snapshot an agent.
    pub fn from_agent(agent: &DqnAgent) -> Self {
        Self {
            version: Self::VERSION,
            state: agent.export_state(),
        }
    }

    /// Rebuild the agent this snapshot was taken from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSnapshotVersion`] when the snapshot was
    /// written by an incompatible schema, and the usual construction errors
    /// when the stored configuration fails validation or does not match the
    /// stored network shapes.
    pub fn to_agent(&self) -> Result<DqnAgent> {
        if self.version != Self::VERSION {
            return Err(Error::UnsupportedSnapshotVersion {
                found: self.version,
                expected: Self::VERSION,
            });
        }
        DqnAgent::from_state(self.state.clone())
    }

    /// Write the snapshot to a MessagePack file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create file {path:?}"),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        rmp_serde::encode::write(&mut writer, self).map_err(|e| Error::SerializationContext {
            operation: "serialize DQN agent to MessagePack".to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// Read a snapshot from a MessagePack file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open file {path:?}"),
            source,
        })?;
        let reader = BufReader::new(file);

        rmp_serde::decode::from_read(reader).map_err(|e| Error::SerializationContext {
            operation: "deserialize DQN agent from MessagePack".to_string(),
            message: e.to_string(),
        })
    }
}

/// Versioned snapshot of a Q-network alone.
///
/// Lighter than [`SavedDqnAgent`]: enough to act greedily with a trained
/// network, but not to resume training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedQNetwork {
    pub version: u32,
    network: QNetwork,
}

impl SavedQNetwork {
    pub const VERSION: u32 = 1;

    /// Snapshot a network.
    pub fn from_network(network: &QNetwork) -> Self {
        Self {
            version: Self::VERSION,
            network: network.clone(),
        }
    }

    /// Recover the stored network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSnapshotVersion`] when the snapshot was
    /// written by an incompatible schema.
    pub fn to_network(&self) -> Result<QNetwork> {
        if self.version != Self::VERSION {
            return Err(Error::UnsupportedSnapshotVersion {
                found: self.version,
                expected: Self::VERSION,
            });
        }
        Ok(self.network.clone())
    }

    /// Write the snapshot to a MessagePack file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create file {path:?}"),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        rmp_serde::encode::write(&mut writer, self).map_err(|e| Error::SerializationContext {
            operation: "serialize Q-network to MessagePack".to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// Read a snapshot from a MessagePack file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open file {path:?}"),
            source,
        })?;
        let reader = BufReader::new(file);

        rmp_serde::decode::from_read(reader).map_err(|e| Error::SerializationContext {
            operation: "deserialize Q-network from MessagePack".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use ndarray::array;

    use super::*;
    use crate::dqn::agent::DqnConfig;
    use crate::mdp::Experience;

    fn trained_agent() -> Result<DqnAgent> {
        let config = DqnConfig::new(2, 2)
            .with_hidden_layers(1, 4)
            .with_batch_size(2)
            .with_replay_buffer_size(16)
            .with_warmup_steps(4)
            .with_seed(13);
        let mut agent = DqnAgent::new(config)?;
        for index in 0..6 {
            agent.record_experience(Experience {
                episode: 1,
                state: vec![index as f64, 0.5],
                action: index % 2,
                reward: 1.0,
                next_state: vec![index as f64 + 1.0, 0.5],
                done: index == 5,
            });
        }
        agent.update();
        Ok(agent)
    }

    #[test]
    fn test_dqn_agent_roundtrip() -> Result<()> {
        let agent = trained_agent()?;

        let saved = SavedDqnAgent::from_agent(&agent);
        let bytes = rmp_serde::to_vec(&saved)?;
        let loaded: SavedDqnAgent = rmp_serde::from_slice(&bytes)?;
        let restored = loaded.to_agent()?;

        assert_eq!(restored.network(), agent.network());
        assert_eq!(restored.target_network(), agent.target_network());
        assert_eq!(restored.config(), agent.config());
        assert_eq!(restored.n_updates(), agent.n_updates());
        assert!(restored.replay_buffer().is_empty());

        Ok(())
    }

    #[test]
    fn test_restored_agent_can_keep_training() -> Result<()> {
        let agent = trained_agent()?;
        let mut restored = SavedDqnAgent::from_agent(&agent).to_agent()?;

        for index in 0..4 {
            restored.record_experience(Experience {
                episode: 2,
                state: vec![0.1 * index as f64, 0.2],
                action: 0,
                reward: 0.5,
                next_state: vec![0.1 * index as f64 + 0.1, 0.2],
                done: false,
            });
        }
        let stats = restored.update().expect("buffer refilled past warmup");
        assert!(stats.loss.is_finite());
        assert_eq!(restored.n_updates(), agent.n_updates() + 1);

        Ok(())
    }

    #[test]
    fn test_q_network_roundtrip() -> Result<()> {
        let agent = trained_agent()?;
        let probe = array![[0.25, 0.75]];

        let saved = SavedQNetwork::from_network(agent.network());
        let bytes = rmp_serde::to_vec(&saved)?;
        let loaded: SavedQNetwork = rmp_serde::from_slice(&bytes)?;
        let network = loaded.to_network()?;

        assert_eq!(&network, agent.network());
        assert_eq!(network.forward(&probe), agent.network().forward(&probe));

        Ok(())
    }

    #[test]
    fn test_version_mismatch_is_rejected() -> Result<()> {
        let agent = trained_agent()?;

        let mut saved = SavedDqnAgent::from_agent(&agent);
        saved.version = SavedDqnAgent::VERSION + 1;
        match saved.to_agent() {
            Err(Error::UnsupportedSnapshotVersion { found, expected }) => {
                assert_eq!(found, SavedDqnAgent::VERSION + 1);
                assert_eq!(expected, SavedDqnAgent::VERSION);
            }
            other => panic!("expected a version error, got {other:?}"),
        }

        let mut saved = SavedQNetwork::from_network(agent.network());
        saved.version = 0;
        assert!(matches!(
            saved.to_network(),
            Err(Error::UnsupportedSnapshotVersion { found: 0, .. })
        ));

        Ok(())
    }
}
