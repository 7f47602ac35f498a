//! Serialization support for the tabular agents

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schedule::EpsilonSchedule;
use crate::tabular::q_learning::QLearningAgent;
use crate::tabular::sarsa::SarsaAgent;
use crate::tabular::table::QTable;

/// Which tabular algorithm produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabularAlgorithm {
    QLearning,
    Sarsa,
}

/// Persistable state shared by both tabular agents.
///
/// SARSA's retained next action is deliberately not part of the snapshot:
/// snapshots are taken at episode boundaries, where no action is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TabularAgentState {
    pub q_table: QTable,
    pub epsilon: EpsilonSchedule,
    pub seed: Option<u64>,
}

/// A restored tabular agent of either algorithm.
#[derive(Debug, Clone)]
pub enum TabularLearner {
    QLearning(QLearningAgent),
    Sarsa(SarsaAgent),
}

/// Versioned on-disk snapshot of a tabular agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTabularAgent {
    pub version: u32,
    pub algorithm: TabularAlgorithm,
    state: TabularAgentState,
}

impl SavedTabularAgent {
    pub const VERSION: u32 = 1;

    /// Snapshot a Q-learning agent.
    pub fn from_q_learning(agent: &QLearningAgent) -> Self {
        Self {
            version: Self::VERSION,
            algorithm: TabularAlgorithm::QLearning,
            state: agent.export_state(),
        }
    }

    /// Snapshot a SARSA agent.
    pub fn from_sarsa(agent: &SarsaAgent) -> Self {
        Self {
            version: Self::VERSION,
            algorithm: TabularAlgorithm::Sarsa,
            state: agent.export_state(),
        }
    }

    /// Rebuild the agent this snapshot was taken from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSnapshotVersion`] when the snapshot was
    /// written by an incompatible schema, and the usual construction errors
    /// when the stored parameters fail validation.
    pub fn to_agent(&self) -> Result<TabularLearner> {
        if self.version != Self::VERSION {
            return Err(Error::UnsupportedSnapshotVersion {
                found: self.version,
                expected: Self::VERSION,
            });
        }
        // A hand-edited snapshot could smuggle in parameters that the
        // constructors would have rejected.
        self.state.epsilon.validate()?;
        let alpha = self.state.q_table.alpha();
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::InvalidStepSize { alpha });
        }

        match self.algorithm {
            TabularAlgorithm::QLearning => Ok(TabularLearner::QLearning(
                QLearningAgent::from_state(self.state.clone()),
            )),
            TabularAlgorithm::Sarsa => {
                Ok(TabularLearner::Sarsa(SarsaAgent::from_state(self.state.clone())))
            }
        }
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
            operation: "serialize tabular agent to MessagePack".to_string(),
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
            operation: "deserialize tabular agent from MessagePack".to_string(),
            message: e.to_string(),
        })
    }
}
