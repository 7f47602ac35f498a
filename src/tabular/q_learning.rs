//! Q-learning agent (off-policy TD control)

use rand::{SeedableRng, rngs::StdRng};

use crate::error::{Error, Result};
use crate::mdp::{Experience, Mdp};
use crate::schedule::EpsilonSchedule;
use crate::tabular::serialization::TabularAgentState;
use crate::tabular::table::QTable;
use crate::tabular::{TabularConfig, epsilon_greedy};
use crate::utils::build_rng;

/// Q-learning agent.
///
/// Learns optimal Q* values by always bootstrapping toward the best valid
/// action in the successor state, regardless of which action the behavior
/// policy actually takes next.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    q_table: QTable,
    epsilon: EpsilonSchedule,
    rng: StdRng,
    seed: Option<u64>,
}

impl QLearningAgent {
    /// Create an agent sized for the given process.
    ///
    /// The process is only consulted for its state and action counts here;
    /// no reference to it is retained.
    ///
    /// # Errors
    ///
    /// Returns an error when the config's step-size exponent or exploration
    /// schedule is out of range.
    pub fn new<M: Mdp>(mdp: &M, config: TabularConfig) -> Result<Self> {
        config.epsilon.validate()?;
        Ok(Self {
            q_table: QTable::new(mdp.n_states(), mdp.n_actions(), config.alpha, config.q_init)?,
            epsilon: config.epsilon,
            rng: build_rng(config.seed),
            seed: config.seed,
        })
    }

    /// Epsilon-greedy action for `state` during a 1-based `episode`.
    ///
    /// With `explore` set to false the schedule is bypassed and the greedy
    /// action is returned without consuming any randomness, which keeps
    /// evaluation rollouts deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoValidActions`] when the process declares no valid
    /// action for `state`.
    pub fn compute_action<M: Mdp>(
        &mut self,
        mdp: &M,
        state: &M::State,
        episode: u32,
        explore: bool,
    ) -> Result<usize> {
        let valid_actions = mdp.valid_actions(state);
        if valid_actions.is_empty() {
            return Err(Error::NoValidActions {
                state: format!("{state:?}"),
            });
        }
        let state_index = mdp.state_index(state);
        if explore {
            let epsilon = self.epsilon.epsilon(episode);
            Ok(epsilon_greedy(
                &self.q_table,
                &mut self.rng,
                epsilon,
                state_index,
                &valid_actions,
            ))
        } else {
            Ok(self.q_table.greedy_action(state_index, &valid_actions))
        }
    }

    /// Apply one off-policy update for an observed transition.
    ///
    /// The bootstrap term is the maximum Q-value over the valid actions of
    /// the successor state, or 0 when the transition ended the episode.
    pub fn update<M: Mdp>(&mut self, mdp: &M, experience: &Experience<M::State>) {
        let state_index = mdp.state_index(&experience.state);
        let bootstrap = if experience.done {
            0.0
        } else {
            let next_index = mdp.state_index(&experience.next_state);
            let next_valid = mdp.valid_actions(&experience.next_state);
            self.q_table.max_q(next_index, &next_valid)
        };
        let target = experience.reward + mdp.horizon().discount() * bootstrap;
        self.q_table.td_update(state_index, experience.action, target);
    }

    /// Greedy action per state, in state-index order.
    pub fn policy<M: Mdp>(&self, mdp: &M) -> Vec<usize> {
        mdp.states()
            .iter()
            .map(|state| {
                self.q_table
                    .greedy_action(mdp.state_index(state), &mdp.valid_actions(state))
            })
            .collect()
    }

    /// The learned Q-table.
    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    /// Reseed the agent's generator.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.seed = Some(seed);
    }

    pub(crate) fn export_state(&self) -> TabularAgentState {
        TabularAgentState {
            q_table: self.q_table.clone(),
            epsilon: self.epsilon,
            seed: self.seed,
        }
    }

    pub(crate) fn from_state(state: TabularAgentState) -> Self {
        Self {
            q_table: state.q_table,
            epsilon: state.epsilon,
            rng: build_rng(state.seed),
            seed: state.seed,
        }
    }
}
