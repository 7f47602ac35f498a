//! SARSA agent (on-policy TD control)

use rand::{SeedableRng, rngs::StdRng};

use crate::error::{Error, Result};
use crate::mdp::{Experience, Mdp};
use crate::schedule::EpsilonSchedule;
use crate::tabular::serialization::TabularAgentState;
use crate::tabular::table::QTable;
use crate::tabular::{TabularConfig, epsilon_greedy};
use crate::utils::build_rng;

/// SARSA agent.
///
/// Learns Q^pi for the policy it actually follows, exploration included.
/// Each update selects the successor action epsilon-greedily and bootstraps
/// from that very action; the selection is retained so the next
/// [`compute_action`](SarsaAgent::compute_action) call during training
/// returns it rather than drawing a fresh one. That retention is what makes
/// the update on-policy: the action evaluated is the action executed.
#[derive(Debug, Clone)]
pub struct SarsaAgent {
    q_table: QTable,
    epsilon: EpsilonSchedule,
    rng: StdRng,
    seed: Option<u64>,
    pending_action: Option<usize>,
}

impl SarsaAgent {
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
            pending_action: None,
        })
    }

    /// Behavior action for `state` during a 1-based `episode`.
    ///
    /// During training (`explore` true) this first consumes any action
    /// retained by the previous [`update`](SarsaAgent::update), falling back
    /// to a fresh epsilon-greedy draw at the start of an episode. With
    /// `explore` false the retained action is left untouched and the greedy
    /// action is returned without consuming randomness.
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
        if !explore {
            return Ok(self.q_table.greedy_action(state_index, &valid_actions));
        }
        if let Some(action) = self.pending_action.take() {
            return Ok(action);
        }
        let epsilon = self.epsilon.epsilon(episode);
        Ok(epsilon_greedy(
            &self.q_table,
            &mut self.rng,
            epsilon,
            state_index,
            &valid_actions,
        ))
    }

    /// Apply one on-policy update for an observed transition.
    ///
    /// For non-terminal transitions the successor action is drawn
    /// epsilon-greedily at the experience's episode, its Q-value becomes the
    /// bootstrap term, and the drawn action is retained for the next
    /// [`compute_action`](SarsaAgent::compute_action). Terminal transitions
    /// bootstrap from 0 and clear any retained action.
    pub fn update<M: Mdp>(&mut self, mdp: &M, experience: &Experience<M::State>) {
        let state_index = mdp.state_index(&experience.state);
        let bootstrap = if experience.done {
            self.pending_action = None;
            0.0
        } else {
            let next_index = mdp.state_index(&experience.next_state);
            let next_valid = mdp.valid_actions(&experience.next_state);
            let epsilon = self.epsilon.epsilon(experience.episode);
            let next_action = epsilon_greedy(
                &self.q_table,
                &mut self.rng,
                epsilon,
                next_index,
                &next_valid,
            );
            self.pending_action = Some(next_action);
            self.q_table.get(next_index, next_action)
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
            pending_action: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::Horizon;
    use crate::mdp::fixtures::{LineWorld, RIGHT, STAY};

    fn greedy_agent(world: &LineWorld) -> SarsaAgent {
        let config = TabularConfig::new()
            .with_epsilon(EpsilonSchedule::Constant(0.0))
            .with_seed(13);
        SarsaAgent::new(world, config).unwrap()
    }

    fn transition(state: usize, action: usize, reward: f64, next_state: usize) -> Experience<usize> {
        Experience {
            episode: 1,
            state,
            action,
            reward,
            next_state,
            done: false,
        }
    }

    #[test]
    fn update_bootstraps_from_the_selected_next_action() {
        let world = LineWorld::new(3, Horizon::Discounted(0.5));
        let mut agent = greedy_agent(&world);

        // With a zero-epsilon schedule the successor action is the greedy
        // one: RIGHT out of state 1, worth 3.
        agent.q_table.set(1, RIGHT, 3.0);
        agent.update(&world, &transition(0, RIGHT, 1.0, 1));

        assert_eq!(agent.q_table().get(0, RIGHT), 1.0 + 0.5 * 3.0);
        assert_eq!(agent.pending_action, Some(RIGHT));
    }

    #[test]
    fn the_evaluated_action_is_the_one_executed_next() {
        let world = LineWorld::new(3, Horizon::Discounted(0.5));
        let mut agent = greedy_agent(&world);
        agent.q_table.set(1, RIGHT, 3.0);

        agent.update(&world, &transition(0, RIGHT, 0.0, 1));
        // The training-time action for state 1 must be the retained one.
        assert_eq!(agent.compute_action(&world, &1, 1, true).unwrap(), RIGHT);
        assert_eq!(agent.pending_action, None);
    }

    #[test]
    fn greedy_evaluation_leaves_the_retained_action_in_place() {
        let world = LineWorld::new(3, Horizon::Discounted(0.5));
        let mut agent = greedy_agent(&world);
        agent.q_table.set(1, STAY, 5.0);
        agent.q_table.set(1, RIGHT, 1.0);

        agent.update(&world, &transition(0, RIGHT, 0.0, 1));
        assert_eq!(agent.pending_action, Some(STAY));

        // An evaluation query must not consume the retained action.
        assert_eq!(agent.compute_action(&world, &1, 1, false).unwrap(), STAY);
        assert_eq!(agent.pending_action, Some(STAY));
    }

    #[test]
    fn terminal_updates_clear_the_retained_action_and_continuation() {
        let world = LineWorld::new(3, Horizon::Discounted(0.9));
        let mut agent = greedy_agent(&world);
        agent.q_table.set(2, STAY, 100.0);

        agent.update(&world, &transition(0, RIGHT, 0.0, 1));
        assert!(agent.pending_action.is_some());

        let terminal = Experience {
            done: true,
            ..transition(1, RIGHT, 4.0, 2)
        };
        agent.update(&world, &terminal);
        assert_eq!(agent.pending_action, None);
        assert_eq!(agent.q_table().get(1, RIGHT), 4.0);
    }

    #[test]
    fn fresh_episodes_draw_a_fresh_action() {
        let world = LineWorld::new(3, Horizon::Discounted(0.9));
        let mut agent = greedy_agent(&world);
        agent.q_table.set(0, RIGHT, 2.0);

        // No retained action yet, so this is a plain epsilon-greedy draw.
        assert_eq!(agent.compute_action(&world, &0, 1, true).unwrap(), RIGHT);
    }
}
