//! Deep Q-learning agent with experience replay and a target network

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dqn::network::{Activation, Architecture, QNetwork};
use crate::dqn::optimizer::Adam;
use crate::error::{Error, Result};
use crate::mdp::Experience;
use crate::replay::ReplayBuffer;
use crate::schedule::EpsilonSchedule;
use crate::utils::{argmax, build_rng, random_decide};

/// Hyperparameters of a [`DqnAgent`].
///
/// Built with [`DqnConfig::new`] plus the `with_` methods; every field is
/// also public for direct construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Length of the state feature vector fed to the network.
    pub n_state_features: usize,
    /// Number of actions the agent chooses between; action codes are
    /// `0..n_actions`.
    pub n_actions: usize,
    /// Discount factor applied to bootstrapped next-state values.
    pub discount: f64,
    /// Exploration schedule.
    pub epsilon: EpsilonSchedule,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Minibatch size sampled from the replay buffer per update.
    pub batch_size: usize,
    /// Replay buffer capacity.
    pub replay_buffer_size: usize,
    /// Minimum number of stored experiences before updates run.
    pub warmup_steps: usize,
    /// Number of updates between target network synchronizations.
    pub target_update_frequency: usize,
    /// Global L2 norm above which gradients are rescaled.
    pub gradient_clip_norm: f64,
    /// Number of hidden layers; 0 gives a purely linear network.
    pub n_hidden_layers: usize,
    /// Width of each hidden layer.
    pub hidden_layer_size: usize,
    /// Hidden-layer activation.
    pub activation: Activation,
    /// Network head; only [`Architecture::Feedforward`] is supported.
    pub architecture: Architecture,
    /// Whether sampled batches always include the latest experience.
    pub combined_replay: bool,
    /// Seed for network initialization, exploration, and batch sampling.
    pub seed: Option<u64>,
}

impl DqnConfig {
    #[must_use]
    pub fn new(n_state_features: usize, n_actions: usize) -> Self {
        Self {
            n_state_features,
            n_actions,
            discount: 0.99,
            epsilon: EpsilonSchedule::Constant(0.1),
            learning_rate: 1e-3,
            batch_size: 32,
            replay_buffer_size: 10_000,
            warmup_steps: 500,
            target_update_frequency: 100,
            gradient_clip_norm: 1.0,
            n_hidden_layers: 2,
            hidden_layer_size: 64,
            activation: Activation::Relu,
            architecture: Architecture::Feedforward,
            combined_replay: false,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    #[must_use]
    pub fn with_epsilon(mut self, epsilon: EpsilonSchedule) -> Self {
        self.epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_replay_buffer_size(mut self, replay_buffer_size: usize) -> Self {
        self.replay_buffer_size = replay_buffer_size;
        self
    }

    #[must_use]
    pub fn with_warmup_steps(mut self, warmup_steps: usize) -> Self {
        self.warmup_steps = warmup_steps;
        self
    }

    #[must_use]
    pub fn with_target_update_frequency(mut self, target_update_frequency: usize) -> Self {
        self.target_update_frequency = target_update_frequency;
        self
    }

    #[must_use]
    pub fn with_gradient_clip_norm(mut self, gradient_clip_norm: f64) -> Self {
        self.gradient_clip_norm = gradient_clip_norm;
        self
    }

    #[must_use]
    pub fn with_hidden_layers(mut self, n_hidden_layers: usize, hidden_layer_size: usize) -> Self {
        self.n_hidden_layers = n_hidden_layers;
        self.hidden_layer_size = hidden_layer_size;
        self
    }

    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    #[must_use]
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    #[must_use]
    pub fn with_combined_replay(mut self, combined_replay: bool) -> Self {
        self.combined_replay = combined_replay;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every hyperparameter for validity.
    pub fn validate(&self) -> Result<()> {
        if self.n_state_features == 0 {
            return Err(Error::InvalidConfiguration {
                message: "n_state_features must be at least 1".to_string(),
            });
        }
        if self.n_actions == 0 {
            return Err(Error::InvalidConfiguration {
                message: "n_actions must be at least 1".to_string(),
            });
        }
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return Err(Error::InvalidDiscount {
                discount: self.discount,
            });
        }
        self.epsilon.validate()?;
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: format!("learning rate {} must be positive and finite", self.learning_rate),
            });
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfiguration {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        if self.replay_buffer_size == 0 {
            return Err(Error::InvalidConfiguration {
                message: "replay_buffer_size must be at least 1".to_string(),
            });
        }
        if self.target_update_frequency == 0 {
            return Err(Error::InvalidConfiguration {
                message: "target_update_frequency must be at least 1".to_string(),
            });
        }
        if !(self.gradient_clip_norm > 0.0 && self.gradient_clip_norm.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "gradient clip norm {} must be positive and finite",
                    self.gradient_clip_norm
                ),
            });
        }
        if self.n_hidden_layers > 0 && self.hidden_layer_size == 0 {
            return Err(Error::InvalidConfiguration {
                message: "hidden_layer_size must be at least 1".to_string(),
            });
        }
        match self.architecture {
            Architecture::Feedforward => Ok(()),
            Architecture::Dueling => Err(Error::NotSupported {
                feature: "the dueling network architecture".to_string(),
            }),
        }
    }
}

/// Diagnostics from one gradient update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateStats {
    /// Minibatch mean squared TD error.
    pub loss: f64,
    /// Global gradient L2 norm before clipping.
    pub gradient_norm: f64,
}

/// Snapshot of everything a [`DqnAgent`] needs to resume training, except
/// the replay buffer, which restarts empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DqnAgentState {
    pub(crate) config: DqnConfig,
    pub(crate) network: QNetwork,
    pub(crate) target_network: QNetwork,
    pub(crate) optimizer: Adam,
    pub(crate) n_updates: u64,
}

/// Q-learning with function approximation: a feedforward network estimates
/// action values from state features, trained on minibatches drawn from a
/// replay buffer against a periodically synchronized target network.
///
/// Unlike the tabular agents, the DQN agent never consults a decision
/// process model. States are plain feature vectors and the action space is
/// the full range `0..n_actions`.
#[derive(Debug, Clone)]
pub struct DqnAgent {
    config: DqnConfig,
    network: QNetwork,
    target_network: QNetwork,
    optimizer: Adam,
    buffer: ReplayBuffer<Vec<f64>>,
    n_updates: u64,
    rng: StdRng,
}

impl DqnAgent {
    /// Build an agent from a validated configuration.
    ///
    /// The target network starts as an exact copy of the online network.
    pub fn new(config: DqnConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = build_rng(config.seed);
        let network = QNetwork::new(
            config.n_state_features,
            config.n_actions,
            config.n_hidden_layers,
            config.hidden_layer_size,
            config.activation,
            &mut rng,
        );
        let target_network = network.clone();
        let optimizer = Adam::new(config.learning_rate, &network);
        let buffer =
            ReplayBuffer::new(config.replay_buffer_size).with_combined_replay(config.combined_replay);
        Ok(Self {
            config,
            network,
            target_network,
            optimizer,
            buffer,
            n_updates: 0,
            rng,
        })
    }

    /// Select an action for a state feature vector.
    ///
    /// With `explore` set, the epsilon schedule decides between a uniformly
    /// random action and the greedy one; without it the choice is greedy and
    /// consumes no randomness. Ties break toward the lowest action code.
    ///
    /// # Panics
    ///
    /// Panics when `state` does not have `n_state_features` entries, or when
    /// `episode` is 0 while exploring.
    pub fn compute_action(&mut self, state: &[f64], episode: u32, explore: bool) -> usize {
        assert_eq!(
            state.len(),
            self.config.n_state_features,
            "state feature length mismatch"
        );
        if explore && random_decide(&mut self.rng, self.config.epsilon.epsilon(episode)) {
            return self.rng.random_range(0..self.config.n_actions);
        }

        let input = Array2::from_shape_vec((1, state.len()), state.to_vec())
            .expect("row shape matches the feature length");
        let q_values = self.network.forward(&input);
        argmax(q_values.row(0).iter().copied()).expect("the action space is non-empty")
    }

    /// Store an experience in the replay buffer.
    ///
    /// # Panics
    ///
    /// Panics when either feature vector does not have `n_state_features`
    /// entries or when the action code is not below `n_actions`.
    pub fn record_experience(&mut self, experience: Experience<Vec<f64>>) {
        assert_eq!(
            experience.state.len(),
            self.config.n_state_features,
            "state feature length mismatch"
        );
        assert_eq!(
            experience.next_state.len(),
            self.config.n_state_features,
            "next state feature length mismatch"
        );
        assert!(
            experience.action < self.config.n_actions,
            "action code {} is outside 0..{}",
            experience.action,
            self.config.n_actions
        );
        self.buffer.push(experience);
    }

    /// Run one gradient update on a sampled minibatch.
    ///
    /// Returns `None` without touching the network while the buffer holds
    /// fewer than `warmup_steps` experiences. Targets bootstrap from the
    /// target network, which is refreshed from the online network every
    /// `target_update_frequency` updates.
    pub fn update(&mut self) -> Option<UpdateStats> {
        if self.buffer.is_empty() || self.buffer.len() < self.config.warmup_steps {
            return None;
        }

        let batch_size = self.config.batch_size;
        let mut states = Array2::zeros((batch_size, self.config.n_state_features));
        let mut next_states = Array2::zeros((batch_size, self.config.n_state_features));
        let mut actions = Vec::with_capacity(batch_size);
        let mut rewards = Vec::with_capacity(batch_size);
        let mut dones = Vec::with_capacity(batch_size);
        for (row, experience) in self
            .buffer
            .sample(&mut self.rng, batch_size)
            .iter()
            .enumerate()
        {
            for (column, &feature) in experience.state.iter().enumerate() {
                states[[row, column]] = feature;
            }
            for (column, &feature) in experience.next_state.iter().enumerate() {
                next_states[[row, column]] = feature;
            }
            actions.push(experience.action);
            rewards.push(experience.reward);
            dones.push(experience.done);
        }

        // Terminal transitions contribute their reward alone.
        let q_next = self.target_network.forward(&next_states);
        let targets: Vec<f64> = (0..batch_size)
            .map(|row| {
                if dones[row] {
                    rewards[row]
                } else {
                    let best_next = q_next
                        .row(row)
                        .iter()
                        .copied()
                        .fold(f64::NEG_INFINITY, f64::max);
                    rewards[row] + self.config.discount * best_next
                }
            })
            .collect();

        // Mean squared TD error over the chosen actions only; all other
        // network outputs receive zero gradient.
        let cache = self.network.forward_cached(&states);
        let mut output_gradient = Array2::zeros((batch_size, self.config.n_actions));
        let mut loss = 0.0;
        for row in 0..batch_size {
            let difference = cache.output[[row, actions[row]]] - targets[row];
            loss += difference * difference;
            output_gradient[[row, actions[row]]] = 2.0 * difference / batch_size as f64;
        }
        let loss = loss / batch_size as f64;

        let mut gradients = self.network.backward(&cache, &output_gradient);
        let gradient_norm = gradients.l2_norm();
        let clip_coefficient = self.config.gradient_clip_norm / (gradient_norm + 1e-6);
        if clip_coefficient < 1.0 {
            gradients.scale(clip_coefficient);
        }
        self.optimizer.step(&mut self.network, &gradients);

        self.n_updates += 1;
        if self.n_updates % self.config.target_update_frequency as u64 == 0 {
            self.target_network.copy_parameters_from(&self.network);
        }

        Some(UpdateStats {
            loss,
            gradient_norm,
        })
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    /// Online network.
    pub fn network(&self) -> &QNetwork {
        &self.network
    }

    /// Target network used for bootstrapping.
    pub fn target_network(&self) -> &QNetwork {
        &self.target_network
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer<Vec<f64>> {
        &self.buffer
    }

    /// Number of gradient updates applied so far.
    pub fn n_updates(&self) -> u64 {
        self.n_updates
    }

    /// Reseed the agent's generator.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.config.seed = Some(seed);
    }

    pub(crate) fn export_state(&self) -> DqnAgentState {
        DqnAgentState {
            config: self.config,
            network: self.network.clone(),
            target_network: self.target_network.clone(),
            optimizer: self.optimizer.clone(),
            n_updates: self.n_updates,
        }
    }

    pub(crate) fn from_state(state: DqnAgentState) -> Result<Self> {
        state.config.validate()?;
        for (name, network) in [
            ("network", &state.network),
            ("target network", &state.target_network),
        ] {
            if network.n_inputs() != state.config.n_state_features
                || network.n_outputs() != state.config.n_actions
            {
                return Err(Error::InvalidConfiguration {
                    message: format!(
                        "{name} maps {} features to {} actions, but the configuration \
                         declares {} features and {} actions",
                        network.n_inputs(),
                        network.n_outputs(),
                        state.config.n_state_features,
                        state.config.n_actions,
                    ),
                });
            }
        }
        let rng = build_rng(state.config.seed);
        let buffer = ReplayBuffer::new(state.config.replay_buffer_size)
            .with_combined_replay(state.config.combined_replay);
        Ok(Self {
            config: state.config,
            network: state.network,
            target_network: state.target_network,
            optimizer: state.optimizer,
            buffer,
            n_updates: state.n_updates,
            rng,
        })
    }
}
