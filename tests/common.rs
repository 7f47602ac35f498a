//! Common test fixtures for the integration suite.
//!
//! Provides a small grid environment with a known optimal policy, usable both
//! as a model for the exact solvers and as a simulator for the learning
//! agents.

use dprl::{Environment, Error, Horizon, Mdp, Result, Step};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const STAY: usize = 0;
pub const UP: usize = 1;
pub const DOWN: usize = 2;
pub const LEFT: usize = 3;
pub const RIGHT: usize = 4;

pub const STEP_REWARD: f64 = -1.0;
pub const GOAL_REWARD: f64 = 10.0;

/// Rectangular grid with an absorbing goal in the bottom-right cell.
///
/// Every transition pays [`STEP_REWARD`] except the one entering the goal,
/// which pays [`GOAL_REWARD`]; the goal itself only offers a zero-reward
/// self-loop. Movement is deterministic. With
/// [`with_reward_noise`](GridWorld::with_reward_noise) the simulated rewards
/// get a zero-mean uniform perturbation while the model-side means stay
/// exact.
pub struct GridWorld {
    width: usize,
    height: usize,
    states: Vec<(usize, usize)>,
    horizon: Horizon,
    reward_noise: f64,
    current: (usize, usize),
    steps_taken: usize,
    rng: StdRng,
}

impl GridWorld {
    pub fn new(width: usize, height: usize, horizon: Horizon) -> Self {
        let states = (0..height)
            .flat_map(|x| (0..width).map(move |y| (x, y)))
            .collect();
        Self {
            width,
            height,
            states,
            horizon,
            reward_noise: 0.0,
            current: (0, 0),
            steps_taken: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    #[allow(dead_code)]
    pub fn with_reward_noise(mut self, amplitude: f64) -> Self {
        self.reward_noise = amplitude;
        self
    }

    pub fn goal(&self) -> (usize, usize) {
        (self.height - 1, self.width - 1)
    }

    pub fn start(&self) -> (usize, usize) {
        (0, 0)
    }

    fn target(&self, (x, y): (usize, usize), action: usize) -> (usize, usize) {
        match action {
            UP => (x - 1, y),
            DOWN => (x + 1, y),
            LEFT => (x, y - 1),
            RIGHT => (x, y + 1),
            _ => (x, y),
        }
    }
}

impl Mdp for GridWorld {
    type State = (usize, usize);

    fn states(&self) -> &[(usize, usize)] {
        &self.states
    }

    fn valid_actions(&self, state: &(usize, usize)) -> Vec<usize> {
        if *state == self.goal() {
            return vec![STAY];
        }
        let (x, y) = *state;
        let mut actions = vec![STAY];
        if x > 0 {
            actions.push(UP);
        }
        if x + 1 < self.height {
            actions.push(DOWN);
        }
        if y > 0 {
            actions.push(LEFT);
        }
        if y + 1 < self.width {
            actions.push(RIGHT);
        }
        actions
    }

    fn mean_reward(&self, state: &(usize, usize), action: usize) -> f64 {
        if *state == self.goal() {
            return 0.0;
        }
        if self.target(*state, action) == self.goal() {
            GOAL_REWARD
        } else {
            STEP_REWARD
        }
    }

    fn next_states(
        &self,
        state: &(usize, usize),
        action: usize,
    ) -> (Vec<(usize, usize)>, Vec<f64>) {
        (vec![self.target(*state, action)], vec![1.0])
    }

    fn state_index(&self, state: &(usize, usize)) -> usize {
        state.0 * self.width + state.1
    }

    fn horizon(&self) -> Horizon {
        self.horizon
    }
}

impl Environment for GridWorld {
    fn reset(&mut self) -> (usize, usize) {
        self.current = self.start();
        self.steps_taken = 0;
        self.current
    }

    fn step(&mut self, action: usize) -> Result<Step<(usize, usize)>> {
        let state = self.current;
        if !self.valid_actions(&state).contains(&action) {
            return Err(Error::InvalidAction {
                action,
                state: format!("{state:?}"),
            });
        }

        let target = self.target(state, action);
        let mut reward = self.mean_reward(&state, action);
        if self.reward_noise > 0.0 {
            reward += self.rng.random_range(-self.reward_noise..self.reward_noise);
        }

        self.current = target;
        self.steps_taken += 1;
        let done = match self.horizon {
            Horizon::Finite(steps) => self.steps_taken >= steps,
            Horizon::Discounted(_) => target == self.goal(),
        };
        Ok(Step {
            state: target,
            reward,
            done,
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

/// Discounted 3x3 grid, the workhorse of the learning tests.
pub fn discounted_grid() -> GridWorld {
    GridWorld::new(3, 3, Horizon::Discounted(0.9))
}

/// Exact optimal start-state value of [`discounted_grid`]: four moves to the
/// goal, three step penalties, and the discounted goal reward.
#[allow(dead_code)]
pub fn discounted_grid_optimal_start_value() -> f64 {
    let discount: f64 = 0.9;
    STEP_REWARD * (1.0 + discount + discount * discount) + GOAL_REWARD * discount.powi(3)
}
