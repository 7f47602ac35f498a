//! Adam optimizer for the Q-network

use ndarray::{Array, Array1, Array2, Dimension};
use serde::{Deserialize, Serialize};

use crate::dqn::network::{Gradients, QNetwork};

/// First and second moment estimates for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LayerMoments {
    weights_m: Array2<f64>,
    weights_v: Array2<f64>,
    bias_m: Array1<f64>,
    bias_v: Array1<f64>,
}

/// Scalars shared by every parameter update of a single optimizer step.
struct StepScales {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    correction1: f64,
    correction2: f64,
}

/// Adam with bias-corrected moment estimates and the standard
/// `beta1 = 0.9`, `beta2 = 0.999`, `epsilon = 1e-8` coefficients.
///
/// The optimizer keeps one moment pair per network parameter, so it is tied
/// to the network it was built for and travels with the agent through
/// snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    n_steps: u64,
    moments: Vec<LayerMoments>,
}

impl Adam {
    pub(crate) fn new(learning_rate: f64, network: &QNetwork) -> Self {
        let moments = network
            .layers()
            .iter()
            .map(|layer| LayerMoments {
                weights_m: Array2::zeros(layer.weights.dim()),
                weights_v: Array2::zeros(layer.weights.dim()),
                bias_m: Array1::zeros(layer.bias.len()),
                bias_v: Array1::zeros(layer.bias.len()),
            })
            .collect();
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            n_steps: 0,
            moments,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of optimizer steps taken so far.
    pub fn n_steps(&self) -> u64 {
        self.n_steps
    }

    /// Apply one gradient step to every network parameter.
    pub(crate) fn step(&mut self, network: &mut QNetwork, gradients: &Gradients) {
        self.n_steps += 1;
        let scales = StepScales {
            learning_rate: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            correction1: 1.0 - self.beta1.powi(self.n_steps as i32),
            correction2: 1.0 - self.beta2.powi(self.n_steps as i32),
        };

        for ((layer, moments), gradient) in network
            .layers_mut()
            .iter_mut()
            .zip(&mut self.moments)
            .zip(&gradients.layers)
        {
            update_parameters(
                &scales,
                &mut layer.weights,
                &mut moments.weights_m,
                &mut moments.weights_v,
                &gradient.weights,
            );
            update_parameters(
                &scales,
                &mut layer.bias,
                &mut moments.bias_m,
                &mut moments.bias_v,
                &gradient.bias,
            );
        }
    }
}

fn update_parameters<D>(
    scales: &StepScales,
    parameters: &mut Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    gradient: &Array<f64, D>,
) where
    D: Dimension,
{
    m.zip_mut_with(gradient, |moment, &g| {
        *moment = scales.beta1 * *moment + (1.0 - scales.beta1) * g;
    });
    v.zip_mut_with(gradient, |moment, &g| {
        *moment = scales.beta2 * *moment + (1.0 - scales.beta2) * g * g;
    });
    for ((parameter, &m), &v) in parameters.iter_mut().zip(m.iter()).zip(v.iter()) {
        let m_hat = m / scales.correction1;
        let v_hat = v / scales.correction2;
        *parameter -= scales.learning_rate * m_hat / (v_hat.sqrt() + scales.epsilon);
    }
}
