//! Feedforward Q-network with manual backpropagation

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Hidden-layer activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Derivative expressed through the activation's own output.
    ///
    /// Both supported activations admit this form, which lets backprop reuse
    /// the cached forward results instead of the pre-activations.
    fn derivative_from_output(self, y: f64) -> f64 {
        match self {
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - y * y,
        }
    }
}

/// Network head selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Plain multilayer perceptron head.
    Feedforward,
    /// Dueling value/advantage head. Recognized but not implemented; agent
    /// construction rejects it.
    Dueling,
}

/// One fully connected layer, weights laid out `n_outputs x n_inputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Linear {
    pub(crate) weights: Array2<f64>,
    pub(crate) bias: Array1<f64>,
}

impl Linear {
    /// Uniform initialization in `[-1/sqrt(n_inputs), 1/sqrt(n_inputs)]`
    /// for both weights and biases.
    fn init<R>(rng: &mut R, n_inputs: usize, n_outputs: usize) -> Self
    where
        R: Rng + ?Sized,
    {
        let bound = 1.0 / (n_inputs as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((n_outputs, n_inputs), |_| {
                rng.random_range(-bound..bound)
            }),
            bias: Array1::from_shape_fn(n_outputs, |_| rng.random_range(-bound..bound)),
        }
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights.t()) + &self.bias
    }

    pub(crate) fn n_inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub(crate) fn n_outputs(&self) -> usize {
        self.weights.nrows()
    }
}

/// Parameter gradients of one layer.
#[derive(Debug, Clone)]
pub(crate) struct LayerGradients {
    pub(crate) weights: Array2<f64>,
    pub(crate) bias: Array1<f64>,
}

/// Gradients for every layer of a [`QNetwork`], ordered input to output.
#[derive(Debug, Clone)]
pub(crate) struct Gradients {
    pub(crate) layers: Vec<LayerGradients>,
}

impl Gradients {
    /// Global L2 norm over every parameter gradient.
    pub(crate) fn l2_norm(&self) -> f64 {
        self.layers
            .iter()
            .map(|layer| {
                layer.weights.iter().map(|g| g * g).sum::<f64>()
                    + layer.bias.iter().map(|g| g * g).sum::<f64>()
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Scale every gradient in place.
    pub(crate) fn scale(&mut self, factor: f64) {
        for layer in &mut self.layers {
            layer.weights.mapv_inplace(|g| g * factor);
            layer.bias.mapv_inplace(|g| g * factor);
        }
    }
}

/// Intermediate results of a forward pass, retained for backprop.
pub(crate) struct ForwardCache {
    /// Input to each layer; entry 0 is the state batch itself, later entries
    /// are post-activation hidden outputs.
    layer_inputs: Vec<Array2<f64>>,
    /// Final Q-value batch.
    pub(crate) output: Array2<f64>,
}

/// Action-value network: a multilayer perceptron mapping a batch of state
/// feature rows to one row of Q-values per action.
///
/// The last layer is a linear head; the activation applies to every hidden
/// layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetwork {
    layers: Vec<Linear>,
    activation: Activation,
}

impl QNetwork {
    pub(crate) fn new<R>(
        n_inputs: usize,
        n_outputs: usize,
        n_hidden_layers: usize,
        hidden_layer_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut layers = Vec::with_capacity(n_hidden_layers + 1);
        let mut fan_in = n_inputs;
        for _ in 0..n_hidden_layers {
            layers.push(Linear::init(rng, fan_in, hidden_layer_size));
            fan_in = hidden_layer_size;
        }
        layers.push(Linear::init(rng, fan_in, n_outputs));
        Self { layers, activation }
    }

    /// Number of state features the network consumes.
    pub fn n_inputs(&self) -> usize {
        self.layers
            .first()
            .map_or(0, |layer| layer.n_inputs())
    }

    /// Number of actions the network scores.
    pub fn n_outputs(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.n_outputs())
    }

    /// Q-values for a batch of state feature rows.
    pub fn forward(&self, states: &Array2<f64>) -> Array2<f64> {
        let last = self.layers.len() - 1;
        let mut current = states.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            current = layer.forward(&current);
            if index < last {
                current.mapv_inplace(|x| self.activation.apply(x));
            }
        }
        current
    }

    /// Forward pass that retains per-layer inputs for
    /// [`backward`](QNetwork::backward).
    pub(crate) fn forward_cached(&self, states: &Array2<f64>) -> ForwardCache {
        let last = self.layers.len() - 1;
        let mut layer_inputs = Vec::with_capacity(self.layers.len());
        let mut current = states.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            layer_inputs.push(current.clone());
            current = layer.forward(&current);
            if index < last {
                current.mapv_inplace(|x| self.activation.apply(x));
            }
        }
        ForwardCache {
            layer_inputs,
            output: current,
        }
    }

    /// Backpropagate a gradient of the loss with respect to the network
    /// output through every layer.
    pub(crate) fn backward(
        &self,
        cache: &ForwardCache,
        output_gradient: &Array2<f64>,
    ) -> Gradients {
        let mut reversed = Vec::with_capacity(self.layers.len());
        let mut delta = output_gradient.clone();
        for (index, layer) in self.layers.iter().enumerate().rev() {
            let input = &cache.layer_inputs[index];
            reversed.push(LayerGradients {
                weights: delta.t().dot(input),
                bias: delta.sum_axis(Axis(0)),
            });
            if index > 0 {
                let upstream = delta.dot(&layer.weights);
                let derivative = input.mapv(|y| self.activation.derivative_from_output(y));
                delta = upstream * &derivative;
            }
        }
        reversed.reverse();
        Gradients { layers: reversed }
    }

    /// Overwrite this network's parameters with `other`'s.
    ///
    /// Both networks must share an architecture, which holds for any online
    /// and target pair built from the same config.
    pub(crate) fn copy_parameters_from(&mut self, other: &QNetwork) {
        debug_assert_eq!(self.layers.len(), other.layers.len());
        for (target, source) in self.layers.iter_mut().zip(&other.layers) {
            target.weights.assign(&source.weights);
            target.bias.assign(&source.bias);
        }
    }

    pub(crate) fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Linear] {
        &mut self.layers
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::utils::build_rng;

    #[test]
    fn initialization_respects_the_fan_in_bound() {
        let mut rng = build_rng(Some(42));
        let network = QNetwork::new(16, 4, 2, 32, Activation::Relu, &mut rng);

        let bounds = [
            1.0 / (16f64).sqrt(),
            1.0 / (32f64).sqrt(),
            1.0 / (32f64).sqrt(),
        ];
        for (layer, bound) in network.layers().iter().zip(bounds) {
            assert!(layer.weights.iter().all(|w| w.abs() <= bound));
            assert!(layer.bias.iter().all(|b| b.abs() <= bound));
        }
    }

    #[test]
    fn forward_produces_one_q_row_per_state() {
        let mut rng = build_rng(Some(1));
        let network = QNetwork::new(3, 4, 2, 8, Activation::Relu, &mut rng);
        assert_eq!(network.n_inputs(), 3);
        assert_eq!(network.n_outputs(), 4);

        let states = Array2::zeros((5, 3));
        assert_eq!(network.forward(&states).dim(), (5, 4));
    }

    #[test]
    fn forward_matches_a_hand_computed_relu_network() {
        let mut rng = build_rng(Some(2));
        let mut network = QNetwork::new(1, 1, 1, 1, Activation::Relu, &mut rng);
        network.layers_mut()[0].weights = array![[2.0]];
        network.layers_mut()[0].bias = array![-1.0];
        network.layers_mut()[1].weights = array![[3.0]];
        network.layers_mut()[1].bias = array![0.5];

        // x = 2: hidden = relu(2 * 2 - 1) = 3, output = 3 * 3 + 0.5.
        let output = network.forward(&array![[2.0]]);
        assert!((output[[0, 0]] - 9.5).abs() < 1e-12);

        // x = 0: hidden = relu(-1) = 0, output = 0.5.
        let output = network.forward(&array![[0.0]]);
        assert!((output[[0, 0]] - 0.5).abs() < 1e-12);
    }

    fn masked_mse(
        network: &QNetwork,
        states: &Array2<f64>,
        actions: &[usize],
        targets: &[f64],
    ) -> f64 {
        let q_values = network.forward(states);
        actions
            .iter()
            .enumerate()
            .map(|(row, &action)| {
                let difference = q_values[[row, action]] - targets[row];
                difference * difference
            })
            .sum::<f64>()
            / actions.len() as f64
    }

    #[test]
    fn backward_matches_numerical_gradients() {
        let mut rng = build_rng(Some(42));
        let mut network = QNetwork::new(2, 2, 1, 3, Activation::Tanh, &mut rng);
        let states = array![[0.3, -0.7], [1.1, 0.4], [-0.2, 0.9]];
        let actions = [0usize, 1, 0];
        let targets = [0.5, -0.3, 0.8];
        let batch_size = actions.len() as f64;

        let cache = network.forward_cached(&states);
        let mut output_gradient = Array2::zeros((actions.len(), 2));
        for (row, &action) in actions.iter().enumerate() {
            output_gradient[[row, action]] =
                2.0 * (cache.output[[row, action]] - targets[row]) / batch_size;
        }
        let gradients = network.backward(&cache, &output_gradient);

        let h = 1e-6;
        for layer_index in 0..network.layers().len() {
            let (rows, columns) = network.layers()[layer_index].weights.dim();
            for row in 0..rows {
                for column in 0..columns {
                    let original = network.layers()[layer_index].weights[[row, column]];
                    network.layers_mut()[layer_index].weights[[row, column]] = original + h;
                    let loss_plus = masked_mse(&network, &states, &actions, &targets);
                    network.layers_mut()[layer_index].weights[[row, column]] = original - h;
                    let loss_minus = masked_mse(&network, &states, &actions, &targets);
                    network.layers_mut()[layer_index].weights[[row, column]] = original;

                    let numeric = (loss_plus - loss_minus) / (2.0 * h);
                    let analytic = gradients.layers[layer_index].weights[[row, column]];
                    assert!(
                        (numeric - analytic).abs() < 1e-6,
                        "weight [{row}, {column}] of layer {layer_index}: \
                         numeric {numeric} vs analytic {analytic}"
                    );
                }
            }

            for index in 0..network.layers()[layer_index].bias.len() {
                let original = network.layers()[layer_index].bias[index];
                network.layers_mut()[layer_index].bias[index] = original + h;
                let loss_plus = masked_mse(&network, &states, &actions, &targets);
                network.layers_mut()[layer_index].bias[index] = original - h;
                let loss_minus = masked_mse(&network, &states, &actions, &targets);
                network.layers_mut()[layer_index].bias[index] = original;

                let numeric = (loss_plus - loss_minus) / (2.0 * h);
                let analytic = gradients.layers[layer_index].bias[index];
                assert!(
                    (numeric - analytic).abs() < 1e-6,
                    "bias {index} of layer {layer_index}: \
                     numeric {numeric} vs analytic {analytic}"
                );
            }
        }
    }

    #[test]
    fn copied_parameters_make_the_networks_identical() {
        let mut rng = build_rng(Some(5));
        let source = QNetwork::new(4, 3, 1, 8, Activation::Relu, &mut rng);
        let mut target = QNetwork::new(4, 3, 1, 8, Activation::Relu, &mut rng);
        assert_ne!(source, target);

        target.copy_parameters_from(&source);
        assert_eq!(source, target);

        // The copy must be by value, not by reference.
        target.layers_mut()[0].weights[[0, 0]] += 1.0;
        assert_ne!(source, target);
    }

    #[test]
    fn same_seed_builds_the_same_network() {
        let mut rng1 = build_rng(Some(77));
        let mut rng2 = build_rng(Some(77));
        let network1 = QNetwork::new(6, 2, 2, 16, Activation::Tanh, &mut rng1);
        let network2 = QNetwork::new(6, 2, 2, 16, Activation::Tanh, &mut rng2);
        assert_eq!(network1, network2);
    }

    #[test]
    fn gradient_norm_and_scaling_agree() {
        let mut gradients = Gradients {
            layers: vec![LayerGradients {
                weights: array![[3.0, 0.0], [0.0, 4.0]],
                bias: array![0.0, 0.0],
            }],
        };
        assert!((gradients.l2_norm() - 5.0).abs() < 1e-12);

        gradients.scale(0.5);
        assert!((gradients.l2_norm() - 2.5).abs() < 1e-12);
        assert_eq!(gradients.layers[0].weights[[0, 0]], 1.5);
    }
}
