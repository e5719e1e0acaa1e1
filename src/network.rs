use std::fs;
use std::path::Path;

use bincode::{deserialize, serialize};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{MazeError, Result};
use crate::layers::{DenseLayer, WeightInit};
use crate::loss::LossKind;
use crate::model::{LayerParams, QModel};
use crate::optimizer::{Optimizer, OptimizerKind, OptimizerWrapper};

/// Architecture and training settings of a Q-network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layer widths.
    pub hidden: Vec<usize>,
    /// Activation of the hidden layers. The output layer is linear.
    pub activation: Activation,
    pub init: WeightInit,
    pub loss: LossKind,
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            hidden: vec![64, 64],
            activation: Activation::LeakyRelu { alpha: 0.01 },
            init: WeightInit::HeUniform,
            loss: LossKind::default(),
            optimizer: OptimizerKind::default(),
            learning_rate: 0.001,
        }
    }
}

impl NetworkConfig {
    pub fn hidden(mut self, hidden: &[usize]) -> Self {
        self.hidden = hidden.to_vec();
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }
}

/// A multi-layer perceptron mapping a state feature vector to one Q-value per action.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NeuralNetwork {
    pub layers: Vec<DenseLayer>,
    pub optimizer: OptimizerWrapper,
    pub loss: LossKind,
    pub learning_rate: f32,
}

impl NeuralNetwork {
    /// Create a network with `input_dim` inputs, `config.hidden` hidden layers
    /// and `num_actions` linear outputs.
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        num_actions: usize,
        config: &NetworkConfig,
        rng: &mut R,
    ) -> Result<Self> {
        if input_dim == 0 || num_actions == 0 || config.hidden.iter().any(|&h| h == 0) {
            return Err(MazeError::invalid_parameter(
                "layer_sizes",
                "every layer needs at least one unit",
            ));
        }
        if !(config.learning_rate > 0.0) {
            return Err(MazeError::invalid_parameter("learning_rate", "must be positive"));
        }

        let mut sizes = Vec::with_capacity(config.hidden.len() + 2);
        sizes.push(input_dim);
        sizes.extend_from_slice(&config.hidden);
        sizes.push(num_actions);

        let last = sizes.len() - 2;
        let layers: Vec<DenseLayer> = sizes
            .windows(2)
            .enumerate()
            .map(|(i, window)| {
                let activation = if i == last { Activation::Linear } else { config.activation };
                DenseLayer::new(window[0], window[1], activation, config.init, rng)
            })
            .collect();

        let optimizer = config.optimizer.build(&layers);
        Ok(NeuralNetwork {
            layers,
            optimizer,
            loss: config.loss,
            learning_rate: config.learning_rate,
        })
    }

    /// Forward pass for a batch, caching activations for backpropagation.
    fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current_output = inputs.to_owned();
        for layer in &mut self.layers {
            current_output = layer.forward_batch(current_output.view());
        }
        current_output
    }

    /// Gradients for every layer, input layer first.
    fn backward_batch(&mut self, output_errors: ArrayView2<f32>) -> Result<Vec<(Array2<f32>, ndarray::Array1<f32>)>> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut current_error = output_errors.to_owned();

        for (i, layer) in self.layers.iter().enumerate().rev() {
            let (adjusted_error, weight_gradients, bias_gradients) = layer
                .backward_batch(current_error.view())
                .ok_or_else(|| MazeError::invalid_parameter("network", "backward pass without forward pass"))?;
            gradients.push((weight_gradients, bias_gradients));

            if i != 0 {
                current_error = adjusted_error.dot(&layer.weights.t());
            }
        }

        gradients.reverse();
        Ok(gradients)
    }

    /// Check that consecutive layers chain, that biases match layer outputs
    /// and that the optimizer state fits the layers.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(MazeError::invalid_parameter("model", "file contains no layers"));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.biases.len() != layer.output_size() {
                return Err(MazeError::dimension_mismatch(
                    format!("layer {} biases of length {}", i, layer.output_size()),
                    format!("{}", layer.biases.len()),
                ));
            }
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(MazeError::dimension_mismatch(
                    format!("layer {} input size {}", i + 1, pair[0].output_size()),
                    format!("{}", pair[1].input_size()),
                ));
            }
        }
        self.optimizer.check_layers(&self.layers)
    }

    fn check_input(&self, inputs: ArrayView2<f32>) -> Result<()> {
        if inputs.ncols() != self.input_dim() {
            return Err(MazeError::dimension_mismatch(
                format!("{} input features", self.input_dim()),
                format!("{}", inputs.ncols()),
            ));
        }
        Ok(())
    }
}

impl QModel for NeuralNetwork {
    fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::input_size).unwrap_or(0)
    }

    fn num_actions(&self) -> usize {
        self.layers.last().map(DenseLayer::output_size).unwrap_or(0)
    }

    fn predict(&self, states: ArrayView2<f32>) -> Array2<f32> {
        let mut current_output = states.to_owned();
        for layer in &self.layers {
            current_output = layer.infer(current_output.view());
        }
        current_output
    }

    fn fit_one_step(&mut self, inputs: ArrayView2<f32>, targets: ArrayView2<f32>) -> Result<f32> {
        self.check_input(inputs)?;
        if targets.dim() != (inputs.nrows(), self.num_actions()) {
            return Err(MazeError::dimension_mismatch(
                format!("targets of shape ({}, {})", inputs.nrows(), self.num_actions()),
                format!("{:?}", targets.dim()),
            ));
        }

        let outputs = self.forward_batch(inputs);
        let loss = self.loss.compute_batch(outputs.view(), targets);
        let output_errors = self.loss.gradient_batch(outputs.view(), targets);
        let gradients = self.backward_batch(output_errors.view())?;

        let learning_rate = self.learning_rate;
        self.optimizer.begin_step();
        for (i, (layer, (weight_gradients, bias_gradients))) in self.layers.iter_mut().zip(gradients).enumerate() {
            self.optimizer.update_weights(i, &mut layer.weights, &weight_gradients, learning_rate);
            self.optimizer.update_biases(i, &mut layer.biases, &bias_gradients, learning_rate);
            layer.clear_cache();
        }

        Ok(loss)
    }

    fn weights(&self) -> Vec<LayerParams> {
        self.layers
            .iter()
            .map(|layer| LayerParams {
                weights: layer.weights.clone(),
                biases: layer.biases.clone(),
            })
            .collect()
    }

    fn set_weights(&mut self, params: &[LayerParams]) -> Result<()> {
        if params.len() != self.layers.len() {
            return Err(MazeError::dimension_mismatch(
                format!("{} layers", self.layers.len()),
                format!("{} layers", params.len()),
            ));
        }
        for (i, (layer, p)) in self.layers.iter().zip(params).enumerate() {
            if layer.weights.dim() != p.weights.dim() || layer.biases.dim() != p.biases.dim() {
                return Err(MazeError::dimension_mismatch(
                    format!("layer {} weights {:?}", i, layer.weights.dim()),
                    format!("layer {} weights {:?}", i, p.weights.dim()),
                ));
            }
        }
        for (layer, p) in self.layers.iter_mut().zip(params) {
            layer.weights.assign(&p.weights);
            layer.biases.assign(&p.biases);
            layer.clear_cache();
        }
        Ok(())
    }

    /// Serialize the network, including its layers and optimizer state, with bincode.
    fn save(&self, path: &Path) -> Result<()> {
        let serialized = serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let buffer = fs::read(path)?;
        let network: Self = deserialize(&buffer)?;
        network.validate()?;
        Ok(network)
    }
}
