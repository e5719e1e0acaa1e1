use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::activations::Activation;

/// Weight initialization strategies
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightInit {
    /// He/Kaiming uniform initialization (for ReLU)
    #[default]
    HeUniform,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },
}

impl WeightInit {
    pub fn initialize<R: Rng + ?Sized>(&self, shape: (usize, usize), rng: &mut R) -> Array2<f32> {
        let fan_in = shape.0.max(1) as f32;
        match *self {
            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in).sqrt();
                Array2::random_using(shape, Uniform::new(-limit, limit), rng)
            }
            WeightInit::HeNormal => {
                let std = (2.0 / fan_in).sqrt();
                match Normal::new(0.0, std) {
                    Ok(normal) => Array2::random_using(shape, normal, rng),
                    Err(_) => Array2::zeros(shape),
                }
            }
            WeightInit::Uniform { min, max } => {
                Array2::random_using(shape, Uniform::new(min, max), rng)
            }
        }
    }
}

/// A fully connected (dense) layer in a neural network
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer. Biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        init: WeightInit,
        rng: &mut R,
    ) -> Self {
        DenseLayer {
            weights: init.initialize((input_size, output_size), rng),
            biases: Array1::zeros(output_size),
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Forward pass without touching the backprop cache.
    pub fn infer(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Forward pass that remembers inputs and pre-activations for [`DenseLayer::backward_batch`].
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Returns `(adjusted_error, weight_gradients, bias_gradients)`, or `None`
    /// if no forward pass was cached.
    pub fn backward_batch(
        &self,
        output_errors: ArrayView2<f32>,
    ) -> Option<(Array2<f32>, Array2<f32>, Array1<f32>)> {
        let pre_activation_output = self.pre_activation_output.as_ref()?;
        let inputs = self.inputs.as_ref()?;

        let activation_deriv = self.activation.derivative_batch(pre_activation_output.view());
        let adjusted_error = &output_errors * &activation_deriv;
        let weight_gradients = inputs.t().dot(&adjusted_error);
        let bias_gradients = adjusted_error.sum_axis(Axis(0));

        Some((adjusted_error, weight_gradients, bias_gradients))
    }

    /// Drop cached activations.
    pub fn clear_cache(&mut self) {
        self.inputs = None;
        self.pre_activation_output = None;
    }
}
