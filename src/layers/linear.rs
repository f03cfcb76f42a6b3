//! Linear (fully connected) layer implementation
//!
//! This module provides a Linear layer that performs the transformation:
//! output = W · input + b

use crate::error::ConfigError;
use crate::layers::r#trait::{check_len, BufferVisitor, Differentiable};
use crate::optimizers::Sgd;
use crate::utils::SeededRng;

/// Linear (fully connected) layer with weights and biases.
///
/// Performs the affine transformation `y = Wx + b` where `W` is stored
/// row-major as `outputs × inputs` (row `o` holds the weights feeding output
/// unit `o`) and `b` has one entry per output.
///
/// # Fields
///
/// * `inputs` - Number of input features
/// * `outputs` - Number of output features
/// * `weights` - Weight matrix (outputs × inputs)
/// * `biases` - Bias vector (outputs)
/// * `grad_weights`, `grad_biases` - Gradients summed over the current mini-batch
///
/// # Example
///
/// ```
/// use seqnet::layers::{Differentiable, Linear};
/// use seqnet::utils::SeededRng;
///
/// let mut rng = SeededRng::new(42);
/// let layer = Linear::new(784, 64, 0.1, &mut rng);
/// assert_eq!(layer.input_size(), 784);
/// assert_eq!(layer.output_size(), 64);
/// assert_eq!(layer.parameter_count(), 784 * 64 + 64);
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
    grad_weights: Vec<f64>,
    grad_biases: Vec<f64>,
}

impl Linear {
    /// Create a new Linear layer with normally distributed weights.
    ///
    /// Weights are drawn from `Normal(0, sigma)`; biases start at zero.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Number of input features
    /// * `outputs` - Number of output features
    /// * `sigma` - Standard deviation of the weight initialisation
    /// * `rng` - Random number generator for weight initialization
    pub fn new(inputs: usize, outputs: usize, sigma: f64, rng: &mut SeededRng) -> Self {
        let weights = (0..inputs * outputs).map(|_| rng.gen_normal(sigma)).collect();

        Self {
            inputs,
            outputs,
            weights,
            biases: vec![0.0; outputs],
            grad_weights: vec![0.0; inputs * outputs],
            grad_biases: vec![0.0; outputs],
        }
    }

    /// Create a Linear layer from explicit parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `weights` is not
    /// `outputs × inputs` long or `biases` is not `outputs` long.
    pub fn from_parameters(
        inputs: usize,
        outputs: usize,
        weights: Vec<f64>,
        biases: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if weights.len() != inputs * outputs || biases.len() != outputs {
            return Err(ConfigError::InvalidValue(format!(
                "linear {}x{} needs {} weights and {} biases, got {} and {}",
                inputs,
                outputs,
                inputs * outputs,
                outputs,
                weights.len(),
                biases.len()
            )));
        }

        Ok(Self {
            inputs,
            outputs,
            weights,
            biases,
            grad_weights: vec![0.0; inputs * outputs],
            grad_biases: vec![0.0; outputs],
        })
    }

    /// Weight matrix, row-major `outputs × inputs`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Bias vector.
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// Weight gradients accumulated since the last clear.
    pub fn weight_gradients(&self) -> &[f64] {
        &self.grad_weights
    }

    /// Bias gradients accumulated since the last clear.
    pub fn bias_gradients(&self) -> &[f64] {
        &self.grad_biases
    }
}

impl Differentiable for Linear {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        check_len("input", input.len(), self.inputs);
        check_len("output", output.len(), self.outputs);

        for (o, out) in output.iter_mut().enumerate() {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            *out = self.biases[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
        }
    }

    /// Computes `grad_input = Wᵀ · grad_output`.
    fn backward(&mut self, _input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("grad_output", grad_output.len(), self.outputs);
        check_len("grad_input", grad_input.len(), self.inputs);

        grad_input.fill(0.0);
        for (o, &g) in grad_output.iter().enumerate() {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            for (gi, w) in grad_input.iter_mut().zip(row) {
                *gi += w * g;
            }
        }
    }

    /// Adds `grad_output · inputᵀ` to the weight gradient and `grad_output`
    /// to the bias gradient.
    fn accumulate_parameter_gradient(&mut self, input: &[f64], grad_output: &[f64]) {
        check_len("input", input.len(), self.inputs);
        check_len("grad_output", grad_output.len(), self.outputs);

        for (o, &g) in grad_output.iter().enumerate() {
            let row = &mut self.grad_weights[o * self.inputs..(o + 1) * self.inputs];
            for (gw, x) in row.iter_mut().zip(input) {
                *gw += g * x;
            }
            self.grad_biases[o] += g;
        }
    }

    fn clear_parameter_gradient(&mut self) {
        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
    }

    fn update_parameters(&mut self, learning_rate: f64, batch_size: usize) {
        let sgd = Sgd::new(learning_rate);
        sgd.step(&mut self.weights, &self.grad_weights, batch_size);
        sgd.step(&mut self.biases, &self.grad_biases, batch_size);
    }

    fn input_size(&self) -> usize {
        self.inputs
    }

    fn output_size(&self) -> usize {
        self.outputs
    }

    /// Returns outputs × inputs (weights) + outputs (biases).
    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn visit_parameters<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        visitor(&mut self.weights)?;
        visitor(&mut self.biases)
    }

    fn visit_gradients<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        visitor(&mut self.grad_weights)?;
        visitor(&mut self.grad_biases)
    }
}
