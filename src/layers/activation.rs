//! Pointwise activation layers: Sigmoid, ReLU and Softmax.
//!
//! None of them has parameters. Their width is normally inherited from the
//! preceding layer (see [`crate::architecture`]).

use crate::layers::r#trait::{check_len, Differentiable};
use crate::utils::activations::{relu, relu_derivative, sigmoid, sigmoid_derivative, softmax};

/// Elementwise logistic sigmoid.
#[derive(Debug, Clone)]
pub struct Sigmoid {
    size: usize,
}

impl Sigmoid {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl Differentiable for Sigmoid {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        check_len("input", input.len(), self.size);
        check_len("output", output.len(), self.size);
        for (out, &x) in output.iter_mut().zip(input) {
            *out = sigmoid(x);
        }
    }

    fn backward(&mut self, input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("input", input.len(), self.size);
        check_len("grad_output", grad_output.len(), self.size);
        check_len("grad_input", grad_input.len(), self.size);
        for ((gi, &g), &x) in grad_input.iter_mut().zip(grad_output).zip(input) {
            *gi = g * sigmoid_derivative(sigmoid(x));
        }
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }
}

/// Elementwise rectified linear unit.
#[derive(Debug, Clone)]
pub struct Relu {
    size: usize,
}

impl Relu {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl Differentiable for Relu {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        check_len("input", input.len(), self.size);
        check_len("output", output.len(), self.size);
        for (out, &x) in output.iter_mut().zip(input) {
            *out = relu(x);
        }
    }

    fn backward(&mut self, input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("input", input.len(), self.size);
        check_len("grad_output", grad_output.len(), self.size);
        check_len("grad_input", grad_input.len(), self.size);
        for ((gi, &g), &x) in grad_input.iter_mut().zip(grad_output).zip(input) {
            *gi = g * relu_derivative(x);
        }
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }
}

/// Softmax output layer.
///
/// Only meaningful as the last layer of a classifier trained with
/// cross-entropy. Its backward pass is the identity: the gradient fed into it
/// must already be `p - one_hot(label)`, the closed form of the softmax
/// Jacobian composed with the cross-entropy gradient
/// (see [`crate::loss::softmax_cross_entropy_gradient`]).
#[derive(Debug, Clone)]
pub struct Softmax {
    size: usize,
}

impl Softmax {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl Differentiable for Softmax {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        check_len("input", input.len(), self.size);
        softmax(input, output);
    }

    fn backward(&mut self, _input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("grad_output", grad_output.len(), self.size);
        check_len("grad_input", grad_input.len(), self.size);
        grad_input.copy_from_slice(grad_output);
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }
}
