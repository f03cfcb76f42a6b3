//! 2D Convolutional layer implementation
//!
//! This module provides a Convolution layer that slides a bank of filters over
//! a multi-channel 2-D input with configurable stride and zero padding.

use crate::layers::r#trait::{check_len, BufferVisitor, Differentiable};
use crate::optimizers::Sgd;
use crate::utils::SeededRng;
use serde::{Deserialize, Serialize};

/// Geometry of a convolution.
///
/// Inputs are flattened channel-major (`channel × height × width`, row-major
/// within a channel); outputs use the same layout over `out_channels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvolutionShape {
    pub in_channels: usize,
    pub height: usize,
    pub width: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl ConvolutionShape {
    /// Whether the kernel fits the padded input and every extent is nonzero.
    pub fn is_valid(&self) -> bool {
        self.in_channels > 0
            && self.out_channels > 0
            && self.kernel_size > 0
            && self.stride > 0
            && self.height + 2 * self.padding >= self.kernel_size
            && self.width + 2 * self.padding >= self.kernel_size
    }

    /// Output height: (height + 2*padding - kernel_size) / stride + 1
    pub fn output_height(&self) -> usize {
        (self.height + 2 * self.padding - self.kernel_size) / self.stride + 1
    }

    /// Output width: (width + 2*padding - kernel_size) / stride + 1
    pub fn output_width(&self) -> usize {
        (self.width + 2 * self.padding - self.kernel_size) / self.stride + 1
    }

    /// Flattened input width.
    pub fn input_len(&self) -> usize {
        self.in_channels * self.height * self.width
    }

    /// Flattened output width.
    pub fn output_len(&self) -> usize {
        self.out_channels * self.output_height() * self.output_width()
    }

    fn weight_len(&self) -> usize {
        self.out_channels * self.in_channels * self.kernel_size * self.kernel_size
    }
}

/// 2D Convolutional layer with learnable filters and per-channel biases.
///
/// # Fields
///
/// * `shape` - Channel counts, spatial extents, kernel size, stride and padding
/// * `weights` - Filters (out_channels × in_channels × kernel_size × kernel_size)
/// * `biases` - One bias per output channel
/// * `grad_weights`, `grad_biases` - Gradients summed over the current mini-batch
///
/// # Example
///
/// ```
/// use seqnet::layers::{Convolution, ConvolutionShape, Differentiable};
/// use seqnet::utils::SeededRng;
///
/// let shape = ConvolutionShape {
///     in_channels: 1, height: 28, width: 28,
///     out_channels: 6, kernel_size: 5, stride: 1, padding: 2,
/// };
/// let layer = Convolution::new(shape, 0.1, &mut SeededRng::new(42));
/// assert_eq!(layer.output_size(), 6 * 28 * 28);
/// assert_eq!(layer.parameter_count(), 6 * 25 + 6);
/// ```
#[derive(Debug, Clone)]
pub struct Convolution {
    shape: ConvolutionShape,
    out_height: usize,
    out_width: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
    grad_weights: Vec<f64>,
    grad_biases: Vec<f64>,
}

impl Convolution {
    /// Create a new Convolution with filters drawn from `Normal(0, sigma)`
    /// and zero biases.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is not valid (see [`ConvolutionShape::is_valid`]).
    pub fn new(shape: ConvolutionShape, sigma: f64, rng: &mut SeededRng) -> Self {
        let weights = (0..shape.weight_len()).map(|_| rng.gen_normal(sigma)).collect();
        Self::with_weights(shape, weights)
    }

    /// Create a Convolution from explicit filter weights and zero biases.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is invalid or `weights` has the wrong length.
    pub fn with_weights(shape: ConvolutionShape, weights: Vec<f64>) -> Self {
        assert!(shape.is_valid(), "invalid convolution geometry: {:?}", shape);
        check_len("weights", weights.len(), shape.weight_len());

        let weight_len = weights.len();
        Self {
            shape,
            out_height: shape.output_height(),
            out_width: shape.output_width(),
            weights,
            biases: vec![0.0; shape.out_channels],
            grad_weights: vec![0.0; weight_len],
            grad_biases: vec![0.0; shape.out_channels],
        }
    }

    /// Get the convolution geometry.
    pub fn shape(&self) -> &ConvolutionShape {
        &self.shape
    }

    /// Filter weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight gradients accumulated since the last clear.
    pub fn weight_gradients(&self) -> &[f64] {
        &self.grad_weights
    }

    /// Bias gradients accumulated since the last clear.
    pub fn bias_gradients(&self) -> &[f64] {
        &self.grad_biases
    }

    /// Calls `f(weight_index, input_index, output_index)` for every
    /// filter tap that lands inside the (unpadded) input.
    ///
    /// Forward, backward and gradient accumulation are all the same
    /// correlation visited in a different direction.
    fn for_each_tap(&self, mut f: impl FnMut(usize, usize, usize)) {
        let s = &self.shape;
        let k = s.kernel_size;
        let pad = s.padding as isize;

        for o in 0..s.out_channels {
            for oy in 0..self.out_height {
                for ox in 0..self.out_width {
                    let out_idx = (o * self.out_height + oy) * self.out_width + ox;
                    for c in 0..s.in_channels {
                        for ky in 0..k {
                            let iy = (oy * s.stride + ky) as isize - pad;
                            if iy < 0 || iy >= s.height as isize {
                                continue;
                            }
                            for kx in 0..k {
                                let ix = (ox * s.stride + kx) as isize - pad;
                                if ix < 0 || ix >= s.width as isize {
                                    continue;
                                }
                                let w_idx = ((o * s.in_channels + c) * k + ky) * k + kx;
                                let in_idx =
                                    (c * s.height + iy as usize) * s.width + ix as usize;
                                f(w_idx, in_idx, out_idx);
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Differentiable for Convolution {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        check_len("input", input.len(), self.shape.input_len());
        check_len("output", output.len(), self.shape.output_len());

        let plane = self.out_height * self.out_width;
        for (channel, bias) in output.chunks_exact_mut(plane).zip(&self.biases) {
            channel.fill(*bias);
        }
        let weights = &self.weights;
        self.for_each_tap(|w, i, o| output[o] += weights[w] * input[i]);
    }

    /// Full correlation of `grad_output` with the flipped filters, computed
    /// as the scatter transpose of the forward correlation.
    fn backward(&mut self, _input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("grad_output", grad_output.len(), self.shape.output_len());
        check_len("grad_input", grad_input.len(), self.shape.input_len());

        grad_input.fill(0.0);
        let weights = &self.weights;
        self.for_each_tap(|w, i, o| grad_input[i] += weights[w] * grad_output[o]);
    }

    fn accumulate_parameter_gradient(&mut self, input: &[f64], grad_output: &[f64]) {
        check_len("input", input.len(), self.shape.input_len());
        check_len("grad_output", grad_output.len(), self.shape.output_len());

        let mut grad_weights = std::mem::take(&mut self.grad_weights);
        self.for_each_tap(|w, i, o| grad_weights[w] += grad_output[o] * input[i]);
        self.grad_weights = grad_weights;

        let plane = self.out_height * self.out_width;
        for (gb, channel) in self.grad_biases.iter_mut().zip(grad_output.chunks_exact(plane)) {
            *gb += channel.iter().sum::<f64>();
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
        self.shape.input_len()
    }

    fn output_size(&self) -> usize {
        self.shape.output_len()
    }

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
