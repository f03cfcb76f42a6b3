//! Dropout layer implementation for regularization
//!
//! This module provides a Dropout layer that randomly drops (sets to zero) a
//! fraction of input units during training. During inference, all units are
//! kept and outputs are passed through unchanged.

use crate::layers::r#trait::{check_len, Differentiable};
use crate::utils::SeededRng;

/// Drop probability used when a descriptor does not give one.
pub const DEFAULT_DROP_RATE: f64 = 0.5;

/// Dropout layer for regularization.
///
/// During training, each unit is dropped with probability `drop_rate` and the
/// survivors are scaled by `1 / (1 - drop_rate)` so the expected activation is
/// unchanged. The sampled mask is kept until the next forward call, and the
/// paired backward call applies exactly that mask (with the same scale) to the
/// gradient. In inference mode both directions are the identity.
///
/// # Fields
///
/// * `size` - Number of input/output features (dropout doesn't change dimensions)
/// * `drop_rate` - Probability of dropping each unit
/// * `training` - Whether the next forward call samples a mask
/// * `mask` - 1.0 for kept units, 0.0 for dropped units, from the last forward pass
/// * `masked` - Whether the last forward pass applied `mask`
/// * `rng` - Layer-owned random state for mask sampling
///
/// # Example
///
/// ```
/// use seqnet::layers::{Differentiable, Dropout};
/// use seqnet::utils::SeededRng;
///
/// let mut layer = Dropout::new(4, 0.5, SeededRng::new(42));
/// layer.set_training(false);
/// let mut output = [0.0; 4];
/// layer.forward(&[1.0, 2.0, 3.0, 4.0], &mut output);
/// assert_eq!(output, [1.0, 2.0, 3.0, 4.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Dropout {
    size: usize,
    drop_rate: f64,
    training: bool,
    mask: Vec<f64>,
    masked: bool,
    rng: SeededRng,
}

impl Dropout {
    /// Creates a new dropout layer in inference mode.
    ///
    /// # Panics
    ///
    /// Panics if `drop_rate` is outside `[0.0, 1.0)`.
    pub fn new(size: usize, drop_rate: f64, rng: SeededRng) -> Self {
        assert!(
            (0.0..1.0).contains(&drop_rate),
            "drop_rate must be in range [0.0, 1.0)"
        );

        Self {
            size,
            drop_rate,
            training: false,
            mask: vec![1.0; size],
            masked: false,
            rng,
        }
    }

    /// Get whether the layer is in training mode.
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Get the dropout rate.
    pub fn drop_rate(&self) -> f64 {
        self.drop_rate
    }

    /// Mask sampled by the last training-mode forward pass.
    pub fn mask(&self) -> &[f64] {
        &self.mask
    }

    fn scale(&self) -> f64 {
        1.0 / (1.0 - self.drop_rate)
    }
}

impl Differentiable for Dropout {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        check_len("input", input.len(), self.size);
        check_len("output", output.len(), self.size);

        self.masked = self.training;
        if !self.training {
            output.copy_from_slice(input);
            return;
        }

        let scale = self.scale();
        for ((out, keep), &x) in output.iter_mut().zip(self.mask.iter_mut()).zip(input) {
            if self.rng.next_f64() >= self.drop_rate {
                *keep = 1.0;
                *out = x * scale;
            } else {
                *keep = 0.0;
                *out = 0.0;
            }
        }
    }

    /// Applies the mask recorded by the paired forward pass.
    fn backward(&mut self, _input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("grad_output", grad_output.len(), self.size);
        check_len("grad_input", grad_input.len(), self.size);

        if !self.masked {
            grad_input.copy_from_slice(grad_output);
            return;
        }

        let scale = self.scale();
        for ((gi, &g), &keep) in grad_input.iter_mut().zip(grad_output).zip(&self.mask) {
            *gi = g * keep * scale;
        }
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }
}
