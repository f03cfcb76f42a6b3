//! The uniform operation table shared by layers and modules.
//!
//! Every differentiable block in a chain (a single layer, or a whole module
//! inside a network) exposes the same capability set: forward, backward,
//! per-sample parameter-gradient accumulation, gradient clearing and the SGD
//! update. [`crate::chain::Chain`] threads its boundary buffers through any
//! sequence of `Differentiable` items.

/// Visitor over a block's parameter or gradient buffers, one slice per call.
///
/// The distributed coordinator uses it with `E = CollectiveError` to
/// broadcast parameters and sum-reduce gradients buffer by buffer. Local
/// copies use `E = Infallible`.
pub type BufferVisitor<'a, E> = dyn FnMut(&mut [f64]) -> Result<(), E> + 'a;

/// Core trait for differentiable blocks.
///
/// Data is one sample at a time, flattened to `f64` slices. Buffers are owned
/// by the caller; implementations write into them in place and never
/// allocate per sample.
///
/// # Example
///
/// ```
/// use seqnet::layers::{Differentiable, Linear};
///
/// let mut layer = Linear::from_parameters(2, 1, vec![1.0, -1.0], vec![0.5]).unwrap();
/// let mut output = [0.0];
/// layer.forward(&[3.0, 1.0], &mut output);
/// assert_eq!(output, [2.5]);
///
/// let mut grad_input = [0.0; 2];
/// layer.backward(&[3.0, 1.0], &[1.0], &mut grad_input);
/// assert_eq!(grad_input, [1.0, -1.0]);
/// ```
pub trait Differentiable {
    /// Forward propagation of one sample.
    ///
    /// # Arguments
    ///
    /// * `input` - Input vector (`input_size()` values)
    /// * `output` - Output buffer (`output_size()` values)
    ///
    /// # Panics
    ///
    /// Implementations panic if buffer lengths don't match the block's widths.
    fn forward(&mut self, input: &[f64], output: &mut [f64]);

    /// Backward propagation of one sample.
    ///
    /// Applies the transpose of the local Jacobian to `grad_output` and writes
    /// the gradient with respect to the input into `grad_input`.
    ///
    /// # Notes
    ///
    /// - `input` must be the same data used in the paired forward call
    /// - Maxpool and Dropout rely on state recorded by that forward call
    fn backward(&mut self, input: &[f64], grad_output: &[f64], grad_input: &mut [f64]);

    /// Add this sample's contribution to the running parameter gradient.
    ///
    /// No-op for parameter-free blocks.
    fn accumulate_parameter_gradient(&mut self, _input: &[f64], _grad_output: &[f64]) {}

    /// Zero the running parameter gradient.
    fn clear_parameter_gradient(&mut self) {}

    /// Apply `parameter -= learning_rate * gradient / batch_size`.
    fn update_parameters(&mut self, _learning_rate: f64, _batch_size: usize) {}

    /// Switch between training and inference behaviour.
    fn set_training(&mut self, _training: bool) {}

    /// Expected number of input values per sample.
    fn input_size(&self) -> usize;

    /// Number of output values per sample.
    fn output_size(&self) -> usize;

    /// Number of trainable parameters.
    fn parameter_count(&self) -> usize {
        0
    }

    /// Visit every parameter buffer in a fixed order.
    fn visit_parameters<E>(&mut self, _visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        Ok(())
    }

    /// Visit every accumulated-gradient buffer, in the same order as
    /// [`Differentiable::visit_parameters`].
    fn visit_gradients<E>(&mut self, _visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        Ok(())
    }
}

/// Panic with a uniform message when a buffer has the wrong length.
pub(crate) fn check_len(name: &str, actual: usize, expected: usize) {
    assert_eq!(
        actual, expected,
        "{} len mismatch: expected {}, got {}",
        name, expected, actual
    );
}
