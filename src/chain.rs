//! Ordered chains of differentiable blocks and their boundary buffers.
//!
//! A [`Chain`] is the mechanism shared by [`crate::module::Module`] (a chain
//! of layers) and [`crate::network::Network`] (a chain of modules). It owns
//! one activation buffer `z[i]` and one gradient buffer `delta[i]` per
//! boundary, allocated once at construction and reused for every sample, and
//! records the first structural problem found while wiring the chain.

use crate::layers::{BufferVisitor, Differentiable};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;

/// Structural state of a chain, decided once at construction.
///
/// Anything other than [`Validity::Valid`] is terminal: the chain can still
/// be described, but forward/backward/update calls panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Validity {
    Valid,
    /// Item `boundary` expects `actual` inputs but its predecessor produces
    /// `expected` outputs.
    SizeMismatch {
        boundary: usize,
        expected: usize,
        actual: usize,
    },
    /// The chain's declared input/output widths disagree with its first/last
    /// boundary.
    IoMismatch {
        declared_inputs: usize,
        declared_outputs: usize,
        actual_inputs: usize,
        actual_outputs: usize,
    },
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Valid => write!(f, "valid"),
            Validity::SizeMismatch {
                boundary,
                expected,
                actual,
            } => write!(
                f,
                "layer input/output size mismatch at boundary {}: previous output {}, next input {}",
                boundary, expected, actual
            ),
            Validity::IoMismatch {
                declared_inputs,
                declared_outputs,
                actual_inputs,
                actual_outputs,
            } => write!(
                f,
                "input/output size mismatch: declared {}->{}, chain is {}->{}",
                declared_inputs, declared_outputs, actual_inputs, actual_outputs
            ),
        }
    }
}

/// An ordered chain of blocks with an arena of boundary buffers.
#[derive(Debug, Clone)]
pub struct Chain<T> {
    inputs: usize,
    outputs: usize,
    items: Vec<T>,
    sizes: Vec<usize>,
    activations: Vec<Vec<f64>>,
    gradients: Vec<Vec<f64>>,
    parameters: usize,
    training: bool,
    validity: Validity,
}

impl<T: Differentiable> Chain<T> {
    /// Wire `items` into a chain declared as `inputs -> outputs`.
    ///
    /// Boundary `i` takes the input width of item `i` (boundary 0 the first
    /// item's input, the last boundary the last item's output). The first
    /// disagreement between an item's input and its predecessor's output is
    /// recorded as [`Validity::SizeMismatch`]; if the chain is otherwise
    /// consistent, a disagreement with the declared widths is recorded as
    /// [`Validity::IoMismatch`].
    pub fn new(inputs: usize, outputs: usize, items: Vec<T>) -> Self {
        let mut validity = Validity::Valid;
        let mut sizes = Vec::with_capacity(items.len() + 1);
        let mut parameters = 0;

        sizes.push(items.first().map_or(inputs, |item| item.input_size()));
        for (i, item) in items.iter().enumerate() {
            let produced = sizes[i];
            if i > 0 && produced != item.input_size() && validity.is_valid() {
                validity = Validity::SizeMismatch {
                    boundary: i,
                    expected: produced,
                    actual: item.input_size(),
                };
            }
            sizes[i] = item.input_size();
            sizes.push(item.output_size());
            parameters += item.parameter_count();
        }

        let actual_inputs = sizes[0];
        let actual_outputs = sizes[sizes.len() - 1];
        if validity.is_valid() && (inputs != actual_inputs || outputs != actual_outputs) {
            validity = Validity::IoMismatch {
                declared_inputs: inputs,
                declared_outputs: outputs,
                actual_inputs,
                actual_outputs,
            };
        }

        if !validity.is_valid() {
            log::warn!("chain of {} items is invalid: {}", items.len(), validity);
        }

        let activations = sizes.iter().map(|&n| vec![0.0; n]).collect();
        let gradients = sizes.iter().map(|&n| vec![0.0; n]).collect();

        Self {
            inputs,
            outputs,
            items,
            sizes,
            activations,
            gradients,
            parameters,
            training: false,
            validity,
        }
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// Declared input width.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Declared output width.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Boundary widths, one more than the number of items.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Mode threaded down to every item on the next forward call.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Output of the most recent forward call.
    pub fn last_output(&self) -> &[f64] {
        &self.activations[self.items.len()]
    }

    fn assert_valid(&self) {
        assert!(
            self.validity.is_valid(),
            "operation on an invalid chain: {}",
            self.validity
        );
    }

    /// Copy `input` into boundary 0, run every item in order, copy the last
    /// boundary into `output`.
    pub fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        self.assert_valid();
        let n = self.items.len();
        self.activations[0].copy_from_slice(input);
        for (i, item) in self.items.iter_mut().enumerate() {
            item.set_training(self.training);
            let (head, tail) = self.activations.split_at_mut(i + 1);
            item.forward(&head[i], &mut tail[0]);
        }
        output.copy_from_slice(&self.activations[n]);
    }

    /// Copy `grad_output` into the last gradient boundary, run every item in
    /// reverse order, copy the boundary-0 gradient into `grad_input`.
    ///
    /// Must follow the forward call for the same sample.
    pub fn backward(&mut self, grad_output: &[f64], grad_input: &mut [f64]) {
        self.assert_valid();
        let n = self.items.len();
        self.gradients[n].copy_from_slice(grad_output);
        for i in (0..n).rev() {
            let (head, tail) = self.gradients.split_at_mut(i + 1);
            self.items[i].backward(&self.activations[i], &tail[0], &mut head[i]);
        }
        grad_input.copy_from_slice(&self.gradients[0]);
    }

    /// Accumulate parameter gradients of every parametric item from the
    /// buffers of the last forward/backward pair.
    pub fn accumulate_parameter_gradients(&mut self) {
        self.assert_valid();
        for (i, item) in self.items.iter_mut().enumerate() {
            if item.parameter_count() > 0 {
                item.accumulate_parameter_gradient(&self.activations[i], &self.gradients[i + 1]);
            }
        }
    }

    pub fn clear_parameter_gradients(&mut self) {
        for item in self.items.iter_mut().filter(|item| item.parameter_count() > 0) {
            item.clear_parameter_gradient();
        }
    }

    pub fn update_parameters(&mut self, learning_rate: f64, batch_size: usize) {
        self.assert_valid();
        for item in self.items.iter_mut().filter(|item| item.parameter_count() > 0) {
            item.update_parameters(learning_rate, batch_size);
        }
    }

    pub fn visit_parameters<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        for item in self.items.iter_mut().filter(|item| item.parameter_count() > 0) {
            item.visit_parameters(visitor)?;
        }
        Ok(())
    }

    pub fn visit_gradients<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        for item in self.items.iter_mut().filter(|item| item.parameter_count() > 0) {
            item.visit_gradients(visitor)?;
        }
        Ok(())
    }

    /// Call `f` on every parameter buffer, in visiting order.
    pub fn for_each_parameter_buffer(&mut self, mut f: impl FnMut(&mut [f64])) {
        let visited = self.visit_parameters::<Infallible>(&mut |buffer: &mut [f64]| {
            f(buffer);
            Ok(())
        });
        match visited {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Call `f` on every accumulated-gradient buffer, in visiting order.
    pub fn for_each_gradient_buffer(&mut self, mut f: impl FnMut(&mut [f64])) {
        let visited = self.visit_gradients::<Infallible>(&mut |buffer: &mut [f64]| {
            f(buffer);
            Ok(())
        });
        match visited {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Layer, Linear, Relu};

    fn linear(inputs: usize, outputs: usize) -> Layer {
        Linear::from_parameters(inputs, outputs, vec![1.0; inputs * outputs], vec![0.0; outputs])
            .unwrap()
            .into()
    }

    #[test]
    fn test_valid_chain_sizes() {
        let chain = Chain::new(3, 2, vec![linear(3, 4), Relu::new(4).into(), linear(4, 2)]);
        assert_eq!(chain.validity(), Validity::Valid);
        assert_eq!(chain.sizes(), &[3, 4, 4, 2]);
        assert_eq!(chain.parameter_count(), 12 + 4 + 8 + 2);
    }

    #[test]
    fn test_size_mismatch_records_first() {
        let chain = Chain::new(3, 2, vec![linear(3, 4), linear(5, 6), linear(7, 2)]);
        assert_eq!(
            chain.validity(),
            Validity::SizeMismatch {
                boundary: 1,
                expected: 4,
                actual: 5
            }
        );
    }

    #[test]
    fn test_io_mismatch() {
        let chain = Chain::new(3, 3, vec![linear(3, 2)]);
        assert!(matches!(chain.validity(), Validity::IoMismatch { .. }));
    }

    #[test]
    fn test_size_mismatch_wins_over_io_mismatch() {
        let chain = Chain::new(9, 9, vec![linear(3, 4), linear(5, 2)]);
        assert!(matches!(chain.validity(), Validity::SizeMismatch { .. }));
    }

    #[test]
    #[should_panic(expected = "operation on an invalid chain")]
    fn test_forward_on_invalid_chain_panics() {
        let mut chain = Chain::new(3, 3, vec![linear(3, 2)]);
        let mut out = [0.0; 2];
        chain.forward(&[0.0; 3], &mut out);
    }

    #[test]
    fn test_forward_backward_threads_buffers() {
        let mut chain = Chain::new(2, 1, vec![linear(2, 2), Relu::new(2).into(), linear(2, 1)]);
        let mut out = [0.0];
        chain.forward(&[1.0, -3.0], &mut out);
        // Hidden pre-activation is [-2, -2]; ReLU zeroes it.
        assert_eq!(out, [0.0]);
        assert_eq!(chain.last_output(), &[0.0]);

        let mut grad_input = [0.0; 2];
        chain.backward(&[1.0], &mut grad_input);
        assert_eq!(grad_input, [0.0, 0.0]);
    }

    #[test]
    fn test_for_each_buffer_visits_parameterised_items_in_order() {
        let mut chain = Chain::new(2, 1, vec![linear(2, 3), Relu::new(3).into(), linear(3, 1)]);
        let mut lengths = Vec::new();
        chain.for_each_parameter_buffer(|buffer| lengths.push(buffer.len()));
        assert_eq!(lengths, [6, 3, 3, 1]);

        let mut next = 0.0;
        chain.for_each_parameter_buffer(|buffer| {
            for value in buffer.iter_mut() {
                *value = next;
                next += 1.0;
            }
        });
        let mut seen = Vec::new();
        chain.for_each_parameter_buffer(|buffer| seen.extend_from_slice(buffer));
        assert_eq!(seen, (0..13).map(|i| i as f64).collect::<Vec<_>>());

        let mut gradients = 0;
        chain.for_each_gradient_buffer(|buffer| {
            assert!(buffer.iter().all(|&g| g == 0.0));
            gradients += buffer.len();
        });
        assert_eq!(gradients, chain.parameter_count());
    }
}
