//! Layer abstractions for neural networks
//!
//! This module provides the [`Differentiable`] operation table and the fixed
//! set of layer types, unified under the [`Layer`] enum so a module can hold a
//! heterogeneous chain without trait objects.

pub(crate) mod r#trait;
pub mod activation;
pub mod conv2d;
pub mod dropout;
pub mod linear;
pub mod maxpool;

pub use activation::{Relu, Sigmoid, Softmax};
pub use conv2d::{Convolution, ConvolutionShape};
pub use dropout::Dropout;
pub use linear::Linear;
pub use maxpool::{Maxpool, MaxpoolShape};
pub use r#trait::{BufferVisitor, Differentiable};

use serde::{Deserialize, Serialize};

/// Layer type tags, numbered as in the integer descriptor format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Linear,
    Dropout,
    Convolution,
    Maxpool,
    Sigmoid,
    Relu,
    Softmax,
}

impl LayerKind {
    pub const ALL: [LayerKind; 7] = [
        LayerKind::Linear,
        LayerKind::Dropout,
        LayerKind::Convolution,
        LayerKind::Maxpool,
        LayerKind::Sigmoid,
        LayerKind::Relu,
        LayerKind::Softmax,
    ];

    /// Integer tag used in descriptors.
    pub const fn tag(self) -> usize {
        match self {
            LayerKind::Linear => 101,
            LayerKind::Dropout => 102,
            LayerKind::Convolution => 103,
            LayerKind::Maxpool => 104,
            LayerKind::Sigmoid => 201,
            LayerKind::Relu => 202,
            LayerKind::Softmax => 203,
        }
    }

    pub fn from_tag(tag: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub const fn name(self) -> &'static str {
        match self {
            LayerKind::Linear => "linear",
            LayerKind::Dropout => "dropout",
            LayerKind::Convolution => "convolution",
            LayerKind::Maxpool => "maxpool",
            LayerKind::Sigmoid => "sigmoid",
            LayerKind::Relu => "relu",
            LayerKind::Softmax => "softmax",
        }
    }

    /// Whether a layer of this kind takes its width from its predecessor
    /// when it is not first in a chain.
    pub const fn inherits_width(self) -> bool {
        matches!(
            self,
            LayerKind::Dropout | LayerKind::Sigmoid | LayerKind::Relu | LayerKind::Softmax
        )
    }
}

/// Shape and size of one layer, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDescription {
    pub kind: LayerKind,
    pub inputs: usize,
    pub outputs: usize,
    pub parameters: usize,
}

/// One differentiable layer of any supported type.
#[derive(Debug, Clone)]
pub enum Layer {
    Linear(Linear),
    Convolution(Convolution),
    Maxpool(Maxpool),
    Dropout(Dropout),
    Sigmoid(Sigmoid),
    Relu(Relu),
    Softmax(Softmax),
}

macro_rules! dispatch {
    ($layer:expr, $inner:ident => $body:expr) => {
        match $layer {
            Layer::Linear($inner) => $body,
            Layer::Convolution($inner) => $body,
            Layer::Maxpool($inner) => $body,
            Layer::Dropout($inner) => $body,
            Layer::Sigmoid($inner) => $body,
            Layer::Relu($inner) => $body,
            Layer::Softmax($inner) => $body,
        }
    };
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Linear(_) => LayerKind::Linear,
            Layer::Convolution(_) => LayerKind::Convolution,
            Layer::Maxpool(_) => LayerKind::Maxpool,
            Layer::Dropout(_) => LayerKind::Dropout,
            Layer::Sigmoid(_) => LayerKind::Sigmoid,
            Layer::Relu(_) => LayerKind::Relu,
            Layer::Softmax(_) => LayerKind::Softmax,
        }
    }

    pub fn describe(&self) -> LayerDescription {
        LayerDescription {
            kind: self.kind(),
            inputs: self.input_size(),
            outputs: self.output_size(),
            parameters: self.parameter_count(),
        }
    }
}

impl Differentiable for Layer {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        dispatch!(self, layer => layer.forward(input, output))
    }

    fn backward(&mut self, input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        dispatch!(self, layer => layer.backward(input, grad_output, grad_input))
    }

    fn accumulate_parameter_gradient(&mut self, input: &[f64], grad_output: &[f64]) {
        dispatch!(self, layer => layer.accumulate_parameter_gradient(input, grad_output))
    }

    fn clear_parameter_gradient(&mut self) {
        dispatch!(self, layer => layer.clear_parameter_gradient())
    }

    fn update_parameters(&mut self, learning_rate: f64, batch_size: usize) {
        dispatch!(self, layer => layer.update_parameters(learning_rate, batch_size))
    }

    fn set_training(&mut self, training: bool) {
        dispatch!(self, layer => layer.set_training(training))
    }

    fn input_size(&self) -> usize {
        dispatch!(self, layer => layer.input_size())
    }

    fn output_size(&self) -> usize {
        dispatch!(self, layer => layer.output_size())
    }

    fn parameter_count(&self) -> usize {
        dispatch!(self, layer => layer.parameter_count())
    }

    fn visit_parameters<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        dispatch!(self, layer => layer.visit_parameters(visitor))
    }

    fn visit_gradients<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        dispatch!(self, layer => layer.visit_gradients(visitor))
    }
}

macro_rules! impl_from_layer {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Layer {
                fn from(layer: $variant) -> Self {
                    Layer::$variant(layer)
                }
            }
        )*
    };
}

impl_from_layer!(Linear, Convolution, Maxpool, Dropout, Sigmoid, Relu, Softmax);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(LayerKind::from_tag(999), None);
    }

    #[test]
    fn test_inherits_width() {
        assert!(LayerKind::Relu.inherits_width());
        assert!(LayerKind::Dropout.inherits_width());
        assert!(!LayerKind::Linear.inherits_width());
        assert!(!LayerKind::Maxpool.inherits_width());
    }

    #[test]
    fn test_describe() {
        let layer: Layer = Relu::new(16).into();
        let description = layer.describe();
        assert_eq!(description.kind, LayerKind::Relu);
        assert_eq!(description.inputs, 16);
        assert_eq!(description.outputs, 16);
        assert_eq!(description.parameters, 0);
    }
}
