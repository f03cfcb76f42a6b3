//! Modules: ordered chains of layers forming one differentiable sub-network.
//!
//! A module is itself [`Differentiable`], so a [`crate::network::Network`]
//! treats each module as an opaque block and threads its own boundary buffers
//! through them exactly as a module does through its layers.

use crate::chain::{Chain, Validity};
use crate::layers::{BufferVisitor, Differentiable, Layer, LayerDescription};
use serde::{Deserialize, Serialize};

/// Module type tags. Only sequential chains exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Sequential,
}

impl ModuleKind {
    /// Integer tag used in descriptors.
    pub const fn tag(self) -> usize {
        match self {
            ModuleKind::Sequential => 1001,
        }
    }

    pub fn from_tag(tag: usize) -> Option<Self> {
        (tag == ModuleKind::Sequential.tag()).then_some(ModuleKind::Sequential)
    }
}

/// Structure of a module, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDescription {
    pub kind: ModuleKind,
    pub inputs: usize,
    pub outputs: usize,
    pub parameters: usize,
    pub validity: Validity,
    pub layers: Vec<LayerDescription>,
}

/// A sequential chain of layers with declared input and output widths.
///
/// # Example
///
/// ```
/// use seqnet::layers::{Differentiable, Layer, Linear, Relu};
/// use seqnet::module::Module;
/// use seqnet::utils::SeededRng;
///
/// let mut rng = SeededRng::new(1);
/// let layers: Vec<Layer> = vec![
///     Linear::new(4, 8, 0.1, &mut rng).into(),
///     Relu::new(8).into(),
///     Linear::new(8, 2, 0.1, &mut rng).into(),
/// ];
/// let module = Module::sequential(4, 2, layers);
/// assert!(module.validity().is_valid());
/// assert_eq!(module.parameter_count(), 4 * 8 + 8 + 8 * 2 + 2);
/// ```
#[derive(Debug, Clone)]
pub struct Module {
    kind: ModuleKind,
    chain: Chain<Layer>,
}

impl Module {
    /// Wire `layers` into a sequential module declared as `inputs -> outputs`.
    ///
    /// Width problems are recorded in [`Module::validity`], never raised.
    pub fn sequential(inputs: usize, outputs: usize, layers: Vec<Layer>) -> Self {
        let chain = Chain::new(inputs, outputs, layers);
        log::debug!(
            "sequential module {}->{}: {} layers, {} parameters",
            inputs,
            outputs,
            chain.len(),
            chain.parameter_count()
        );
        Self {
            kind: ModuleKind::Sequential,
            chain,
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn validity(&self) -> Validity {
        self.chain.validity()
    }

    pub fn layers(&self) -> &[Layer] {
        self.chain.items()
    }

    /// Boundary widths (layers + 1).
    pub fn layer_sizes(&self) -> &[usize] {
        self.chain.sizes()
    }

    /// Type tag of every layer, in order.
    pub fn layer_kinds(&self) -> Vec<crate::layers::LayerKind> {
        self.layers().iter().map(Layer::kind).collect()
    }

    /// Output of the most recent forward call.
    pub fn last_output(&self) -> &[f64] {
        self.chain.last_output()
    }

    pub fn clear_partial_gradients(&mut self) {
        self.chain.clear_parameter_gradients();
    }

    pub fn accumulate_parameter_gradients(&mut self) {
        self.chain.accumulate_parameter_gradients();
    }

    pub fn apply_parameter_update(&mut self, learning_rate: f64, batch_size: usize) {
        self.chain.update_parameters(learning_rate, batch_size);
    }

    pub fn describe(&self) -> ModuleDescription {
        ModuleDescription {
            kind: self.kind,
            inputs: self.chain.inputs(),
            outputs: self.chain.outputs(),
            parameters: self.chain.parameter_count(),
            validity: self.chain.validity(),
            layers: self.layers().iter().map(Layer::describe).collect(),
        }
    }
}

impl Differentiable for Module {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        self.chain.forward(input, output);
    }

    /// `input` is ignored: the module uses the activations cached by the
    /// paired forward call.
    fn backward(&mut self, _input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        self.chain.backward(grad_output, grad_input);
    }

    /// Both arguments are ignored in favour of the module's own boundary
    /// buffers from the last forward/backward pair.
    fn accumulate_parameter_gradient(&mut self, _input: &[f64], _grad_output: &[f64]) {
        self.chain.accumulate_parameter_gradients();
    }

    fn clear_parameter_gradient(&mut self) {
        self.chain.clear_parameter_gradients();
    }

    fn update_parameters(&mut self, learning_rate: f64, batch_size: usize) {
        self.chain.update_parameters(learning_rate, batch_size);
    }

    fn set_training(&mut self, training: bool) {
        self.chain.set_training(training);
    }

    fn input_size(&self) -> usize {
        self.chain.inputs()
    }

    fn output_size(&self) -> usize {
        self.chain.outputs()
    }

    fn parameter_count(&self) -> usize {
        self.chain.parameter_count()
    }

    fn visit_parameters<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        self.chain.visit_parameters(visitor)
    }

    fn visit_gradients<E>(&mut self, visitor: &mut BufferVisitor<'_, E>) -> Result<(), E> {
        self.chain.visit_gradients(visitor)
    }
}
