//! Networks: ordered chains of modules.

use crate::chain::{Chain, Validity};
use crate::distributed::Communicator;
use crate::error::CollectiveError;
use crate::layers::Layer;
use crate::module::{Module, ModuleDescription};
use serde::Serialize;

/// Structure of a whole network, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkDescription {
    pub inputs: usize,
    pub outputs: usize,
    pub parameters: usize,
    pub validity: Validity,
    pub modules: Vec<ModuleDescription>,
}

/// A full network: modules threaded through boundary buffers exactly like
/// layers inside a module.
///
/// The network is valid only if every module is valid and the modules fit
/// together. An invalid module (the first one, in order) is reported before
/// any problem between modules.
#[derive(Debug, Clone)]
pub struct Network {
    chain: Chain<Module>,
    validity: Validity,
}

impl Network {
    pub fn from_modules(inputs: usize, outputs: usize, modules: Vec<Module>) -> Self {
        let chain = Chain::new(inputs, outputs, modules);
        let validity = chain
            .items()
            .iter()
            .map(Module::validity)
            .find(|v| !v.is_valid())
            .unwrap_or_else(|| chain.validity());
        log::debug!(
            "network {}->{}: {} modules, {} parameters, {}",
            inputs,
            outputs,
            chain.len(),
            chain.parameter_count(),
            validity
        );
        Self { chain, validity }
    }

    /// A network holding a single sequential module over `layers`.
    pub fn from_layers(inputs: usize, outputs: usize, layers: Vec<Layer>) -> Self {
        Self::from_modules(inputs, outputs, vec![Module::sequential(inputs, outputs, layers)])
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }

    pub fn inputs(&self) -> usize {
        self.chain.inputs()
    }

    pub fn outputs(&self) -> usize {
        self.chain.outputs()
    }

    pub fn modules(&self) -> &[Module] {
        self.chain.items()
    }

    pub fn parameter_count(&self) -> usize {
        self.chain.parameter_count()
    }

    pub fn is_training(&self) -> bool {
        self.chain.is_training()
    }

    pub fn set_training(&mut self, training: bool) {
        self.chain.set_training(training);
    }

    /// Run one sample through every module.
    ///
    /// # Panics
    ///
    /// Panics if the network is invalid or the buffers have the wrong length.
    pub fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        self.assert_valid();
        self.chain.forward(input, output);
    }

    /// Propagate the gradient of the sample from the last forward call back
    /// to the input.
    pub fn backward(&mut self, grad_output: &[f64], grad_input: &mut [f64]) {
        self.assert_valid();
        self.chain.backward(grad_output, grad_input);
    }

    pub fn clear_partial_gradients(&mut self) {
        self.chain.clear_parameter_gradients();
    }

    /// Add the last sample's contribution to every parameter gradient.
    pub fn accumulate_parameter_gradients(&mut self) {
        self.assert_valid();
        self.chain.accumulate_parameter_gradients();
    }

    /// One SGD step: `p -= learning_rate * g / batch_size` for every
    /// parameter.
    pub fn apply_parameter_update(&mut self, learning_rate: f64, batch_size: usize) {
        self.assert_valid();
        self.chain.update_parameters(learning_rate, batch_size);
    }

    /// Output of the most recent forward call.
    pub fn last_output(&self) -> &[f64] {
        self.chain.last_output()
    }

    /// Copy every parameter out, in layer order (weights before biases).
    pub fn parameters(&mut self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.parameter_count());
        self.chain
            .for_each_parameter_buffer(|buffer| flat.extend_from_slice(buffer));
        flat
    }

    /// Copy every accumulated parameter gradient out, in the order of
    /// [`Network::parameters`].
    pub fn parameter_gradients(&mut self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.parameter_count());
        self.chain
            .for_each_gradient_buffer(|buffer| flat.extend_from_slice(buffer));
        flat
    }

    /// Overwrite every parameter from `values`, in the order of
    /// [`Network::parameters`].
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != self.parameter_count()`.
    pub fn set_parameters(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.parameter_count(),
            "parameters len mismatch: expected {}, got {}",
            self.parameter_count(),
            values.len()
        );
        let mut offset = 0;
        self.chain.for_each_parameter_buffer(|buffer| {
            buffer.copy_from_slice(&values[offset..offset + buffer.len()]);
            offset += buffer.len();
        });
    }

    /// Make every worker's parameters equal to worker 0's.
    pub fn broadcast_parameters<C: Communicator>(
        &mut self,
        comm: &mut C,
    ) -> Result<(), CollectiveError> {
        if comm.world_size() == 1 {
            return Ok(());
        }
        self.chain
            .visit_parameters(&mut |buffer: &mut [f64]| comm.broadcast_values(buffer, 0))
    }

    /// Replace every accumulated gradient with its sum over all workers.
    pub fn all_reduce_gradients<C: Communicator>(
        &mut self,
        comm: &mut C,
    ) -> Result<(), CollectiveError> {
        if comm.world_size() == 1 {
            return Ok(());
        }
        self.chain.visit_gradients(&mut |buffer: &mut [f64]| comm.all_reduce_sum(buffer))
    }

    pub fn describe(&self) -> NetworkDescription {
        NetworkDescription {
            inputs: self.chain.inputs(),
            outputs: self.chain.outputs(),
            parameters: self.chain.parameter_count(),
            validity: self.validity,
            modules: self.modules().iter().map(Module::describe).collect(),
        }
    }

    fn assert_valid(&self) {
        assert!(
            self.validity.is_valid(),
            "operation on an invalid chain: {}",
            self.validity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Linear, Relu, Softmax};
    use crate::utils::SeededRng;

    fn two_module_network(rng: &mut SeededRng) -> Network {
        let first = Module::sequential(
            4,
            6,
            vec![Linear::new(4, 6, 0.5, rng).into(), Relu::new(6).into()],
        );
        let second = Module::sequential(
            6,
            3,
            vec![Linear::new(6, 3, 0.5, rng).into(), Softmax::new(3).into()],
        );
        Network::from_modules(4, 3, vec![first, second])
    }

    #[test]
    fn test_network_counts_parameters() {
        let mut rng = SeededRng::new(1);
        let network = two_module_network(&mut rng);
        assert!(network.is_valid());
        assert_eq!(network.parameter_count(), 4 * 6 + 6 + 6 * 3 + 3);
        assert_eq!(network.describe().modules.len(), 2);
    }

    #[test]
    fn test_invalid_module_invalidates_network() {
        let mut rng = SeededRng::new(1);
        let broken = Module::sequential(
            4,
            3,
            vec![Linear::new(4, 5, 0.1, &mut rng).into(), Linear::new(6, 3, 0.1, &mut rng).into()],
        );
        let network = Network::from_modules(4, 3, vec![broken]);
        assert!(matches!(
            network.validity(),
            Validity::SizeMismatch {
                boundary: 1,
                expected: 5,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_module_boundary_mismatch() {
        let mut rng = SeededRng::new(1);
        let a = Module::sequential(4, 5, vec![Linear::new(4, 5, 0.1, &mut rng).into()]);
        let b = Module::sequential(6, 2, vec![Linear::new(6, 2, 0.1, &mut rng).into()]);
        let network = Network::from_modules(4, 2, vec![a, b]);
        assert!(matches!(network.validity(), Validity::SizeMismatch { .. }));
    }

    #[test]
    fn test_forward_produces_distribution() {
        let mut rng = SeededRng::new(9);
        let mut network = two_module_network(&mut rng);
        let mut output = [0.0; 3];
        network.forward(&[0.1, -0.2, 0.3, 0.4], &mut output);
        let sum: f64 = output.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(network.last_output(), &output);
    }

    #[test]
    fn test_set_parameters_round_trip() {
        let mut rng = SeededRng::new(2);
        let mut network = two_module_network(&mut rng);
        let values: Vec<f64> = (0..network.parameter_count()).map(|i| i as f64).collect();
        network.set_parameters(&values);
        assert_eq!(network.parameters(), values);
    }

    #[test]
    fn test_parameter_gradients_follow_parameter_order() {
        let mut rng = SeededRng::new(3);
        let mut network = two_module_network(&mut rng);
        network.clear_partial_gradients();
        let cleared = network.parameter_gradients();
        assert_eq!(cleared.len(), network.parameter_count());
        assert!(cleared.iter().all(|&g| g == 0.0));

        let mut output = [0.0; 3];
        network.forward(&[0.5, -0.5, 1.0, 0.25], &mut output);
        let mut grad_input = [0.0; 4];
        network.backward(&[1.0, 0.0, -1.0], &mut grad_input);
        network.accumulate_parameter_gradients();
        let gradients = network.parameter_gradients();

        // Last entries are the output biases, whose gradient is grad_output.
        assert_eq!(&gradients[gradients.len() - 3..], &[1.0, 0.0, -1.0]);
    }
}
