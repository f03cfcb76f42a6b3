//! Softmax classifier training: evaluation, the SGD epoch loop and per-epoch
//! reporting, optionally split across cooperating workers.

use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::distributed::{partition, Communicator};
use crate::error::TrainError;
use crate::layers::LayerKind;
use crate::loss::{argmax, cross_entropy, softmax_cross_entropy_gradient};
use crate::network::Network;
use crate::utils::SeededRng;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Result of one evaluation pass over a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// Summed (not averaged) cross-entropy over every sample.
    pub loss: f64,
    /// Fraction of samples whose arg-max prediction equals the label.
    pub accuracy: f64,
    pub elapsed: Duration,
}

/// Metrics of one epoch. Epoch 0 is the pre-training evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    /// Summed cross-entropy over the training set.
    pub loss: f64,
    pub train_accuracy: f64,
    pub test_accuracy: Option<f64>,
    /// Time spent evaluating the training and test sets.
    pub evaluation_time: Duration,
    /// Time spent in the SGD epoch (zero for epoch 0).
    pub training_time: Duration,
}

/// A network trained as a classifier with softmax + cross-entropy.
///
/// The network's last layer is expected to be a Softmax: during training the
/// output gradient fed back is `p - one_hot(label)`.
///
/// Every worker holds its own `Classifier` with a replica of the same network.
/// Construction broadcasts worker 0's parameters so the replicas start equal;
/// afterwards they stay equal because every update uses the same all-reduced
/// gradient.
///
/// # Example
///
/// ```
/// use seqnet::distributed::SingleProcess;
/// use seqnet::layers::{Linear, Softmax};
/// use seqnet::network::Network;
/// use seqnet::trainer::Classifier;
/// use seqnet::utils::SeededRng;
///
/// let mut rng = SeededRng::new(0);
/// let network = Network::from_layers(
///     2,
///     2,
///     vec![Linear::new(2, 2, 0.1, &mut rng).into(), Softmax::new(2).into()],
/// );
/// let classifier = Classifier::new(network, SingleProcess, rng).unwrap();
/// assert_eq!(classifier.accuracy(), 0.0);
/// ```
#[derive(Debug)]
pub struct Classifier<C: Communicator> {
    network: Network,
    comm: C,
    rng: SeededRng,
    loss: f64,
    accuracy: f64,
    output: Vec<f64>,
    grad_output: Vec<f64>,
    grad_input: Vec<f64>,
}

impl<C: Communicator> Classifier<C> {
    /// Wrap a valid network and synchronise its parameters from worker 0.
    ///
    /// `rng` drives the epoch shuffle; only worker 0's is consulted.
    ///
    /// # Errors
    ///
    /// [`TrainError::InvalidNetwork`] if the network failed validation, or a
    /// collective error from the initial parameter broadcast.
    pub fn new(mut network: Network, mut comm: C, rng: SeededRng) -> Result<Self, TrainError> {
        if !network.is_valid() {
            return Err(TrainError::InvalidNetwork(network.validity()));
        }

        let ends_in_softmax = network
            .modules()
            .last()
            .and_then(|module| module.layers().last())
            .is_some_and(|layer| layer.kind() == LayerKind::Softmax);
        if !ends_in_softmax {
            log::warn!("classifier network does not end in a softmax layer");
        }

        network.broadcast_parameters(&mut comm)?;

        let inputs = network.inputs();
        let outputs = network.outputs();
        Ok(Self {
            network,
            comm,
            rng,
            loss: 0.0,
            accuracy: 0.0,
            output: vec![0.0; outputs],
            grad_output: vec![0.0; outputs],
            grad_input: vec![0.0; inputs],
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    /// Summed cross-entropy from the last evaluation.
    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// Accuracy from the last evaluation.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Class probabilities for one sample, in inference mode.
    pub fn predict(&mut self, features: &[f64]) -> &[f64] {
        self.network.set_training(false);
        self.network.forward(features, &mut self.output);
        &self.output
    }

    fn sample<'d, D: Dataset + ?Sized>(
        &self,
        dataset: &'d D,
        index: usize,
    ) -> Result<(&'d [f64], usize), TrainError> {
        let features = dataset.features(index);
        if features.len() != self.network.inputs() {
            return Err(TrainError::InputWidthMismatch {
                dataset: features.len(),
                network: self.network.inputs(),
            });
        }
        let label = dataset.label(index);
        if label >= self.network.outputs() {
            return Err(TrainError::LabelOutOfRange {
                label,
                classes: self.network.outputs(),
            });
        }
        Ok((features, label))
    }

    /// Loss and accuracy over the whole dataset.
    ///
    /// Each worker evaluates its contiguous share of the indices; the correct
    /// count and the loss are then summed across workers. Accuracy divides by
    /// the dataset size; the loss is left as a sum.
    pub fn evaluate<D: Dataset + ?Sized>(&mut self, dataset: &D) -> Result<Evaluation, TrainError> {
        let start = Instant::now();
        let count = dataset.len();
        if count == 0 {
            return Err(TrainError::EmptyDataset);
        }

        self.network.set_training(false);
        // [correct, loss]
        let mut totals = [0.0; 2];
        for index in partition(count, self.comm.rank(), self.comm.world_size()) {
            let (features, label) = self.sample(dataset, index)?;
            self.network.forward(features, &mut self.output);
            if argmax(&self.output) == label {
                totals[0] += 1.0;
            }
            totals[1] += cross_entropy(&self.output, label);
        }
        self.comm.all_reduce_sum(&mut totals)?;

        self.accuracy = totals[0] / count as f64;
        self.loss = totals[1];
        Ok(Evaluation {
            loss: self.loss,
            accuracy: self.accuracy,
            elapsed: start.elapsed(),
        })
    }

    /// One epoch of mini-batch SGD; returns the elapsed time.
    ///
    /// Worker 0 shuffles the sample order and broadcasts it. Each batch is
    /// split across workers, every worker accumulates gradients over its
    /// share, the gradients are summed across workers and one update is
    /// applied with the full batch size as denominator. The last batch takes
    /// whatever samples remain.
    ///
    /// `weight_decay` is accepted but not applied.
    pub fn train_one_epoch<D: Dataset + ?Sized>(
        &mut self,
        dataset: &D,
        learning_rate: f64,
        weight_decay: f64,
        batch_size: usize,
    ) -> Result<Duration, TrainError> {
        if batch_size == 0 {
            return Err(TrainError::ZeroBatchSize);
        }
        let count = dataset.len();
        if count == 0 {
            return Err(TrainError::EmptyDataset);
        }
        if weight_decay != 0.0 {
            log::warn!("weight decay {} is accepted but not applied", weight_decay);
        }

        let start = Instant::now();
        let rank = self.comm.rank();
        let world_size = self.comm.world_size();

        let mut order = if self.comm.is_root() {
            self.rng.permutation(count)
        } else {
            vec![0; count]
        };
        self.comm.broadcast_indices(&mut order, 0)?;

        let num_batches = count.div_ceil(batch_size);
        self.network.set_training(true);
        for batch in 0..num_batches {
            let this_batch = if batch == num_batches - 1 {
                count - (num_batches - 1) * batch_size
            } else {
                batch_size
            };

            self.network.clear_partial_gradients();
            for i in partition(this_batch, rank, world_size) {
                let index = order[batch * batch_size + i];
                let (features, label) = self.sample(dataset, index)?;
                self.network.forward(features, &mut self.output);
                softmax_cross_entropy_gradient(&self.output, label, &mut self.grad_output);
                self.network.backward(&self.grad_output, &mut self.grad_input);
                self.network.accumulate_parameter_gradients();
            }
            self.network.all_reduce_gradients(&mut self.comm)?;
            self.network.apply_parameter_update(learning_rate, this_batch);

            log::debug!("batch {}/{} ({} samples)", batch + 1, num_batches, this_batch);
        }
        self.network.set_training(false);

        Ok(start.elapsed())
    }

    /// Evaluate on `train` (and `test`, if given) and package the result.
    pub fn report<D: Dataset + ?Sized>(
        &mut self,
        epoch: usize,
        train: &D,
        test: Option<&D>,
        training_time: Duration,
    ) -> Result<EpochReport, TrainError> {
        let on_train = self.evaluate(train)?;
        let on_test = test.map(|data| self.evaluate(data)).transpose()?;
        Ok(EpochReport {
            epoch,
            loss: on_train.loss,
            train_accuracy: on_train.accuracy,
            test_accuracy: on_test.map(|e| e.accuracy),
            evaluation_time: on_train.elapsed + on_test.map_or(Duration::ZERO, |e| e.elapsed),
            training_time,
        })
    }

    /// Run `config.epochs` epochs, preceded by a pre-training evaluation.
    ///
    /// `on_epoch` is called with every report as soon as it is available,
    /// starting with epoch 0.
    ///
    /// `config.workers` must equal the communicator's world size.
    pub fn fit<D, F>(
        &mut self,
        train: &D,
        test: Option<&D>,
        config: &TrainingConfig,
        mut on_epoch: F,
    ) -> Result<Vec<EpochReport>, TrainError>
    where
        D: Dataset + ?Sized,
        F: FnMut(&EpochReport),
    {
        config.validate()?;
        if config.workers != self.comm.world_size() {
            return Err(TrainError::WorkerCountMismatch {
                configured: config.workers,
                actual: self.comm.world_size(),
            });
        }
        let mut reports = Vec::with_capacity(config.epochs + 1);

        let initial = self.report(0, train, test, Duration::ZERO)?;
        on_epoch(&initial);
        reports.push(initial);

        for epoch in 1..=config.epochs {
            let training_time = self.train_one_epoch(
                train,
                config.learning_rate,
                config.weight_decay,
                config.batch_size,
            )?;
            let report = self.report(epoch, train, test, training_time)?;
            on_epoch(&report);
            reports.push(report);
        }
        Ok(reports)
    }
}
