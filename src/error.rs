//! Error types for configuration, collectives, datasets and training.
//!
//! Structural problems in a built chain (width mismatches) are not errors: they
//! are recorded as [`crate::chain::Validity`] so a description can still be
//! produced. Everything in this module is returned through `Result`.

use thiserror::Error;

/// Malformed network or training configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry {index}: unknown type tag {tag}")]
    UnknownTag { index: usize, tag: usize },

    #[error("entry {index}: empty descriptor")]
    EmptyDescriptor { index: usize },

    #[error("entry {index}: {kind} descriptor is missing '{name}'")]
    MissingParameter {
        index: usize,
        kind: &'static str,
        name: &'static str,
    },

    #[error("entry {index}: '{name}' must be greater than 0")]
    ZeroDimension { index: usize, name: &'static str },

    #[error("entry {index}: {kind} is first in its chain and needs an explicit width")]
    MissingWidth { index: usize, kind: &'static str },

    #[error("entry {index}: drop_rate must be in range [0.0, 1.0), got {rate}")]
    InvalidDropRate { index: usize, rate: f64 },

    #[error("entry {index}: window {window} does not fit input extent {extent} (padding {padding})")]
    InvalidGeometry {
        index: usize,
        window: usize,
        extent: usize,
        padding: usize,
    },

    #[error("a {0} must contain at least one entry")]
    EmptyChain(&'static str),

    #[error("{0}")]
    InvalidValue(String),
}

/// A collective operation did not complete. Always fatal for the worker group.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectiveError {
    #[error("worker {peer} disconnected during collective #{sequence}")]
    Disconnected { peer: usize, sequence: u64 },

    #[error("collective out of sync: expected #{expected} from worker {peer}, got #{actual}")]
    OutOfSync {
        peer: usize,
        expected: u64,
        actual: u64,
    },

    #[error("worker {peer} sent {actual} elements, expected {expected}")]
    LengthMismatch {
        peer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("worker {peer} sent an unexpected payload kind")]
    UnexpectedPayload { peer: usize },

    #[error("root rank {root} is outside a group of {world_size}")]
    InvalidRoot { root: usize, world_size: usize },
}

/// The dataset handed to the core violates its contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("{features} feature vectors but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("sample {index} has {actual} features, expected {expected}")]
    WidthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("sample {index} has label {label}, outside [0, {classes})")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        classes: usize,
    },
}

/// Errors raised while evaluating or training a classifier.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("network is invalid: {0}")]
    InvalidNetwork(crate::chain::Validity),

    #[error(transparent)]
    Collective(#[from] CollectiveError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("batch_size must be greater than 0")]
    ZeroBatchSize,

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("dataset width {dataset} does not match network input width {network}")]
    InputWidthMismatch { dataset: usize, network: usize },

    #[error("label {label} is outside the network's {classes} outputs")]
    LabelOutOfRange { label: usize, classes: usize },

    #[error("config asks for {configured} workers but {actual} are running")]
    WorkerCountMismatch { configured: usize, actual: usize },
}
