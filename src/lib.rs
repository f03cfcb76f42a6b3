//! Sequential neural networks with data-parallel SGD
//!
//! This library builds feed-forward and convolutional classifiers from
//! declarative descriptions, runs forward inference and backward gradient
//! propagation one sample at a time, and trains them with mini-batch SGD,
//! optionally split across cooperating workers.
//!
//! # Modules
//!
//! - `layers`: the `Differentiable` trait and the layer types (Linear, Convolution, etc.)
//! - `chain`: boundary buffers and width validation shared by modules and networks
//! - `module`, `network`: layer chains and module chains
//! - `loss`: softmax + cross-entropy helpers
//! - `trainer`: the classifier's evaluation and epoch loop
//! - `distributed`: worker partitioning and collective operations
//! - `dataset`: the sample source the trainer reads
//! - `architecture`: network configuration (JSON and integer descriptors) and building
//! - `config`: training configuration
//! - `optimizers`: the SGD update rule
//! - `utils`: seeded RNG and activation functions
//! - `error`: error types

pub mod architecture;
pub mod chain;
pub mod config;
pub mod dataset;
pub mod distributed;
pub mod error;
pub mod layers;
pub mod loss;
pub mod module;
pub mod network;
pub mod optimizers;
pub mod trainer;
pub mod utils;

pub use error::{CollectiveError, ConfigError, DatasetError, TrainError};
