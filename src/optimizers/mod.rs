//! Parameter update rules
//!
//! Only plain mini-batch SGD is provided: parameters move against the batch
//! mean of the accumulated gradient at a fixed learning rate per call.

pub mod sgd;

pub use sgd::Sgd;
