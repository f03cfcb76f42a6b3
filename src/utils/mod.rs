//! Shared utilities for the layers and the trainer
//!
//! Random number generation with explicit state, and the activation functions
//! used by the pointwise layers.

pub mod activations;
pub mod rng;

pub use rng::SeededRng;
