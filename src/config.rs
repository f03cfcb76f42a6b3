//! Configuration structures for training
//!
//! This module provides the training-run configuration: epoch count, batch
//! size, learning rate, the (inert) weight decay, the random seed and the
//! number of cooperating workers.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;

/// Configuration for one training run.
///
/// Every field except `epochs` has a default, so a minimal file only needs
/// the epoch count.
///
/// # Example
///
/// ```json
/// {
///   "epochs": 5,
///   "batch_size": 256,
///   "learning_rate": 0.1,
///   "weight_decay": 0.0,
///   "seed": 42,
///   "workers": 4
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Number of passes over the training set.
    pub epochs: usize,

    /// Samples per mini-batch, summed over all workers (default 256).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// SGD step size (default 0.1).
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Accepted for interface compatibility; not applied.
    #[serde(default)]
    pub weight_decay: f64,

    /// Seed for weight initialisation, dropout masks and shuffling.
    #[serde(default)]
    pub seed: u64,

    /// Number of cooperating workers (default 1).
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_batch_size() -> usize {
    256
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_workers() -> usize {
    1
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            weight_decay: 0.0,
            seed: 0,
            workers: default_workers(),
        }
    }
}

impl TrainingConfig {
    /// Check the numeric ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue(
                "workers must be greater than 0".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "weight_decay must be non-negative and finite, got {}",
                self.weight_decay
            )));
        }
        Ok(())
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and
/// validates it.
///
/// # Examples
///
/// ```no_run
/// use seqnet::config::load_config;
///
/// let cfg = load_config("config/training.json").unwrap();
/// assert!(cfg.batch_size > 0);
/// ```
pub fn load_config(path: &str) -> Result<TrainingConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: TrainingConfig = serde_json::from_str(r#"{ "epochs": 3 }"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.weight_decay, 0.0);
        assert_eq!(config.workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = TrainingConfig {
            batch_size: 0,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_learning_rate_rejected() {
        let config = TrainingConfig {
            learning_rate: -0.5,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<TrainingConfig, _> =
            serde_json::from_str(r#"{ "epochs": 3, "scheduler_type": "step_decay" }"#);
        assert!(result.is_err());
    }
}
