//! Tests for training configuration parsing
//!
//! This file tests the config module including:
//! - Loading the shipped training config
//! - Filling missing optional fields with defaults
//! - Rejecting out-of-range values and unknown fields
//! - Handling invalid JSON and missing files

use seqnet::config::{load_config, TrainingConfig};
use seqnet::error::ConfigError;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("failed to write temp config");
    file
}

fn load(contents: &str) -> Result<TrainingConfig, ConfigError> {
    let file = write_temp_config(contents);
    load_config(file.path().to_str().unwrap())
}

// ============================================================================
// Valid Config Loading Tests
// ============================================================================

mod valid_config_tests {
    use super::*;

    #[test]
    fn test_load_shipped_training_config() {
        let config = load_config("config/training.json").expect("Failed to load training config");

        assert_eq!(config.epochs, 10);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.weight_decay, 0.0);
        assert_eq!(config.seed, 42);
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(r#"{ "epochs": 2 }"#).unwrap();
        assert_eq!(
            config,
            TrainingConfig {
                epochs: 2,
                ..TrainingConfig::default()
            }
        );
    }

    #[test]
    fn test_nonzero_weight_decay_is_accepted() {
        let config = load(r#"{ "epochs": 1, "weight_decay": 0.0005 }"#).unwrap();
        assert_eq!(config.weight_decay, 0.0005);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = TrainingConfig {
            epochs: 7,
            batch_size: 64,
            learning_rate: 0.05,
            weight_decay: 0.0,
            seed: 9,
            workers: 3,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(load(&json).unwrap(), config);
    }
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

mod invalid_config_tests {
    use super::*;

    #[test]
    fn test_missing_epochs() {
        assert!(matches!(load(r#"{ "batch_size": 4 }"#), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_unknown_field() {
        let result = load(r#"{ "epochs": 1, "momentum": 0.9 }"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(load("{ epochs: 1 }"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("config/does_not_exist.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_zero_batch_size() {
        let result = load(r#"{ "epochs": 1, "batch_size": 0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_workers() {
        let result = load(r#"{ "epochs": 1, "workers": 0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_non_positive_learning_rate() {
        for lr in ["0.0", "-0.1"] {
            let result = load(&format!(r#"{{ "epochs": 1, "learning_rate": {} }}"#, lr));
            assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
        }
    }

    #[test]
    fn test_negative_weight_decay() {
        let result = load(r#"{ "epochs": 1, "weight_decay": -1.0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
