//! Configuration for an evaluator.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// What an evaluator does when an update re-enters a key whose update is
/// still in flight.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Return the stored state, discarding the handler's result.
    #[default]
    Skip,

    /// Panic, naming the key. Useful in tests to surface composition cycles.
    Panic,
}

/// Evaluator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatorConfig {
    /// Name attached to log events and snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Behaviour on re-entrant updates
    #[serde(default)]
    pub reentry: ReentryPolicy,

    /// Whether state transitions are logged at debug level
    #[serde(default = "default_true")]
    pub log_transitions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            label: None,
            reentry: ReentryPolicy::default(),
            log_transitions: true,
        }
    }
}

impl EvaluatorConfig {
    /// Default configuration with a label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: EvaluatorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EvaluatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "label must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}
