//! Configuration for batch conversion.

use serde::{Deserialize, Serialize};

/// Configuration for the transcode orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Files probed or converted at the same time.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Convert the first convertible file alone and stop if it fails.
    #[serde(default)]
    pub trial_first: bool,

    /// Largest accepted relative change in duration after conversion.
    #[serde(default = "default_max_duration_drift")]
    pub max_duration_drift: f64,
}

fn default_max_workers() -> usize {
    4
}

fn default_max_duration_drift() -> f64 {
    0.01
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            trial_first: false,
            max_duration_drift: default_max_duration_drift(),
        }
    }
}

impl BatchConfig {
    /// Sets the worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Enables or disables the single-file trial run.
    pub fn with_trial_first(mut self, trial_first: bool) -> Self {
        self.trial_first = trial_first;
        self
    }

    /// Sets the accepted duration drift (0.01 = 1%).
    pub fn with_max_duration_drift(mut self, drift: f64) -> Self {
        self.max_duration_drift = drift;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.max_workers, 4);
        assert!(!config.trial_first);
        assert!((config.max_duration_drift - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_builder() {
        let config = BatchConfig::default()
            .with_max_workers(1)
            .with_trial_first(true)
            .with_max_duration_drift(0.05);
        assert_eq!(config.max_workers, 1);
        assert!(config.trial_first);
        assert!((config.max_duration_drift - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let config = BatchConfig::default().with_max_workers(8);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BatchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
