//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cucumber adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Name announced in `TestRunnerDetected`
    pub runner_name: String,

    /// Default step timeout, used when a step definition does not set one
    pub step_timeout_ms: u64,

    /// Tag every scene with the feature it belongs to
    pub tag_features: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            runner_name: "Cucumber".to_string(),
            step_timeout_ms: 5000,
            tag_features: true,
        }
    }
}

impl AdapterConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}
