//! Reporter configuration

use serde::{Deserialize, Serialize};

/// Serenity BDD reporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Scenes located in files with this suffix link their user story to the file
    pub feature_file_extension: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            feature_file_extension: ".feature".to_string(),
        }
    }
}
