//! Serenity BDD report model
//!
//! One [`SerenityBddReport`] per scene, serialized with the field names the
//! Serenity BDD JSON format uses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use scenecast_core::{Outcome, RuntimeError, ScenarioDetails, Tag, Timestamp};

use crate::config::ReporterConfig;

static CAMEL_HUMPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z\d])([A-Z])").unwrap());
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z\d]+").unwrap());

/// Turn a human-readable name into a lowercase, dash-separated identifier
///
/// `"Event Protocol"` becomes `"event-protocol"`, `"TastyCucumber"` becomes
/// `"tasty-cucumber"`.
pub fn dashify(name: &str) -> String {
    let split = CAMEL_HUMPS.replace_all(name, "$1-$2");
    NON_WORD
        .replace_all(&split, "-")
        .trim_matches('-')
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportResult {
    Success,
    Skipped,
    Pending,
    Compromised,
    Failure,
    Error,
}

impl From<&Outcome> for ReportResult {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::ExecutionSuccessful => Self::Success,
            Outcome::ExecutionSkipped => Self::Skipped,
            Outcome::ImplementationPending { .. } => Self::Pending,
            Outcome::ExecutionCompromised { .. } => Self::Compromised,
            Outcome::ExecutionFailedWithError {
                error: RuntimeError::Assertion { .. },
            } => Self::Failure,
            Outcome::ExecutionFailedWithError { .. } => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCause {
    pub error_type: String,
    pub message: String,
}

impl From<&RuntimeError> for FailureCause {
    fn from(error: &RuntimeError) -> Self {
        Self {
            error_type: error.kind().to_string(),
            message: error.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTag {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&Tag> for ReportTag {
    fn from(tag: &Tag) -> Self {
        Self {
            name: tag.name().to_string(),
            kind: tag.kind().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub number: usize,
    pub description: String,
    pub start_time: i64,
    pub duration: u64,
    pub result: ReportResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<FailureCause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStory {
    pub id: String,
    pub story_name: String,
    /// Empty unless the scene was described in a feature file
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerenityBddReport {
    pub id: String,
    pub name: String,
    pub title: String,
    pub manual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_source: Option<String>,
    pub start_time: i64,
    pub duration: u64,
    /// `None` until the scene finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ReportResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_failure_cause: Option<FailureCause>,
    pub tags: Vec<ReportTag>,
    pub test_steps: Vec<TestStep>,
    pub user_story: UserStory,
}

impl SerenityBddReport {
    /// Report seeded from the details of a scene that has just started
    pub fn seeded(details: &ScenarioDetails, started: Timestamp, config: &ReporterConfig) -> Self {
        let path = details.location.path.to_string_lossy();
        let story_path = if path.ends_with(config.feature_file_extension.as_str()) {
            path.to_string()
        } else {
            String::new()
        };
        let category = details.category.value();
        let name = details.name.value();

        Self {
            id: format!("{};{}", dashify(category), dashify(name)),
            name: name.to_string(),
            title: name.to_string(),
            manual: false,
            test_source: None,
            start_time: started.as_millis(),
            duration: 0,
            result: None,
            test_failure_cause: None,
            tags: Vec::new(),
            test_steps: Vec::new(),
            user_story: UserStory {
                id: dashify(category),
                story_name: category.to_string(),
                path: story_path,
                kind: "feature".to_string(),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
