//! Error types for Scenecast

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while executing a task.
///
/// The `type` tag doubles as the error's kind on the wire, so report builders
/// can branch on it without inspecting the message.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeError {
    /// An expectation did not hold
    #[error("{message}")]
    #[serde(rename = "AssertionError")]
    Assertion {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual: Option<Value>,
    },

    /// Unexpected error thrown during step execution
    ///
    /// `name` keeps the kind the error was raised with, such as `TypeError`.
    #[error("{message}")]
    #[serde(rename = "Error")]
    Generic {
        message: String,
        #[serde(default = "generic_name", skip_serializing_if = "is_generic_name")]
        name: String,
    },

    /// The environment broke the test, rather than a bug in the system under test
    #[error("{message}")]
    #[serde(rename = "TestCompromisedError")]
    TestCompromised { message: String },

    /// The step or scenario has not been implemented yet
    #[error("{message}")]
    #[serde(rename = "ImplementationPendingError")]
    ImplementationPending { message: String },

    /// More than one step definition matches the step text
    #[error("{message}")]
    #[serde(rename = "AmbiguousStepDefinitionError")]
    AmbiguousStepDefinition { message: String },
}

impl RuntimeError {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::named(GENERIC_NAME, message)
    }

    /// A generic error raised with a kind of its own
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            name: name.into(),
        }
    }

    pub fn compromised(message: impl Into<String>) -> Self {
        Self::TestCompromised {
            message: message.into(),
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::ImplementationPending {
            message: message.into(),
        }
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::AmbiguousStepDefinition {
            message: message.into(),
        }
    }

    /// Rebuild an error from the kind name a runner reported for it.
    ///
    /// Unrecognised kinds become generic failures that keep the kind's name.
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "AssertionError" => Self::assertion(message),
            "TestCompromisedError" => Self::compromised(message),
            "ImplementationPendingError" => Self::pending(message),
            "AmbiguousStepDefinitionError" => Self::ambiguous(message),
            name => Self::named(name, message),
        }
    }

    /// The wire name of this error's kind
    pub fn kind(&self) -> &str {
        match self {
            Self::Assertion { .. } => "AssertionError",
            Self::Generic { name, .. } => name,
            Self::TestCompromised { .. } => "TestCompromisedError",
            Self::ImplementationPending { .. } => "ImplementationPendingError",
            Self::AmbiguousStepDefinition { .. } => "AmbiguousStepDefinitionError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Assertion { message, .. }
            | Self::Generic { message, .. }
            | Self::TestCompromised { message }
            | Self::ImplementationPending { message }
            | Self::AmbiguousStepDefinition { message } => message,
        }
    }
}

const GENERIC_NAME: &str = "Error";

fn generic_name() -> String {
    GENERIC_NAME.to_string()
}

fn is_generic_name(name: &str) -> bool {
    name == GENERIC_NAME
}

/// A crew member failed while handling an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrewError {
    #[error("{member} failed to handle {event}: {message}")]
    Failed {
        member: String,
        event: String,
        message: String,
    },

    #[error("{member} panicked while handling {event}: {message}")]
    Panicked {
        member: String,
        event: String,
        message: String,
    },
}

impl CrewError {
    pub fn member(&self) -> &str {
        match self {
            Self::Failed { member, .. } | Self::Panicked { member, .. } => member,
        }
    }
}

/// Crew failures collected up to a cue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} crew failure(s) before the cue: {}", errors.len(), summary(errors))]
pub struct CueError {
    pub errors: Vec<CrewError>,
}

fn summary(errors: &[CrewError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(RuntimeError::compromised("db is down")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "TestCompromisedError", "message": "db is down" })
        );
    }

    #[test]
    fn test_assertion_keeps_expected_and_actual() {
        let error = RuntimeError::Assertion {
            message: "expected true to equal false".into(),
            expected: Some(Value::Bool(false)),
            actual: Some(Value::Bool(true)),
        };
        let json = serde_json::to_string(&error).unwrap();
        let parsed: RuntimeError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, error);
    }

    #[test]
    fn test_unknown_kind_keeps_its_name() {
        let error = RuntimeError::from_kind("TypeError", "x is undefined");
        assert_eq!(error, RuntimeError::named("TypeError", "x is undefined"));
        assert_eq!(error.kind(), "TypeError");
        assert_eq!(error.message(), "x is undefined");
    }

    #[test]
    fn test_named_error_round_trips() {
        let error = RuntimeError::named("TypeError", "x is undefined");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "Error", "name": "TypeError", "message": "x is undefined" })
        );
        let parsed: RuntimeError = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, error);
        assert_eq!(parsed.kind(), "TypeError");
    }

    #[test]
    fn test_plain_error_omits_name() {
        let json = serde_json::to_value(RuntimeError::from_kind("Error", "boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "Error", "message": "boom" }));
        let parsed: RuntimeError = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.kind(), "Error");
    }

    #[test]
    fn test_cue_error_lists_members() {
        let error = CueError {
            errors: vec![CrewError::Failed {
                member: "reporter".into(),
                event: "SceneFinished".into(),
                message: "disk full".into(),
            }],
        };
        assert_eq!(
            error.to_string(),
            "1 crew failure(s) before the cue: reporter failed to handle SceneFinished: disk full"
        );
    }
}
