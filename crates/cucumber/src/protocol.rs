//! Cucumber event protocol payloads
//!
//! Cucumber announces a run as a flat stream of JSON objects tagged with a
//! kebab-case `type`. Payloads of different kinds share nothing but that tag;
//! the adapter correlates them through source locations (`uri` + `line`).
//! Kinds the adapter has no use for (`source`, `pickle`, attachments, …)
//! deserialize to [`ProtocolEvent::Ignored`].

use scenecast_core::RuntimeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Points at a line in a feature file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub uri: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(uri: impl Into<String>, line: u32) -> Self {
        Self {
            uri: uri.into(),
            line,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uri, self.line)
    }
}

/// Position within a document whose uri is known from context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// One event of the Cucumber event protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProtocolEvent {
    GherkinDocument(GherkinDocumentEvent),
    PickleAccepted(PickleEvent),
    TestRunStarted,
    TestCasePrepared(TestCasePrepared),
    TestCaseStarted(TestCaseStarted),
    TestStepStarted(TestStepStarted),
    TestStepFinished(TestStepFinished),
    TestCaseFinished(TestCaseFinished),
    TestRunFinished(TestRunFinished),
    #[serde(other)]
    Ignored,
}

impl ProtocolEvent {
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// The protocol name of this event's kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GherkinDocument(_) => "gherkin-document",
            Self::PickleAccepted(_) => "pickle-accepted",
            Self::TestRunStarted => "test-run-started",
            Self::TestCasePrepared(_) => "test-case-prepared",
            Self::TestCaseStarted(_) => "test-case-started",
            Self::TestStepStarted(_) => "test-step-started",
            Self::TestStepFinished(_) => "test-step-finished",
            Self::TestCaseFinished(_) => "test-case-finished",
            Self::TestRunFinished(_) => "test-run-finished",
            Self::Ignored => "ignored",
        }
    }
}

// ============================================================================
// Gherkin documents and pickles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GherkinDocumentEvent {
    pub uri: String,
    pub document: GherkinDocument,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GherkinDocument {
    #[serde(default)]
    pub feature: Option<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Vec<ScenarioDefinition>,
}

/// Scenario, scenario outline or background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<GherkinStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GherkinStep {
    pub location: Location,
    pub keyword: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickleEvent {
    pub uri: String,
    pub pickle: Pickle,
}

/// A scenario compiled for execution; one per outline row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickle {
    pub name: String,
    /// The first location is the scenario's, or the row's for outlines
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub steps: Vec<PickleStep>,
    #[serde(default)]
    pub tags: Vec<PickleTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickleStep {
    pub text: String,
    #[serde(default)]
    pub locations: Vec<Location>,
    /// A data table or doc string attached to the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PickleArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PickleArgument {
    Table(PickleTable),
    DocString(PickleDocString),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickleTable {
    pub rows: Vec<PickleRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickleRow {
    pub cells: Vec<PickleCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickleCell {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleDocString {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickleTag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

// ============================================================================
// Test cases and steps
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasePrepared {
    pub source_location: SourceLocation,
    #[serde(default)]
    pub steps: Vec<PreparedStep>,
}

/// A step with a `sourceLocation` comes from the feature file; one with only
/// an `actionLocation` is a hook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_location: Option<SourceLocation>,
}

impl PreparedStep {
    pub fn is_hook(&self) -> bool {
        self.source_location.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseStarted {
    pub source_location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseRef {
    pub source_location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepStarted {
    pub index: usize,
    pub test_case: TestCaseRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepFinished {
    pub index: usize,
    pub test_case: TestCaseRef,
    pub result: TestResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseFinished {
    pub source_location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestRunFinished {
    #[serde(default)]
    pub result: Option<RunResult>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Pending,
    Undefined,
    Ambiguous,
    Skipped,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Pending => "pending",
            Status::Undefined => "undefined",
            Status::Ambiguous => "ambiguous",
            Status::Skipped => "skipped",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of a step or a test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: Status,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RawException>,
}

impl TestResult {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            duration: None,
            exception: None,
        }
    }

    pub fn with_duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }

    pub fn with_exception(mut self, exception: RawException) -> Self {
        self.exception = Some(exception);
        self
    }
}

/// An exception as reported by the runner: either a bare message or a
/// serialized error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawException {
    Detailed(ExceptionDetails),
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl RawException {
    pub fn message(&self) -> &str {
        match self {
            Self::Detailed(details) => &details.message,
            Self::Message(message) => message,
        }
    }

    /// Rebuild the error this exception describes, keeping its kind
    pub fn to_runtime_error(&self) -> RuntimeError {
        match self {
            Self::Message(message) => RuntimeError::generic(message.clone()),
            Self::Detailed(details) => {
                let kind = details.name.as_deref().unwrap_or("Error");
                match RuntimeError::from_kind(kind, details.message.clone()) {
                    RuntimeError::Assertion { message, .. } => RuntimeError::Assertion {
                        message,
                        expected: details.expected.clone(),
                        actual: details.actual.clone(),
                    },
                    error => error,
                }
            }
        }
    }
}

impl From<&RuntimeError> for RawException {
    fn from(error: &RuntimeError) -> Self {
        let (expected, actual) = match error {
            RuntimeError::Assertion { expected, actual, .. } => (expected.clone(), actual.clone()),
            _ => (None, None),
        };
        Self::Detailed(ExceptionDetails {
            name: Some(error.kind().to_string()),
            message: error.message().to_string(),
            expected,
            actual,
            stack: None,
        })
    }
}
