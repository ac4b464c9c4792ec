//! Value objects describing scenes and the tasks performed within them

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque identifier linking related events
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new random correlation id
    pub fn create() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point in time with millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Build a timestamp from milliseconds since the Unix epoch
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Milliseconds elapsed since `earlier`, or zero if `earlier` is later
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        u64::try_from(self.as_millis() - earlier.as_millis()).unwrap_or(0)
    }

    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        let truncated = value
            .duration_trunc(TimeDelta::milliseconds(1))
            .unwrap_or(value);
        Self(truncated)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)?;
        Ok(Self::from(parsed.with_timezone(&Utc)))
    }
}

/// Name of a scenario or an activity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Group a scenario belongs to, such as the feature it is described in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Position in a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSystemLocation {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl FileSystemLocation {
    pub fn new(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

/// Identifies a scenario independently of its correlation id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioDetails {
    pub name: Name,
    pub category: Category,
    pub location: FileSystemLocation,
}

impl ScenarioDetails {
    pub fn new(name: Name, category: Category, location: FileSystemLocation) -> Self {
        Self {
            name,
            category,
            location,
        }
    }
}

/// Describes a task performed within a scene
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityDetails {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<FileSystemLocation>,
}

impl ActivityDetails {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            location: None,
        }
    }

    pub fn with_location(mut self, location: FileSystemLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Label attached to a scene
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tag {
    Feature { name: String },
    Capability { name: String },
    Theme { name: String },
    Issue { name: String },
    Manual { name: String },
    #[serde(rename = "tag")]
    Arbitrary { name: String },
}

impl Tag {
    pub fn feature(name: impl Into<String>) -> Self {
        Self::Feature { name: name.into() }
    }

    /// Parse a raw runner tag such as `@smoke` or `@issue:JIRA-123`
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches('@');
        match raw.split_once(':') {
            Some((kind, value)) => {
                let name = value.trim().to_string();
                match kind.trim().to_lowercase().as_str() {
                    "issue" | "issues" => Self::Issue { name },
                    "capability" => Self::Capability { name },
                    "theme" => Self::Theme { name },
                    "feature" => Self::Feature { name },
                    _ => Self::Arbitrary {
                        name: raw.to_string(),
                    },
                }
            }
            None if raw.eq_ignore_ascii_case("manual") => Self::Manual {
                name: "manual".to_string(),
            },
            None => Self::Arbitrary {
                name: raw.to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Feature { name }
            | Self::Capability { name }
            | Self::Theme { name }
            | Self::Issue { name }
            | Self::Manual { name }
            | Self::Arbitrary { name } => name,
        }
    }

    /// The wire name of this tag's kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Feature { .. } => "feature",
            Self::Capability { .. } => "capability",
            Self::Theme { .. } => "theme",
            Self::Issue { .. } => "issue",
            Self::Manual { .. } => "manual",
            Self::Arbitrary { .. } => "tag",
        }
    }
}
