//! Domain events announced on the Stage
//!
//! Every event carries the correlation id of the scene it belongs to and the
//! moment it was created. On the wire each event is a JSON object tagged with
//! its `type`:
//!
//! ```json
//! { "type": "SceneTagged", "sceneId": "…", "tag": { "type": "feature", "name": "…" }, "timestamp": "…" }
//! ```

use serde::{Deserialize, Serialize};

use crate::model::{ActivityDetails, CorrelationId, Name, ScenarioDetails, Tag, Timestamp};
use crate::outcome::Outcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunnerDetected {
    pub scene_id: CorrelationId,
    pub name: Name,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneStarts {
    pub scene_id: CorrelationId,
    pub details: ScenarioDetails,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTagged {
    pub scene_id: CorrelationId,
    pub tag: Tag,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStarts {
    pub scene_id: CorrelationId,
    pub activity_id: CorrelationId,
    pub details: ActivityDetails,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFinished {
    pub scene_id: CorrelationId,
    pub activity_id: CorrelationId,
    pub details: ActivityDetails,
    pub outcome: Outcome,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneFinished {
    pub scene_id: CorrelationId,
    pub details: ScenarioDetails,
    pub outcome: Outcome,
    pub timestamp: Timestamp,
}

/// Closed set of events emitted to the crew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    TestRunnerDetected(TestRunnerDetected),
    SceneStarts(SceneStarts),
    SceneTagged(SceneTagged),
    TaskStarts(TaskStarts),
    TaskFinished(TaskFinished),
    SceneFinished(SceneFinished),
}

impl DomainEvent {
    pub fn scene_id(&self) -> &CorrelationId {
        match self {
            Self::TestRunnerDetected(e) => &e.scene_id,
            Self::SceneStarts(e) => &e.scene_id,
            Self::SceneTagged(e) => &e.scene_id,
            Self::TaskStarts(e) => &e.scene_id,
            Self::TaskFinished(e) => &e.scene_id,
            Self::SceneFinished(e) => &e.scene_id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::TestRunnerDetected(e) => e.timestamp,
            Self::SceneStarts(e) => e.timestamp,
            Self::SceneTagged(e) => e.timestamp,
            Self::TaskStarts(e) => e.timestamp,
            Self::TaskFinished(e) => e.timestamp,
            Self::SceneFinished(e) => e.timestamp,
        }
    }

    /// The wire name of this event's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TestRunnerDetected(_) => "TestRunnerDetected",
            Self::SceneStarts(_) => "SceneStarts",
            Self::SceneTagged(_) => "SceneTagged",
            Self::TaskStarts(_) => "TaskStarts",
            Self::TaskFinished(_) => "TaskFinished",
            Self::SceneFinished(_) => "SceneFinished",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

macro_rules! impl_from_event {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for DomainEvent {
                fn from(event: $variant) -> Self {
                    DomainEvent::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    TestRunnerDetected,
    SceneStarts,
    SceneTagged,
    TaskStarts,
    TaskFinished,
    SceneFinished,
);
