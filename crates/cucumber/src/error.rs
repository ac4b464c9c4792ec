//! Error types for the Cucumber adapter

use scenecast_core::CueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Malformed protocol event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("No test case prepared at {uri}:{line}")]
    UnknownTestCase { uri: String, line: u32 },

    #[error("No accepted pickle at {uri}:{line}")]
    UnknownPickle { uri: String, line: u32 },

    #[error("Test case {uri}:{line} has already finished")]
    TestCaseFinished { uri: String, line: u32 },

    #[error("Test case {uri}:{line} has no step at index {index}")]
    UnknownStep { uri: String, line: u32, index: usize },

    #[error("Invalid step pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Cue(#[from] CueError),

    #[error("Runner binding closed")]
    BindingClosed,
}

pub type AdapterResult<T> = Result<T, AdapterError>;
