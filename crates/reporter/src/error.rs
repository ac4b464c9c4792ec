//! Error types for the report builder

use scenecast_core::CorrelationId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("No report in progress for scene {0}")]
    UnknownScene(CorrelationId),

    #[error("Report sink failed: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, ReporterError>;
