//! Scenecast Serenity BDD reporter
//!
//! A crew member that folds the domain event stream of each scene into a
//! Serenity BDD report and hands finished reports to a [`ReportSink`].

pub mod config;
pub mod context;
pub mod error;
pub mod reporter;

pub use config::ReporterConfig;
pub use context::{dashify, FailureCause, ReportResult, ReportTag, SerenityBddReport, TestStep, UserStory};
pub use error::{ReporterError, Result};
pub use reporter::{InMemorySink, ReportSink, SerenityBddReporter};
