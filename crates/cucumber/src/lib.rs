//! Scenecast Cucumber adapter
//!
//! Listens to the Cucumber event protocol and announces what the runner does
//! as Scenecast domain events:
//! - `protocol`: the protocol's JSON payloads
//! - `adapter`: the stateful translation into scenes and tasks
//! - `binding`: the ordered queue a runner feeds, with lifecycle hooks
//! - `steps`: a step definition registry for runners built on this crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use scenecast_core::{EventRecorder, Stage};
//! use scenecast_cucumber::{AdapterConfig, CucumberEventProtocolAdapter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = Arc::new(EventRecorder::new());
//! let stage = Arc::new(Stage::with_crew(vec![recorder.clone()]));
//!
//! let (runner, _driver) = scenecast_cucumber::spawn(CucumberEventProtocolAdapter::new(stage, AdapterConfig::default()));
//! runner.send_json(serde_json::json!({ "type": "test-run-started" }))?;
//! runner.after_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod binding;
pub mod config;
pub mod error;
pub mod protocol;
pub mod steps;

pub use adapter::{classify, CucumberEventProtocolAdapter, LifecycleHook, SceneState};
pub use binding::{bind, spawn, RunnerBinding};
pub use config::AdapterConfig;
pub use error::{AdapterError, AdapterResult};
pub use protocol::{ProtocolEvent, SourceLocation, Status, TestResult};
pub use steps::{StepArgument, StepDefinition, StepMatch, StepRegistry, StepReturn};
