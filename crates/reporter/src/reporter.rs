//! Serenity BDD report builder
//!
//! Folds the event stream of every scene into a [`SerenityBddReport`]. When a
//! scene finishes its report is handed to a [`ReportSink`] in a continuation,
//! so a cue waits for the report to be stored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use scenecast_core::events::{SceneFinished, SceneStarts, TaskFinished, TaskStarts};
use scenecast_core::{Continuation, CorrelationId, DomainEvent, StageCrewMember, Timestamp};

use crate::config::ReporterConfig;
use crate::context::{FailureCause, ReportResult, ReportTag, SerenityBddReport, TestStep};
use crate::error::{ReporterError, Result};

/// Destination of finished reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn store(&self, report: SerenityBddReport) -> Result<()>;
}

/// Keeps stored reports in memory
#[derive(Default)]
pub struct InMemorySink {
    reports: Mutex<Vec<SerenityBddReport>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<SerenityBddReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

#[async_trait]
impl ReportSink for InMemorySink {
    async fn store(&self, report: SerenityBddReport) -> Result<()> {
        debug!(report = %report.id, "report stored");
        self.reports.lock().push(report);
        Ok(())
    }
}

struct SceneFold {
    report: SerenityBddReport,
    started: Timestamp,
    /// activity id → index into `report.test_steps`
    open_steps: HashMap<CorrelationId, usize>,
}

impl SceneFold {
    fn start_step(&mut self, event: &TaskStarts) {
        self.report.test_steps.push(TestStep {
            number: self.report.test_steps.len() + 1,
            description: event.details.name.to_string(),
            start_time: event.timestamp.as_millis(),
            duration: 0,
            result: ReportResult::Success,
            exception: None,
        });
        self.open_steps
            .insert(event.activity_id.clone(), self.report.test_steps.len() - 1);
    }

    fn finish_step(&mut self, event: &TaskFinished) {
        let index = match self.open_steps.remove(&event.activity_id) {
            Some(index) => index,
            None => {
                warn!(activity = %event.activity_id, "task finished without starting");
                self.start_step(&TaskStarts {
                    scene_id: event.scene_id.clone(),
                    activity_id: event.activity_id.clone(),
                    details: event.details.clone(),
                    timestamp: event.timestamp,
                });
                self.open_steps.remove(&event.activity_id);
                self.report.test_steps.len() - 1
            }
        };

        let step = &mut self.report.test_steps[index];
        step.duration = u64::try_from(event.timestamp.as_millis() - step.start_time).unwrap_or(0);
        step.result = ReportResult::from(&event.outcome);
        step.exception = event.outcome.error().map(FailureCause::from);
    }

    fn finish(mut self, event: &SceneFinished) -> SerenityBddReport {
        self.report.duration = event.timestamp.millis_since(self.started);
        self.report.result = Some(ReportResult::from(&event.outcome));
        self.report.test_failure_cause = event.outcome.error().map(FailureCause::from);
        self.report
    }
}

#[derive(Default)]
struct Fold {
    in_progress: HashMap<CorrelationId, SceneFold>,
    completed: usize,
}

/// Crew member building one Serenity BDD report per scene
pub struct SerenityBddReporter {
    config: ReporterConfig,
    sink: Arc<dyn ReportSink>,
    fold: Mutex<Fold>,
}

impl SerenityBddReporter {
    pub fn new(config: ReporterConfig, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            config,
            sink,
            fold: Mutex::new(Fold::default()),
        }
    }

    /// Reports of scenes that have started but not finished
    pub fn in_progress(&self) -> Vec<SerenityBddReport> {
        self.fold
            .lock()
            .in_progress
            .values()
            .map(|scene| scene.report.clone())
            .collect()
    }

    /// Number of scenes whose report was handed to the sink
    pub fn completed(&self) -> usize {
        self.fold.lock().completed
    }

    fn fold_event(&self, event: &DomainEvent) -> Result<Option<SerenityBddReport>> {
        let mut fold = self.fold.lock();

        if let DomainEvent::SceneStarts(SceneStarts {
            scene_id,
            details,
            timestamp,
        }) = event
        {
            let report = SerenityBddReport::seeded(details, *timestamp, &self.config);
            let previous = fold.in_progress.insert(
                scene_id.clone(),
                SceneFold {
                    report,
                    started: *timestamp,
                    open_steps: HashMap::new(),
                },
            );
            if previous.is_some() {
                warn!(scene = %scene_id, "scene started twice, discarding the earlier report");
            }
            return Ok(None);
        }

        let scene_id = event.scene_id();
        if let DomainEvent::SceneFinished(finished) = event {
            let scene = fold
                .in_progress
                .remove(scene_id)
                .ok_or_else(|| ReporterError::UnknownScene(scene_id.clone()))?;
            let report = scene.finish(finished);
            fold.completed += 1;
            return Ok(Some(report));
        }

        let scene = fold
            .in_progress
            .get_mut(scene_id)
            .ok_or_else(|| ReporterError::UnknownScene(scene_id.clone()))?;
        match event {
            DomainEvent::TestRunnerDetected(e) => scene.report.test_source = Some(e.name.to_string()),
            DomainEvent::SceneTagged(e) => scene.report.tags.push(ReportTag::from(&e.tag)),
            DomainEvent::TaskStarts(e) => scene.start_step(e),
            DomainEvent::TaskFinished(e) => scene.finish_step(e),
            DomainEvent::SceneStarts(_) | DomainEvent::SceneFinished(_) => {}
        }
        Ok(None)
    }
}

impl StageCrewMember for SerenityBddReporter {
    fn name(&self) -> &str {
        "SerenityBddReporter"
    }

    fn notify_of(&self, event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
        let Some(report) = self.fold_event(event)? else {
            return Ok(None);
        };

        debug!(report = %report.id, result = ?report.result, "report complete");
        let sink = Arc::clone(&self.sink);
        let store = async move { sink.store(report).await.map_err(anyhow::Error::from) };
        Ok(Some(store.boxed()))
    }
}
