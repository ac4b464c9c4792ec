//! Cucumber event protocol adapter
//!
//! Translates the protocol's loosely related payloads into the canonical
//! scene/task event sequence:
//!
//! ```text
//! gherkin-document ──► feature names, step keywords      (by uri)
//! pickle-accepted  ──► scenario names, tags, step texts  (by uri + line)
//! test-case-prepared ► scene: NotStarted, step/hook list
//! test-case-started ─► SceneStarts, TestRunnerDetected, SceneTagged*   (InProgress)
//! test-step-started ─► TaskStarts
//! test-step-finished ► TaskFinished(outcome)
//! test-case-finished ► SceneFinished(worst outcome)                     (Finished)
//! ```
//!
//! Once a step or hook halts a scene (pending, undefined, ambiguous, failed or
//! compromised), every later step of that scene is reported as skipped.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use scenecast_core::events::{SceneFinished, SceneStarts, SceneTagged, TaskFinished, TaskStarts, TestRunnerDetected};
use scenecast_core::{
    ActivityDetails, Category, CorrelationId, CueError, FileSystemLocation, Name, Outcome, RuntimeError,
    ScenarioDetails, Stage, Tag, Timestamp,
};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::protocol::{
    GherkinDocumentEvent, Pickle, PickleEvent, PreparedStep, ProtocolEvent, SourceLocation, Status, TestCasePrepared,
    TestResult,
};

/// Hook points a runner calls around scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    BeforeScenario,
    AfterScenario,
    AfterAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    NotStarted,
    InProgress,
    Finished,
}

/// Feature name and step keywords of one feature file
struct FeatureIndex {
    name: String,
    /// line → (keyword, column)
    steps: HashMap<u32, (String, u32)>,
}

struct SceneStep {
    /// `None` for hooks
    details: Option<ActivityDetails>,
    label: String,
    activity_id: Option<CorrelationId>,
    finished: bool,
}

struct Scene {
    id: CorrelationId,
    details: ScenarioDetails,
    tags: Vec<Tag>,
    steps: Vec<SceneStep>,
    state: SceneState,
    outcomes: Vec<Outcome>,
    halted: bool,
}

impl Scene {
    fn begin(&mut self, stage: &Stage, config: &AdapterConfig) {
        if self.state == SceneState::Finished {
            self.restart();
        }

        debug!(scene = %self.id, name = %self.details.name, "scene starts");
        stage.emit(SceneStarts {
            scene_id: self.id.clone(),
            details: self.details.clone(),
            timestamp: Timestamp::now(),
        });
        stage.emit(TestRunnerDetected {
            scene_id: self.id.clone(),
            name: Name::new(config.runner_name.clone()),
            timestamp: Timestamp::now(),
        });
        if config.tag_features {
            stage.emit(SceneTagged {
                scene_id: self.id.clone(),
                tag: Tag::feature(self.details.category.value()),
                timestamp: Timestamp::now(),
            });
        }
        for tag in &self.tags {
            stage.emit(SceneTagged {
                scene_id: self.id.clone(),
                tag: tag.clone(),
                timestamp: Timestamp::now(),
            });
        }

        self.state = SceneState::InProgress;
    }

    /// A test case executed again at the same location is a new scene
    fn restart(&mut self) {
        self.id = CorrelationId::create();
        self.outcomes.clear();
        self.halted = false;
        for step in &mut self.steps {
            step.activity_id = None;
            step.finished = false;
        }
    }

    fn ensure_started(&mut self, stage: &Stage, config: &AdapterConfig) {
        if self.state == SceneState::NotStarted {
            self.begin(stage, config);
        }
    }

    fn start_task(&mut self, stage: &Stage, index: usize) {
        let step = &mut self.steps[index];
        let Some(details) = &step.details else {
            return;
        };
        if step.activity_id.is_some() {
            return;
        }

        let activity_id = CorrelationId::create();
        trace!(scene = %self.id, activity = %activity_id, step = %details.name, "task starts");
        stage.emit(TaskStarts {
            scene_id: self.id.clone(),
            activity_id: activity_id.clone(),
            details: details.clone(),
            timestamp: Timestamp::now(),
        });
        step.activity_id = Some(activity_id);
    }

    fn finish_task(&mut self, stage: &Stage, index: usize, outcome: Outcome) {
        if self.steps[index].details.is_some() && self.steps[index].activity_id.is_none() {
            self.start_task(stage, index);
        }

        if outcome.halts_scene() {
            self.halted = true;
        }
        self.outcomes.push(outcome.clone());

        let step = &mut self.steps[index];
        step.finished = true;
        if let (Some(details), Some(activity_id)) = (&step.details, &step.activity_id) {
            trace!(scene = %self.id, activity = %activity_id, %outcome, "task finished");
            stage.emit(TaskFinished {
                scene_id: self.id.clone(),
                activity_id: activity_id.clone(),
                details: details.clone(),
                outcome,
                timestamp: Timestamp::now(),
            });
        }
    }

    fn finish(&mut self, stage: &Stage, case_result: Option<&TestResult>) {
        let dangling: Vec<usize> = (0..self.steps.len())
            .filter(|&i| self.steps[i].activity_id.is_some() && !self.steps[i].finished)
            .collect();
        for index in dangling {
            let error = RuntimeError::compromised(format!(
                "{} did not report a result",
                self.steps[index].label
            ));
            warn!(scene = %self.id, step = %self.steps[index].label, "closing a step that never finished");
            self.finish_task(stage, index, Outcome::compromised(error));
        }

        let outcome = if self.steps.is_empty() {
            Outcome::pending(RuntimeError::pending(format!(
                "\"{}\" has no test steps",
                self.details.name
            )))
        } else {
            match Outcome::worst_of(&self.outcomes) {
                Some(outcome) => outcome,
                None => case_result
                    .map(|result| classify(result, &self.details.name.to_string()))
                    .unwrap_or(Outcome::ExecutionSkipped),
            }
        };

        debug!(scene = %self.id, %outcome, "scene finished");
        stage.emit(SceneFinished {
            scene_id: self.id.clone(),
            details: self.details.clone(),
            outcome,
            timestamp: Timestamp::now(),
        });
        self.state = SceneState::Finished;
    }
}

/// Map a protocol result onto an outcome
pub fn classify(result: &TestResult, step: &str) -> Outcome {
    let reported = result.exception.as_ref();
    match result.status {
        Status::Passed => Outcome::ExecutionSuccessful,
        Status::Skipped => Outcome::ExecutionSkipped,
        Status::Undefined => Outcome::pending(RuntimeError::pending(format!(
            "Step \"{}\" has not been implemented yet",
            step
        ))),
        Status::Pending => Outcome::pending(RuntimeError::pending(
            reported
                .map(|e| e.message().to_string())
                .unwrap_or_else(|| format!("Step \"{}\" is marked as pending", step)),
        )),
        Status::Ambiguous => Outcome::failed(RuntimeError::ambiguous(
            reported
                .map(|e| e.message().to_string())
                .unwrap_or_else(|| format!("Multiple step definitions match \"{}\"", step)),
        )),
        Status::Failed => match reported {
            Some(exception) => Outcome::from_error(exception.to_runtime_error()),
            None => Outcome::failed(RuntimeError::generic(format!("Step \"{}\" failed", step))),
        },
        Status::Unknown => Outcome::failed(RuntimeError::generic(format!(
            "Step \"{}\" finished with an unrecognised status",
            step
        ))),
    }
}

/// Stateful translator from the Cucumber event protocol to domain events
pub struct CucumberEventProtocolAdapter {
    stage: Arc<Stage>,
    config: AdapterConfig,
    features: HashMap<String, FeatureIndex>,
    pickles: HashMap<SourceLocation, PickleEvent>,
    scenes: HashMap<SourceLocation, Scene>,
}

impl CucumberEventProtocolAdapter {
    pub fn new(stage: Arc<Stage>, config: AdapterConfig) -> Self {
        Self {
            stage,
            config,
            features: HashMap::new(),
            pickles: HashMap::new(),
            scenes: HashMap::new(),
        }
    }

    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    /// Translate one protocol event.
    ///
    /// Events that cannot be related to a known test case are logged and
    /// dropped; nothing is ever raised back to the runner.
    pub fn notify(&mut self, event: ProtocolEvent) {
        let kind = event.kind();
        if let Err(e) = self.translate(event) {
            warn!(event = kind, error = %e, "dropping protocol event");
        }
    }

    /// Translate one flat, type-tagged JSON payload
    pub fn notify_json(&mut self, payload: Value) {
        match ProtocolEvent::from_json(payload) {
            Ok(event) => self.notify(event),
            Err(e) => warn!(error = %AdapterError::from(e), "dropping protocol event"),
        }
    }

    /// Run a lifecycle hook. After-hooks resolve once the crew has settled.
    pub async fn on_hook(&self, hook: LifecycleHook) -> Result<(), CueError> {
        match hook {
            LifecycleHook::BeforeScenario => Ok(()),
            LifecycleHook::AfterScenario | LifecycleHook::AfterAll => {
                debug!(?hook, "waiting for the crew to settle");
                self.stage.wait_for_next_cue().await
            }
        }
    }

    /// State of the scene prepared at `location`, if any
    pub fn scene_state(&self, location: &SourceLocation) -> Option<SceneState> {
        self.scenes.get(location).map(|scene| scene.state)
    }

    /// Number of scenes started but not yet finished
    pub fn in_flight(&self) -> usize {
        self.scenes
            .values()
            .filter(|scene| scene.state == SceneState::InProgress)
            .count()
    }

    fn translate(&mut self, event: ProtocolEvent) -> AdapterResult<()> {
        match event {
            ProtocolEvent::GherkinDocument(e) => self.index_document(e),
            ProtocolEvent::PickleAccepted(e) => self.accept_pickle(e),
            ProtocolEvent::TestRunStarted => debug!("test run started"),
            ProtocolEvent::TestCasePrepared(e) => self.prepare(e)?,
            ProtocolEvent::TestCaseStarted(e) => {
                let scene = Self::scene_at(&mut self.scenes, &e.source_location)?;
                match scene.state {
                    SceneState::InProgress => {
                        warn!(location = %e.source_location, "test case already started")
                    }
                    SceneState::NotStarted | SceneState::Finished => scene.begin(&self.stage, &self.config),
                }
            }
            ProtocolEvent::TestStepStarted(e) => {
                let location = e.test_case.source_location;
                let scene = Self::running_scene_at(&mut self.scenes, &location, &self.stage, &self.config)?;
                Self::check_index(scene, &location, e.index)?;
                scene.start_task(&self.stage, e.index);
            }
            ProtocolEvent::TestStepFinished(e) => {
                let location = e.test_case.source_location;
                let scene = Self::running_scene_at(&mut self.scenes, &location, &self.stage, &self.config)?;
                Self::check_index(scene, &location, e.index)?;

                let step = &scene.steps[e.index];
                if step.finished {
                    warn!(location = %location, index = e.index, "step already finished");
                    return Ok(());
                }
                let outcome = if scene.halted && step.details.is_some() {
                    Outcome::ExecutionSkipped
                } else {
                    classify(&e.result, &step.label)
                };
                scene.finish_task(&self.stage, e.index, outcome);
            }
            ProtocolEvent::TestCaseFinished(e) => {
                let scene = Self::running_scene_at(&mut self.scenes, &e.source_location, &self.stage, &self.config)?;
                scene.finish(&self.stage, e.result.as_ref());
            }
            ProtocolEvent::TestRunFinished(e) => {
                let success = e.result.map(|r| r.success).unwrap_or(false);
                info!(success, "test run finished");
            }
            ProtocolEvent::Ignored => {}
        }
        Ok(())
    }

    fn index_document(&mut self, event: GherkinDocumentEvent) {
        let Some(feature) = event.document.feature else {
            debug!(uri = %event.uri, "gherkin document without a feature");
            return;
        };

        let steps = feature
            .children
            .iter()
            .flat_map(|child| child.steps.iter())
            .map(|step| (step.location.line, (step.keyword.clone(), step.location.column)))
            .collect();

        self.features.insert(
            event.uri,
            FeatureIndex {
                name: feature.name,
                steps,
            },
        );
    }

    fn accept_pickle(&mut self, event: PickleEvent) {
        match event.pickle.locations.first() {
            Some(location) => {
                let key = SourceLocation::new(event.uri.clone(), location.line);
                self.pickles.insert(key, event);
            }
            None => warn!(uri = %event.uri, name = %event.pickle.name, "pickle without a location"),
        }
    }

    fn prepare(&mut self, event: TestCasePrepared) -> AdapterResult<()> {
        let location = event.source_location;
        if self.scene_state(&location) == Some(SceneState::InProgress) {
            warn!(location = %location, "test case prepared while still running");
            return Ok(());
        }

        let accepted = self.pickles.get(&location).ok_or_else(|| AdapterError::UnknownPickle {
            uri: location.uri.clone(),
            line: location.line,
        })?;
        let pickle = &accepted.pickle;
        let feature = self.features.get(&location.uri);

        let category = match feature {
            Some(feature) => feature.name.clone(),
            None => Path::new(&location.uri)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        let column = pickle.locations.first().map(|l| l.column).unwrap_or(0);
        let details = ScenarioDetails::new(
            Name::new(pickle.name.clone()),
            Category::new(category),
            FileSystemLocation::new(&location.uri, location.line, column),
        );

        let steps = event
            .steps
            .iter()
            .map(|prepared| Self::describe_step(prepared, pickle, feature))
            .collect();

        debug!(location = %location, name = %pickle.name, "test case prepared");
        self.scenes.insert(
            location,
            Scene {
                id: CorrelationId::create(),
                details,
                tags: pickle.tags.iter().map(|t| Tag::from_raw(&t.name)).collect(),
                steps,
                state: SceneState::NotStarted,
                outcomes: Vec::new(),
                halted: false,
            },
        );
        Ok(())
    }

    fn describe_step(prepared: &PreparedStep, pickle: &Pickle, feature: Option<&FeatureIndex>) -> SceneStep {
        let Some(source) = &prepared.source_location else {
            let label = match &prepared.action_location {
                Some(action) => format!("Hook at {}", action),
                None => "Hook".to_string(),
            };
            return SceneStep {
                details: None,
                label,
                activity_id: None,
                finished: false,
            };
        };

        let text = pickle
            .steps
            .iter()
            .find(|step| step.locations.iter().any(|l| l.line == source.line))
            .map(|step| step.text.as_str());
        let keyword = feature.and_then(|f| f.steps.get(&source.line));

        let name = match (keyword, text) {
            (Some((keyword, _)), Some(text)) => format!("{}{}", keyword, text),
            (None, Some(text)) => text.to_string(),
            (_, None) => format!("Step at {}", source),
        };
        let column = keyword.map(|(_, column)| *column).unwrap_or(0);

        SceneStep {
            details: Some(
                ActivityDetails::new(Name::new(name.trim()))
                    .with_location(FileSystemLocation::new(&source.uri, source.line, column)),
            ),
            label: name.trim().to_string(),
            activity_id: None,
            finished: false,
        }
    }

    fn scene_at<'a>(scenes: &'a mut HashMap<SourceLocation, Scene>, location: &SourceLocation) -> AdapterResult<&'a mut Scene> {
        scenes.get_mut(location).ok_or_else(|| AdapterError::UnknownTestCase {
            uri: location.uri.clone(),
            line: location.line,
        })
    }

    /// The scene at `location`, started implicitly if the runner skipped
    /// `test-case-started`
    fn running_scene_at<'a>(
        scenes: &'a mut HashMap<SourceLocation, Scene>,
        location: &SourceLocation,
        stage: &Stage,
        config: &AdapterConfig,
    ) -> AdapterResult<&'a mut Scene> {
        let scene = Self::scene_at(scenes, location)?;
        if scene.state == SceneState::Finished {
            return Err(AdapterError::TestCaseFinished {
                uri: location.uri.clone(),
                line: location.line,
            });
        }
        scene.ensure_started(stage, config);
        Ok(scene)
    }

    fn check_index(scene: &Scene, location: &SourceLocation, index: usize) -> AdapterResult<()> {
        if index < scene.steps.len() {
            Ok(())
        } else {
            Err(AdapterError::UnknownStep {
                uri: location.uri.clone(),
                line: location.line,
                index,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ExceptionDetails, RawException};
    use test_case::test_case;

    fn failed_with(name: &str, message: &str) -> TestResult {
        TestResult::new(Status::Failed).with_exception(RawException::Detailed(ExceptionDetails {
            name: Some(name.to_string()),
            message: message.to_string(),
            expected: None,
            actual: None,
            stack: None,
        }))
    }

    #[test_case(TestResult::new(Status::Passed), "ExecutionSuccessful" ; "passed")]
    #[test_case(TestResult::new(Status::Skipped), "ExecutionSkipped" ; "skipped")]
    #[test_case(TestResult::new(Status::Undefined), "ImplementationPending" ; "undefined")]
    #[test_case(TestResult::new(Status::Pending), "ImplementationPending" ; "pending")]
    #[test_case(TestResult::new(Status::Ambiguous), "ExecutionFailedWithError" ; "ambiguous")]
    #[test_case(TestResult::new(Status::Unknown), "ExecutionFailedWithError" ; "unknown status")]
    #[test_case(failed_with("Error", "boom"), "ExecutionFailedWithError" ; "generic error")]
    #[test_case(failed_with("AssertionError", "expected 1"), "ExecutionFailedWithError" ; "assertion")]
    #[test_case(failed_with("TestCompromisedError", "db down"), "ExecutionCompromised" ; "compromised")]
    #[test_case(failed_with("ImplementationPendingError", "later"), "ImplementationPending" ; "pending error")]
    fn test_classify(result: TestResult, expected: &str) {
        assert_eq!(classify(&result, "Given a step").type_name(), expected);
    }

    #[test]
    fn test_classify_keeps_error_kind_and_message() {
        let outcome = classify(&failed_with("AssertionError", "expected true to equal false"), "Given a step");
        assert_eq!(outcome, Outcome::failed(RuntimeError::assertion("expected true to equal false")));

        let outcome = classify(&TestResult::new(Status::Ambiguous), "Given a step");
        assert_eq!(
            outcome.error().map(RuntimeError::kind),
            Some("AmbiguousStepDefinitionError")
        );
    }

    #[test]
    fn test_undefined_message_names_the_step() {
        let outcome = classify(&TestResult::new(Status::Undefined), "Given I have an undefined step");
        assert_eq!(
            outcome.error().unwrap().message(),
            "Step \"Given I have an undefined step\" has not been implemented yet"
        );
    }
}
