//! Serenity BDD JSON produced from interleaved scenes

use std::sync::Arc;

use serde_json::json;

use scenecast_core::events::{SceneFinished, SceneStarts, SceneTagged, TaskFinished, TaskStarts, TestRunnerDetected};
use scenecast_core::{
    ActivityDetails, Category, CorrelationId, FileSystemLocation, Name, Outcome, RuntimeError, ScenarioDetails,
    Stage, Tag, Timestamp,
};
use scenecast_reporter::{InMemorySink, ReporterConfig, SerenityBddReporter};

fn at(millis: i64) -> Timestamp {
    Timestamp::from_millis(1_550_000_000_000 + millis).unwrap()
}

fn details(name: &str, line: u32) -> ScenarioDetails {
    ScenarioDetails::new(
        Name::new(name),
        Category::new("Shopping Cart"),
        FileSystemLocation::new("features/shopping-cart.feature", line, 3),
    )
}

fn start(stage: &Stage, scene: &CorrelationId, name: &str, line: u32, time: i64) {
    stage.emit(SceneStarts {
        scene_id: scene.clone(),
        details: details(name, line),
        timestamp: at(time),
    });
    stage.emit(TestRunnerDetected {
        scene_id: scene.clone(),
        name: Name::new("Cucumber"),
        timestamp: at(time),
    });
}

fn task(stage: &Stage, scene: &CorrelationId, activity: &str, name: &str, outcome: Outcome, from: i64, to: i64) {
    let details = ActivityDetails::new(Name::new(name));
    stage.emit(TaskStarts {
        scene_id: scene.clone(),
        activity_id: CorrelationId::from(activity),
        details: details.clone(),
        timestamp: at(from),
    });
    stage.emit(TaskFinished {
        scene_id: scene.clone(),
        activity_id: CorrelationId::from(activity),
        details,
        outcome,
        timestamp: at(to),
    });
}

#[tokio::test]
async fn test_interleaved_scenes_produce_independent_reports() {
    let sink = Arc::new(InMemorySink::new());
    let reporter = Arc::new(SerenityBddReporter::new(ReporterConfig::default(), sink.clone()));
    let stage = Stage::with_crew(vec![reporter]);

    let first = CorrelationId::from("scene-1");
    let second = CorrelationId::from("scene-2");
    let assertion = RuntimeError::assertion("expected 2 items but got 1");

    start(&stage, &first, "Adding items", 3, 0);
    start(&stage, &second, "Removing items", 9, 1);
    stage.emit(SceneTagged {
        scene_id: second.clone(),
        tag: Tag::from_raw("@issue:CART-7"),
        timestamp: at(1),
    });
    task(&stage, &first, "a-1", "Given an empty cart", Outcome::ExecutionSuccessful, 2, 4);
    task(&stage, &second, "b-1", "Given a cart with one item", Outcome::ExecutionSuccessful, 3, 5);
    task(&stage, &first, "a-2", "Then the cart has 2 items", Outcome::failed(assertion.clone()), 5, 8);
    task(&stage, &first, "a-3", "And the total is updated", Outcome::ExecutionSkipped, 8, 8);
    stage.emit(SceneFinished {
        scene_id: first.clone(),
        details: details("Adding items", 3),
        outcome: Outcome::failed(assertion),
        timestamp: at(10),
    });
    stage.emit(SceneFinished {
        scene_id: second.clone(),
        details: details("Removing items", 9),
        outcome: Outcome::ExecutionSuccessful,
        timestamp: at(11),
    });

    stage.wait_for_next_cue().await.unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);

    assert_eq!(
        reports[0].to_json().unwrap(),
        json!({
            "id": "shopping-cart;adding-items",
            "name": "Adding items",
            "title": "Adding items",
            "manual": false,
            "testSource": "Cucumber",
            "startTime": 1_550_000_000_000_i64,
            "duration": 10,
            "result": "FAILURE",
            "testFailureCause": { "errorType": "AssertionError", "message": "expected 2 items but got 1" },
            "tags": [],
            "testSteps": [
                { "number": 1, "description": "Given an empty cart", "startTime": 1_550_000_000_002_i64, "duration": 2, "result": "SUCCESS" },
                {
                    "number": 2,
                    "description": "Then the cart has 2 items",
                    "startTime": 1_550_000_000_005_i64,
                    "duration": 3,
                    "result": "FAILURE",
                    "exception": { "errorType": "AssertionError", "message": "expected 2 items but got 1" }
                },
                { "number": 3, "description": "And the total is updated", "startTime": 1_550_000_000_008_i64, "duration": 0, "result": "SKIPPED" }
            ],
            "userStory": {
                "id": "shopping-cart",
                "storyName": "Shopping Cart",
                "path": "features/shopping-cart.feature",
                "type": "feature"
            }
        })
    );

    assert_eq!(reports[1].id, "shopping-cart;removing-items");
    assert_eq!(reports[1].duration, 10);
    assert_eq!(reports[1].tags.len(), 1);
    assert_eq!(reports[1].tags[0].kind, "issue");
    assert_eq!(reports[1].test_steps.len(), 1);
}
