//! Cucumber feeds all the way to Serenity BDD reports

use std::sync::Arc;

use serde_json::Value;

use scenecast_core::{EventRecorder, Stage};
use scenecast_cucumber::{spawn, AdapterConfig, CucumberEventProtocolAdapter};
use scenecast_reporter::{InMemorySink, ReportResult, ReporterConfig, SerenityBddReporter};

fn events(sample: &str) -> Vec<Value> {
    serde_json::from_str(sample).unwrap()
}

#[tokio::test]
async fn test_reports_are_stored_before_after_all_resolves() {
    let sink = Arc::new(InMemorySink::new());
    let recorder = Arc::new(EventRecorder::new());
    let reporter = Arc::new(SerenityBddReporter::new(ReporterConfig::default(), sink.clone()));
    let stage = Arc::new(Stage::with_crew(vec![recorder.clone(), reporter.clone()]));

    let (binding, _driver) = spawn(CucumberEventProtocolAdapter::new(stage, AdapterConfig::default()));

    for sample in [
        include_str!("samples/scenario-with-hooks.json"),
        include_str!("samples/scenario-with-errors.json"),
        include_str!("samples/scenario-outline.json"),
    ] {
        for event in events(sample) {
            binding.send_json(event).unwrap();
        }
        binding.after_scenario().await.unwrap();
    }
    binding.after_all().await.unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 5);
    assert!(reporter.in_progress().is_empty());

    let hooks = &reports[0];
    assert_eq!(hooks.id, "event-protocol;hooks");
    assert_eq!(hooks.test_source.as_deref(), Some("Cucumber"));
    assert_eq!(hooks.result, Some(ReportResult::Success));
    assert_eq!(hooks.user_story.path, "features/tasty-cucumber.feature");
    assert_eq!(hooks.user_story.id, "event-protocol");
    assert_eq!(
        hooks.tags.iter().map(|t| (t.kind.as_str(), t.name.as_str())).collect::<Vec<_>>(),
        vec![("feature", "Event Protocol"), ("tag", "smoke"), ("issue", "EP-12")]
    );
    assert_eq!(
        hooks.test_steps.iter().map(|s| s.description.as_str()).collect::<Vec<_>>(),
        vec!["Given I have a tasty cucumber in my belly", "Then I'm very happy"]
    );

    let errors = &reports[1];
    assert_eq!(errors.result, Some(ReportResult::Error));
    assert_eq!(
        errors.test_failure_cause.as_ref().map(|c| c.message.as_str()),
        Some("We're sorry, something happened")
    );
    assert_eq!(errors.test_steps[0].result, ReportResult::Error);

    let outline_steps: Vec<&str> = reports[2..]
        .iter()
        .map(|r| r.test_steps[0].description.as_str())
        .collect();
    assert_eq!(
        outline_steps,
        vec![
            "Given I like programming",
            "Given I like to play guitar",
            "Given I like martial arts",
        ]
    );

    assert_eq!(
        recorder.type_names().iter().filter(|t| **t == "SceneFinished").count(),
        5
    );
}
