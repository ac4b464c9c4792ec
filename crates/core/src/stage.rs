//! The Stage: ordered event delivery to the crew and the cue barrier
//!
//! Crew members are notified synchronously, in registration order, every time
//! an event is emitted. A member that needs to do asynchronous work returns a
//! [`Continuation`]; the Stage keeps track of it until a caller awaits
//! [`Stage::wait_for_next_cue`], which settles every continuation that was
//! outstanding when it was called.
//!
//! Crew failures (returned errors and panics, synchronous or not) never stop
//! delivery. They are logged when they happen and reported by the next cue as
//! a [`CueError`].

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::error::{CrewError, CueError};
use crate::events::DomainEvent;

/// Asynchronous work a crew member is still doing for an event
pub type Continuation = BoxFuture<'static, anyhow::Result<()>>;

/// A consumer of the domain event stream
pub trait StageCrewMember: Send + Sync {
    /// Name used when reporting this member's failures
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle an event. Return a continuation if work is still in progress.
    fn notify_of(&self, event: &DomainEvent) -> anyhow::Result<Option<Continuation>>;
}

type Settling = Shared<BoxFuture<'static, Option<CrewError>>>;

/// Per-run event bus
pub struct Stage {
    crew: RwLock<Vec<Arc<dyn StageCrewMember>>>,
    queue: Mutex<VecDeque<DomainEvent>>,
    dispatching: AtomicBool,
    /// Continuations not yet observed by a completed cue
    outstanding: Arc<Mutex<Vec<Settling>>>,
}

impl Stage {
    /// Create a stage with no crew
    pub fn new() -> Self {
        Self {
            crew: RwLock::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            dispatching: AtomicBool::new(false),
            outstanding: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a stage with the given crew, in delivery order
    pub fn with_crew(crew: Vec<Arc<dyn StageCrewMember>>) -> Self {
        let stage = Self::new();
        for member in crew {
            stage.register(member);
        }
        stage
    }

    /// Append a crew member to the delivery order
    pub fn register(&self, member: Arc<dyn StageCrewMember>) {
        debug!(member = member.name(), "crew member registered");
        self.crew.write().push(member);
    }

    /// Deliver an event to every crew member.
    ///
    /// Events emitted by a crew member while it handles another event are
    /// queued and delivered once the current event has reached every member.
    pub fn emit(&self, event: impl Into<DomainEvent>) {
        let event = event.into();
        trace!(event = event.type_name(), scene = %event.scene_id(), "event emitted");
        self.queue.lock().push_back(event);

        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                return;
            }
            while let Some(event) = self.next_queued() {
                self.deliver(&event);
            }
            self.dispatching.store(false, Ordering::Release);

            if self.queue.lock().is_empty() {
                return;
            }
        }
    }

    /// Resolve once every continuation outstanding right now has settled.
    ///
    /// Resolves to `Err` listing each crew failure recorded since the last
    /// completed cue.
    pub fn wait_for_next_cue(&self) -> impl Future<Output = Result<(), CueError>> + Send + 'static {
        let pending: Vec<Settling> = self.outstanding.lock().clone();
        let outstanding = Arc::clone(&self.outstanding);

        debug!(outstanding = pending.len(), "waiting for the next cue");

        async move {
            let settled = future::join_all(pending).await;
            outstanding.lock().retain(|s| s.peek().is_none());

            let errors: Vec<CrewError> = settled.into_iter().flatten().collect();
            if errors.is_empty() {
                Ok(())
            } else {
                Err(CueError { errors })
            }
        }
    }

    fn next_queued(&self) -> Option<DomainEvent> {
        self.queue.lock().pop_front()
    }

    fn deliver(&self, event: &DomainEvent) {
        let crew: Vec<Arc<dyn StageCrewMember>> = self.crew.read().clone();

        for member in crew {
            let result = panic::catch_unwind(AssertUnwindSafe(|| member.notify_of(event)));
            match result {
                Ok(Ok(None)) => {}
                Ok(Ok(Some(continuation))) => {
                    self.track(member.name(), event.type_name(), continuation);
                }
                Ok(Err(e)) => self.record(CrewError::Failed {
                    member: member.name().to_string(),
                    event: event.type_name().to_string(),
                    message: format!("{:#}", e),
                }),
                Err(payload) => self.record(CrewError::Panicked {
                    member: member.name().to_string(),
                    event: event.type_name().to_string(),
                    message: panic_message(payload.as_ref()),
                }),
            }
        }
    }

    fn track(&self, member: &str, event: &'static str, continuation: Continuation) {
        let member = member.to_string();
        let settling = AssertUnwindSafe(continuation)
            .catch_unwind()
            .map(move |result| {
                let error = match result {
                    Ok(Ok(())) => return None,
                    Ok(Err(e)) => CrewError::Failed {
                        member,
                        event: event.to_string(),
                        message: format!("{:#}", e),
                    },
                    Err(payload) => CrewError::Panicked {
                        member,
                        event: event.to_string(),
                        message: panic_message(payload.as_ref()),
                    },
                };
                warn!(member = error.member(), %error, "crew continuation failed");
                Some(error)
            })
            .boxed()
            .shared();

        self.outstanding.lock().push(settling);
    }

    fn record(&self, error: CrewError) {
        warn!(member = error.member(), %error, "crew member failed");
        let settled = future::ready(Some(error)).boxed().shared();
        self.outstanding.lock().push(settled);
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SceneStarts, SceneTagged};
    use crate::model::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;
    use std::time::Duration;

    /// Appends `label:EventType` to a shared log
    struct Logger {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl StageCrewMember for Logger {
        fn name(&self) -> &str {
            self.label
        }

        fn notify_of(&self, event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
            self.log.lock().push(format!("{}:{}", self.label, event.type_name()));
            Ok(None)
        }
    }

    struct Failing;

    impl StageCrewMember for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn notify_of(&self, _event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
            anyhow::bail!("cannot handle this")
        }
    }

    struct Panicking;

    impl StageCrewMember for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn notify_of(&self, _event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
            panic!("handler exploded")
        }
    }

    /// Finishes its work asynchronously
    struct Slow {
        finished: Arc<AtomicUsize>,
        fail: bool,
    }

    impl StageCrewMember for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn notify_of(&self, _event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
            let finished = Arc::clone(&self.finished);
            let fail = self.fail;
            Ok(Some(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                if fail {
                    anyhow::bail!("could not write report");
                }
                Ok(())
            })))
        }
    }

    /// Tags every scene it sees starting
    struct Tagger {
        stage: Mutex<Weak<Stage>>,
    }

    impl StageCrewMember for Tagger {
        fn notify_of(&self, event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
            if let DomainEvent::SceneStarts(e) = event {
                if let Some(stage) = self.stage.lock().upgrade() {
                    stage.emit(SceneTagged {
                        scene_id: e.scene_id.clone(),
                        tag: Tag::from_raw("@smoke"),
                        timestamp: Timestamp::now(),
                    });
                }
            }
            Ok(None)
        }
    }

    fn scene_starts() -> SceneStarts {
        SceneStarts {
            scene_id: CorrelationId::create(),
            details: ScenarioDetails::new(
                Name::new("Hooks"),
                Category::new("Event Protocol"),
                FileSystemLocation::new("features/tasty-cucumber.feature", 3, 3),
            ),
            timestamp: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_delivers_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = Stage::with_crew(vec![
            Arc::new(Logger { label: "first", log: Arc::clone(&log) }),
            Arc::new(Logger { label: "second", log: Arc::clone(&log) }),
        ]);

        stage.emit(scene_starts());

        stage.wait_for_next_cue().await.unwrap();
        assert_eq!(*log.lock(), vec!["first:SceneStarts", "second:SceneStarts"]);
    }

    #[tokio::test]
    async fn test_cue_waits_for_continuations() {
        let finished = Arc::new(AtomicUsize::new(0));
        let stage = Stage::with_crew(vec![Arc::new(Slow { finished: Arc::clone(&finished), fail: false })]);

        stage.emit(scene_starts());
        stage.emit(scene_starts());
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        stage.wait_for_next_cue().await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cue_without_work_resolves() {
        let stage = Stage::new();
        assert!(stage.wait_for_next_cue().await.is_ok());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = Stage::with_crew(vec![
            Arc::new(Failing),
            Arc::new(Panicking),
            Arc::new(Logger { label: "recorder", log: Arc::clone(&log) }),
        ]);

        stage.emit(scene_starts());
        stage.emit(scene_starts());

        let error = stage.wait_for_next_cue().await.unwrap_err();
        assert_eq!(log.lock().len(), 2);
        assert_eq!(error.errors.len(), 4);
        assert_eq!(
            error.errors[0],
            CrewError::Failed {
                member: "failing".into(),
                event: "SceneStarts".into(),
                message: "cannot handle this".into(),
            }
        );
        assert_eq!(
            error.errors[1],
            CrewError::Panicked {
                member: "panicking".into(),
                event: "SceneStarts".into(),
                message: "handler exploded".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_failures_are_reported_once() {
        let finished = Arc::new(AtomicUsize::new(0));
        let stage = Stage::with_crew(vec![Arc::new(Slow { finished: Arc::clone(&finished), fail: true })]);

        stage.emit(scene_starts());

        let error = stage.wait_for_next_cue().await.unwrap_err();
        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].member(), "slow");
        assert!(stage.wait_for_next_cue().await.is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_cues_both_wait() {
        let finished = Arc::new(AtomicUsize::new(0));
        let stage = Stage::with_crew(vec![Arc::new(Slow { finished: Arc::clone(&finished), fail: false })]);

        stage.emit(scene_starts());
        let first = stage.wait_for_next_cue();
        let second = stage.wait_for_next_cue();

        let (first, second) = futures::join!(first, second);
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nested_emissions_keep_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tagger = Arc::new(Tagger { stage: Mutex::new(Weak::new()) });
        let stage = Arc::new(Stage::with_crew(vec![
            Arc::new(Logger { label: "before", log: Arc::clone(&log) }),
            tagger.clone(),
            Arc::new(Logger { label: "after", log: Arc::clone(&log) }),
        ]));
        *tagger.stage.lock() = Arc::downgrade(&stage);

        stage.emit(scene_starts());

        stage.wait_for_next_cue().await.unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "before:SceneStarts",
                "after:SceneStarts",
                "before:SceneTagged",
                "after:SceneTagged",
            ]
        );
    }
}
