//! General-purpose crew members

use parking_lot::Mutex;

use crate::events::DomainEvent;
use crate::model::CorrelationId;
use crate::stage::{Continuation, StageCrewMember};

/// Retains every event it is notified of, in delivery order
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<DomainEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    /// Events belonging to one scene
    pub fn events_of(&self, scene_id: &CorrelationId) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.scene_id() == scene_id)
            .cloned()
            .collect()
    }

    /// Type names of the recorded events, handy for asserting on sequences
    pub fn type_names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DomainEvent::type_name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl StageCrewMember for EventRecorder {
    fn name(&self) -> &str {
        "EventRecorder"
    }

    fn notify_of(&self, event: &DomainEvent) -> anyhow::Result<Option<Continuation>> {
        self.events.lock().push(event.clone());
        Ok(None)
    }
}
