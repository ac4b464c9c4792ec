//! Scenecast Core Library
//!
//! Domain model and event bus shared by every Scenecast crate:
//! - Value objects describing scenes and tasks
//! - Outcomes and the error taxonomy they carry
//! - The closed `DomainEvent` sum type and its JSON wire format
//! - The `Stage`, which delivers events to the crew and exposes the cue barrier
//!
//! # Architecture
//!
//! ```text
//! runner adapter ──emit()──► Stage ──notify_of()──► crew member 1
//!                              │                 └─► crew member 2 ─► continuation
//!                              │
//!          caller ──wait_for_next_cue()──► settles every outstanding continuation
//! ```

pub mod crew;
pub mod error;
pub mod events;
pub mod model;
pub mod outcome;
pub mod stage;

// Re-export commonly used types
pub use crew::EventRecorder;
pub use error::{CrewError, CueError, RuntimeError};
pub use events::DomainEvent;
pub use model::*;
pub use outcome::Outcome;
pub use stage::{Continuation, Stage, StageCrewMember};
