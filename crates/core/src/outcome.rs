//! Classified results of executing a task or a scene

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Result of executing a task or a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outcome {
    ExecutionSuccessful,
    ExecutionSkipped,
    ExecutionFailedWithError { error: RuntimeError },
    ExecutionCompromised { error: RuntimeError },
    ImplementationPending { error: RuntimeError },
}

impl Outcome {
    pub fn failed(error: RuntimeError) -> Self {
        Self::ExecutionFailedWithError { error }
    }

    pub fn compromised(error: RuntimeError) -> Self {
        Self::ExecutionCompromised { error }
    }

    pub fn pending(error: RuntimeError) -> Self {
        Self::ImplementationPending { error }
    }

    /// Classify an error into the outcome it produces
    pub fn from_error(error: RuntimeError) -> Self {
        match error {
            RuntimeError::TestCompromised { .. } => Self::compromised(error),
            RuntimeError::ImplementationPending { .. } => Self::pending(error),
            RuntimeError::Assertion { .. }
            | RuntimeError::Generic { .. }
            | RuntimeError::AmbiguousStepDefinition { .. } => Self::failed(error),
        }
    }

    /// Aggregation rank: higher means worse.
    ///
    /// Failed-with-error and compromised share a rank, so the one that
    /// happened first wins a fold.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::ExecutionSuccessful => 0,
            Self::ExecutionSkipped => 1,
            Self::ExecutionFailedWithError { .. } | Self::ExecutionCompromised { .. } => 2,
            Self::ImplementationPending { .. } => 3,
        }
    }

    pub fn is_worse_than(&self, other: &Outcome) -> bool {
        self.precedence() > other.precedence()
    }

    /// True for outcomes that halt the rest of the scene
    pub fn halts_scene(&self) -> bool {
        self.precedence() >= 2
    }

    pub fn error(&self) -> Option<&RuntimeError> {
        match self {
            Self::ExecutionFailedWithError { error }
            | Self::ExecutionCompromised { error }
            | Self::ImplementationPending { error } => Some(error),
            Self::ExecutionSuccessful | Self::ExecutionSkipped => None,
        }
    }

    /// Fold outcomes into the worst one, keeping the earliest of equal rank.
    ///
    /// Returns `None` for an empty sequence.
    pub fn worst_of<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> Option<Outcome> {
        outcomes
            .into_iter()
            .fold(None::<&Outcome>, |worst, outcome| match worst {
                Some(current) if !outcome.is_worse_than(current) => Some(current),
                _ => Some(outcome),
            })
            .cloned()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ExecutionSuccessful => "ExecutionSuccessful",
            Self::ExecutionSkipped => "ExecutionSkipped",
            Self::ExecutionFailedWithError { .. } => "ExecutionFailedWithError",
            Self::ExecutionCompromised { .. } => "ExecutionCompromised",
            Self::ImplementationPending { .. } => "ImplementationPending",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.error() {
            Some(error) => write!(f, "{} ({}: {})", self.type_name(), error.kind(), error),
            None => f.write_str(self.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn all_variants() -> Vec<Outcome> {
        vec![
            Outcome::ExecutionSuccessful,
            Outcome::ExecutionSkipped,
            Outcome::failed(RuntimeError::assertion("expected 1 to equal 2")),
            Outcome::compromised(RuntimeError::compromised("database is down")),
            Outcome::pending(RuntimeError::pending("not yet")),
        ]
    }

    #[test]
    fn test_round_trips_every_variant() {
        for outcome in all_variants() {
            let json = serde_json::to_string(&outcome).unwrap();
            let parsed: Outcome = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, outcome, "{}", json);
        }
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(Outcome::failed(RuntimeError::generic("boom"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "ExecutionFailedWithError",
                "error": { "type": "Error", "message": "boom" }
            })
        );
    }

    #[test]
    fn test_pending_beats_failure() {
        let outcomes = all_variants();
        let worst = Outcome::worst_of(&outcomes).unwrap();
        assert_eq!(worst, Outcome::pending(RuntimeError::pending("not yet")));
    }

    #[test]
    fn test_first_failure_wins_a_tie() {
        let first = Outcome::compromised(RuntimeError::compromised("first"));
        let second = Outcome::failed(RuntimeError::generic("second"));
        let outcomes = [Outcome::ExecutionSuccessful, first.clone(), second];
        assert_eq!(Outcome::worst_of(&outcomes), Some(first));
    }

    #[test]
    fn test_fold_of_nothing() {
        assert_eq!(Outcome::worst_of(&[]), None);
        assert_eq!(
            Outcome::worst_of(&[Outcome::ExecutionSuccessful, Outcome::ExecutionSkipped]),
            Some(Outcome::ExecutionSkipped)
        );
    }

    #[test_case(RuntimeError::assertion("a"), "ExecutionFailedWithError" ; "assertion")]
    #[test_case(RuntimeError::generic("g"), "ExecutionFailedWithError" ; "generic")]
    #[test_case(RuntimeError::ambiguous("m"), "ExecutionFailedWithError" ; "ambiguous")]
    #[test_case(RuntimeError::compromised("c"), "ExecutionCompromised" ; "compromised")]
    #[test_case(RuntimeError::pending("p"), "ImplementationPending" ; "pending")]
    fn test_from_error(error: RuntimeError, expected: &str) {
        assert_eq!(Outcome::from_error(error).type_name(), expected);
    }
}
