use std::fmt;

use crate::round::RoundPhase;

/// Errors surfaced by the round engine and the score store.
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    /// Operation attempted on a round in the wrong phase (pump after pop, empty bank, ...).
    InvalidState { op: &'static str, phase: RoundPhase },
    /// Rejected at the store boundary; nothing was mutated.
    Validation { msg: String },
    /// Persisted record could not be decoded. Recovered locally by starting empty.
    CorruptState { msg: String },
}

impl GameError {
    pub fn invalid_state(op: &'static str, phase: RoundPhase) -> Self {
        GameError::InvalidState { op, phase }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        GameError::Validation { msg: msg.into() }
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        GameError::CorruptState { msg: msg.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GameError::InvalidState { .. } => "invalid_state",
            GameError::Validation { .. } => "validation",
            GameError::CorruptState { .. } => "corrupt_state",
        }
    }
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::InvalidState { op, phase } => {
                write!(f, "cannot {} while round is {}", op, phase.as_str())
            }
            GameError::Validation { msg } => write!(f, "invalid score event: {}", msg),
            GameError::CorruptState { msg } => write!(f, "corrupt persisted state: {}", msg),
        }
    }
}

impl std::error::Error for GameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_operation_and_phase() {
        let err = GameError::invalid_state("bank", RoundPhase::Popped);
        assert_eq!(err.to_string(), "cannot bank while round is popped");
        assert_eq!(err.kind(), "invalid_state");
    }

    #[test]
    fn test_works_with_anyhow() {
        let err: anyhow::Error = GameError::validation("missing participant").into();
        assert!(err.to_string().contains("missing participant"));
    }
}
