use thiserror::Error;

/// Failures surfaced by engine entry points. Ineligible or duplicate player
/// actions are absorbed as no-ops and never reach this enum.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid room configuration: {0}")]
    ConfigInvalid(String),
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("no questions available")]
    QuestionExhausted,
    #[error("role assignment did not converge after {0} re-rolls")]
    AssignmentDiverged(usize),
}

impl EngineError {
    /// Stable code for the wire protocol's error messages.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ConfigInvalid(_) => "CONFIG_INVALID",
            EngineError::RoomNotFound => "ROOM_NOT_FOUND",
            EngineError::RoomFull => "ROOM_FULL",
            EngineError::QuestionExhausted => "QUESTION_EXHAUSTED",
            EngineError::AssignmentDiverged(_) => "ASSIGNMENT_DIVERGED",
        }
    }
}
