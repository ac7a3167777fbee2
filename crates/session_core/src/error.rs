use shared::{domain::SessionPhase, error::UrlRejection};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{operation} is not allowed while the session is {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },
    #[error("{0}")]
    InvalidUrl(#[from] UrlRejection),
    #[error("select a role before starting")]
    MissingRole,
    #[error("enter a publish url before starting")]
    MissingUrl,
    #[error("a session is already {phase}")]
    AlreadyActive { phase: SessionPhase },
}

impl SessionError {
    /// Errors caused by what the user typed or picked, as opposed to a
    /// control being driven in the wrong phase.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidUrl(_) | SessionError::MissingRole | SessionError::MissingUrl
        )
    }
}
