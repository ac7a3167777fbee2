use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{SessionHandle, SessionPhase},
    error::SessionFailure,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Active,
    Stopping,
    Failed(SessionFailure),
}

impl SessionStatus {
    /// The phase the session rests in after this notification.
    pub fn resting_phase(&self) -> SessionPhase {
        match self {
            SessionStatus::Idle | SessionStatus::Failed(_) => SessionPhase::Idle,
            SessionStatus::Connecting => SessionPhase::Connecting,
            SessionStatus::Active => SessionPhase::Active,
            SessionStatus::Stopping => SessionPhase::Stopping,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(flatten)]
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<SessionHandle>,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(status: SessionStatus, handle: Option<SessionHandle>) -> Self {
        Self {
            status,
            handle,
            at: Utc::now(),
        }
    }
}
