use chrono::{DateTime, Utc};
use shared::{
    domain::{PublishUrl, Role, SessionHandle, SessionPhase},
    error::SessionFailure,
};

/// Everything the panel knows about its one session. Only the controller
/// mutates it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) role: Option<Role>,
    pub(crate) url: Option<PublishUrl>,
    pub(crate) phase: SessionPhase,
    pub(crate) last_error: Option<SessionFailure>,
    pub(crate) handle: Option<SessionHandle>,
    pub(crate) stop_requested: bool,
    pub(crate) active_since: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn url(&self) -> Option<&PublishUrl> {
        self.url.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&SessionFailure> {
        self.last_error.as_ref()
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle
    }

    /// A stop arrived while the connect call was still in flight.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn active_since(&self) -> Option<DateTime<Utc>> {
        self.active_since
    }

    pub fn is_ready_to_start(&self) -> bool {
        self.phase == SessionPhase::Idle && self.role.is_some() && self.url.is_some()
    }

    pub(crate) fn settle_idle(&mut self) {
        self.phase = SessionPhase::Idle;
        self.handle = None;
        self.stop_requested = false;
        self.active_since = None;
    }
}
