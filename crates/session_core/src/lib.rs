use std::sync::Arc;

use chrono::Utc;
use engine_gateway::{EngineError, EngineEvent, EngineGateway};
use shared::{
    domain::{PublishUrl, Role, SessionHandle, SessionPhase, UrlPolicy},
    error::SessionFailure,
    protocol::{SessionStatus, StatusUpdate},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub mod error;
mod state;

pub use error::SessionError;
pub use state::SessionState;

/// Single-session state machine between panel intents and the streaming
/// engine.
///
/// Every method runs on the panel's one execution context; engine results are
/// fed back through [`SessionController::handle_engine_event`] on that same
/// context, so no locking is involved. Status changes go out on the
/// single-consumer stream returned by [`SessionController::new`].
pub struct SessionController {
    gateway: Arc<dyn EngineGateway>,
    policy: UrlPolicy,
    state: SessionState,
    last_handle: u64,
    status_tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn EngineGateway>,
        policy: UrlPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let controller = Self {
            gateway,
            policy,
            state: SessionState::default(),
            last_handle: 0,
            status_tx,
        };
        (controller, status_rx)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn url_policy(&self) -> &UrlPolicy {
        &self.policy
    }

    pub fn select_role(&mut self, role: Role) -> Result<(), SessionError> {
        self.require_idle("select_role")?;
        self.state.role = Some(role);
        info!("session: role selected role={}", role.label());
        Ok(())
    }

    pub fn set_url(&mut self, raw: &str) -> Result<(), SessionError> {
        self.require_idle("set_url")?;
        let url = PublishUrl::parse(raw, &self.policy)?;
        info!("session: publish url set url={url}");
        self.state.url = Some(url);
        Ok(())
    }

    /// Issues the connect and returns immediately; the outcome arrives later as
    /// a status update.
    pub fn start(&mut self) -> Result<SessionHandle, SessionError> {
        if self.state.phase != SessionPhase::Idle {
            return Err(SessionError::AlreadyActive {
                phase: self.state.phase,
            });
        }
        let role = self.state.role.ok_or(SessionError::MissingRole)?;
        let url = self.state.url.clone().ok_or(SessionError::MissingUrl)?;

        self.last_handle += 1;
        let handle = SessionHandle(self.last_handle);
        self.state.phase = SessionPhase::Connecting;
        self.state.handle = Some(handle);
        self.state.stop_requested = false;
        self.state.last_error = None;

        info!(
            "session: starting handle={handle} role={} url={url}",
            role.label()
        );
        self.emit(SessionStatus::Connecting, Some(handle));
        self.gateway.connect_and_publish(handle, url, role);
        Ok(handle)
    }

    /// Idle and Stopping are no-ops. A stop during Connecting is queued until
    /// the connect resolves, then chained into a leave.
    pub fn stop(&mut self) {
        let handle = self.state.handle;
        match (self.state.phase, handle) {
            (SessionPhase::Idle | SessionPhase::Stopping, _) => {
                debug!("session: stop ignored phase={}", self.state.phase);
            }
            (SessionPhase::Connecting, Some(handle)) => {
                info!("session: stop queued until connect resolves handle={handle}");
                self.state.phase = SessionPhase::Stopping;
                self.state.stop_requested = true;
                self.emit(SessionStatus::Stopping, Some(handle));
            }
            (SessionPhase::Active, Some(handle)) => {
                info!("session: stopping handle={handle}");
                self.state.phase = SessionPhase::Stopping;
                self.emit(SessionStatus::Stopping, Some(handle));
                self.gateway.leave(handle);
            }
            (phase, None) => {
                warn!("session: phase={phase} without a handle; resetting to idle");
                self.state.settle_idle();
                self.emit(SessionStatus::Idle, None);
            }
        }
    }

    /// Panel teardown. Releases whatever session is still live.
    pub fn shutdown(&mut self) {
        if self.state.phase.is_live() {
            info!("session: shutting down phase={}", self.state.phase);
        }
        self.stop();
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        let handle = event.handle();
        if self.state.handle != Some(handle) {
            debug!(
                "session: dropping stale engine event handle={handle} current={:?}",
                self.state.handle
            );
            return;
        }

        match event {
            EngineEvent::ConnectResult { handle, result } => self.on_connect_result(handle, result),
            EngineEvent::LeaveAck { handle, result } => self.on_leave_ack(handle, result),
            EngineEvent::Disconnected { handle, reason } => self.on_disconnected(handle, reason),
        }
    }

    fn on_connect_result(&mut self, handle: SessionHandle, result: Result<(), EngineError>) {
        match (self.state.phase, result) {
            (SessionPhase::Connecting, Ok(())) => {
                let now = Utc::now();
                self.state.phase = SessionPhase::Active;
                self.state.active_since = Some(now);
                info!("session: active handle={handle}");
                self.emit(SessionStatus::Active, Some(handle));
            }
            (SessionPhase::Connecting, Err(err)) => {
                self.fail(handle, SessionFailure::Engine(err.to_string()));
            }
            (SessionPhase::Stopping, result) if self.state.stop_requested => {
                if let Err(err) = result {
                    debug!("session: connect failed after stop was requested handle={handle} error={err}");
                }
                self.state.stop_requested = false;
                self.gateway.leave(handle);
            }
            (phase, _) => {
                debug!("session: ignoring connect result handle={handle} phase={phase}");
            }
        }
    }

    fn on_leave_ack(&mut self, handle: SessionHandle, result: Result<(), EngineError>) {
        if self.state.phase != SessionPhase::Stopping {
            debug!(
                "session: ignoring leave ack handle={handle} phase={}",
                self.state.phase
            );
            return;
        }

        match result {
            Ok(()) => {
                self.state.settle_idle();
                self.state.last_error = None;
                info!("session: stopped handle={handle}");
                self.emit(SessionStatus::Idle, Some(handle));
            }
            Err(err) => self.fail(handle, SessionFailure::Engine(err.to_string())),
        }
    }

    fn on_disconnected(&mut self, handle: SessionHandle, reason: String) {
        match self.state.phase {
            SessionPhase::Connecting | SessionPhase::Active => {
                self.fail(handle, SessionFailure::NetworkLost(reason));
            }
            phase => {
                debug!("session: ignoring disconnect handle={handle} phase={phase}");
            }
        }
    }

    fn fail(&mut self, handle: SessionHandle, failure: SessionFailure) {
        warn!("session: failed handle={handle} error={failure}");
        self.state.settle_idle();
        self.state.last_error = Some(failure.clone());
        self.emit(SessionStatus::Failed(failure), Some(handle));
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.state.phase == SessionPhase::Idle {
            return Ok(());
        }
        let err = SessionError::InvalidTransition {
            operation,
            phase: self.state.phase,
        };
        warn!("session: {err}");
        Err(err)
    }

    fn emit(&self, status: SessionStatus, handle: Option<SessionHandle>) {
        let _ = self.status_tx.send(StatusUpdate::new(status, handle));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
