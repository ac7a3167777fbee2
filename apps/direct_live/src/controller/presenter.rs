//! Translates panel taps into controller calls and controller state into
//! what the panel widgets show.

use chrono::{DateTime, Utc};
use engine_gateway::EngineEvent;
use serde::Serialize;
use session_core::{SessionController, SessionError, SessionState};
use shared::{
    domain::{Role, SessionPhase},
    protocol::StatusUpdate,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub phase: SessionPhase,
    pub selected_role: Option<Role>,
    pub url_text: String,
    pub url_editable: bool,
    pub role_selectors_enabled: bool,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_error: Option<String>,
}

impl PanelView {
    pub fn render(state: &SessionState, url_text: &str, input_error: Option<&str>) -> Self {
        let phase = state.phase();
        let idle = phase == SessionPhase::Idle;

        Self {
            phase,
            selected_role: state.role(),
            url_text: url_text.to_string(),
            url_editable: idle,
            role_selectors_enabled: idle,
            start_enabled: state.is_ready_to_start() && field_shows_accepted_url(state, url_text),
            stop_enabled: phase.is_live(),
            status_label: status_label(state),
            input_error: input_error.map(str::to_string),
        }
    }

    pub fn to_text(&self) -> String {
        let role = self.selected_role.map_or("none", Role::label);
        let url = if self.url_text.is_empty() {
            "-"
        } else {
            self.url_text.as_str()
        };
        let mut line = format!(
            "[{}] role={} url={} start={} stop={} | {}",
            self.phase,
            role,
            url,
            on_off(self.start_enabled),
            on_off(self.stop_enabled),
            self.status_label
        );
        if let Some(err) = &self.input_error {
            line.push_str(&format!(" | input error: {err}"));
        }
        line
    }
}

fn field_shows_accepted_url(state: &SessionState, url_text: &str) -> bool {
    state
        .url()
        .map_or(url_text.is_empty(), |url| url.as_str() == url_text)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn status_label(state: &SessionState) -> String {
    match state.phase() {
        SessionPhase::Idle => match state.last_error() {
            Some(failure) => format!("Failed: {failure}"),
            None => "Idle".to_string(),
        },
        SessionPhase::Connecting => "Connecting…".to_string(),
        SessionPhase::Active => match state.active_since() {
            Some(since) => format!("Live since {}", clock(since)),
            None => "Live".to_string(),
        },
        SessionPhase::Stopping => "Stopping…".to_string(),
    }
}

fn clock(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S UTC").to_string()
}

pub struct PanelPresenter {
    controller: SessionController,
    url_text: String,
    input_error: Option<String>,
}

impl PanelPresenter {
    pub fn new(controller: SessionController) -> Self {
        let url_text = controller
            .state()
            .url()
            .map(|url| url.as_str().to_string())
            .unwrap_or_default();
        Self {
            controller,
            url_text,
            input_error: None,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn view(&self) -> PanelView {
        PanelView::render(
            self.controller.state(),
            &self.url_text,
            self.input_error.as_deref(),
        )
    }

    pub fn on_role_tapped(&mut self, role: Role) -> Result<(), SessionError> {
        let result = self.controller.select_role(role);
        self.note_input(&result);
        result
    }

    /// The field keeps showing what was typed even when the controller rejects
    /// it. Start stays disabled until the field and the accepted URL agree.
    pub fn on_url_changed(&mut self, text: &str) -> Result<(), SessionError> {
        let result = self.controller.set_url(text);
        if self.controller.phase() == SessionPhase::Idle {
            self.url_text = text.trim().to_string();
        }
        self.note_input(&result);
        result
    }

    pub fn on_start_tapped(&mut self) -> Result<(), SessionError> {
        let result = self
            .resubmit_url_field()
            .and_then(|()| self.controller.start().map(|_| ()));
        self.note_input(&result);
        result
    }

    pub fn on_stop_tapped(&mut self) {
        self.controller.stop();
    }

    pub fn on_engine_event(&mut self, event: EngineEvent) {
        self.controller.handle_engine_event(event);
    }

    pub fn on_status_changed(&mut self, update: &StatusUpdate) -> PanelView {
        debug!(status = ?update.status, handle = ?update.handle, "panel: status changed");
        let phase = self.controller.phase();
        if update.status.resting_phase() != phase {
            debug!("panel: status lags controller phase {phase}; rendering current state");
        }
        self.view()
    }

    pub fn teardown(&mut self) {
        self.controller.shutdown();
    }

    /// Start must never publish to a URL the field no longer shows, so a field
    /// holding rejected text goes back through `set_url` first.
    fn resubmit_url_field(&mut self) -> Result<(), SessionError> {
        if self.controller.phase() != SessionPhase::Idle
            || field_shows_accepted_url(self.controller.state(), &self.url_text)
        {
            return Ok(());
        }
        self.controller.set_url(&self.url_text)
    }

    fn note_input(&mut self, result: &Result<(), SessionError>) {
        match result {
            Ok(()) => self.input_error = None,
            Err(err) if err.is_input_error() => self.input_error = Some(err.to_string()),
            Err(_) => {}
        }
    }
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
