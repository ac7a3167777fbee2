//! Panel-facing events and error modeling.

use session_core::SessionError;
use shared::error::SessionFailure;

use crate::controller::presenter::PanelView;

#[derive(Debug, Clone)]
pub enum UiEvent {
    ViewChanged(PanelView),
    Info(String),
    Error(UiError),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Transition,
    Engine,
    Network,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    RoleSelection,
    PublishUrl,
    Start,
    Session,
    CommandInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_session_error(context: UiErrorContext, err: &SessionError) -> Self {
        let category = if err.is_input_error() {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Transition
        };

        Self {
            category,
            context,
            message: err.to_string(),
        }
    }

    pub fn from_failure(failure: &SessionFailure) -> Self {
        let reason = failure.reason();
        let (category, message) = if failure.is_network_lost() {
            (
                UiErrorCategory::Network,
                format!("Connection lost ({reason}); press start to reconnect."),
            )
        } else {
            (
                UiErrorCategory::Engine,
                format!("Streaming engine error: {reason}"),
            )
        };

        Self {
            category,
            context: UiErrorContext::Session,
            message,
        }
    }

    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Command,
            context,
            message: message.into(),
        }
    }

    /// Transition errors come from a control being driven in the wrong phase;
    /// they are logged, not shown.
    pub fn is_user_visible(&self) -> bool {
        self.category != UiErrorCategory::Transition
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
