use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("publish url is empty")]
    Empty,
    #[error("publish url is malformed: {0}")]
    Malformed(String),
    #[error("publish url scheme '{0}' is not supported")]
    UnsupportedScheme(String),
    #[error("publish url has no host")]
    MissingHost,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}' (expected local or remote)")]
pub struct UnknownRole(pub String);

/// Why a session attempt ended without the user asking for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SessionFailure {
    #[error("{0}")]
    Engine(String),
    #[error("network lost: {0}")]
    NetworkLost(String),
}

impl SessionFailure {
    pub fn reason(&self) -> &str {
        match self {
            SessionFailure::Engine(reason) | SessionFailure::NetworkLost(reason) => reason,
        }
    }

    pub fn is_network_lost(&self) -> bool {
        matches!(self, SessionFailure::NetworkLost(_))
    }
}
