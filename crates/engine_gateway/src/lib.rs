use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use shared::domain::{PublishUrl, Role, SessionHandle};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod loopback;
mod transport_gateway;

pub use loopback::{LoopbackConfig, LoopbackTransport};
pub use transport_gateway::TransportGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub url: PublishUrl,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Transport(String),
}

/// Callbacks from the engine, tagged with the handle they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ConnectResult {
        handle: SessionHandle,
        result: Result<(), EngineError>,
    },
    LeaveAck {
        handle: SessionHandle,
        result: Result<(), EngineError>,
    },
    Disconnected {
        handle: SessionHandle,
        reason: String,
    },
}

impl EngineEvent {
    pub fn handle(&self) -> SessionHandle {
        match self {
            EngineEvent::ConnectResult { handle, .. }
            | EngineEvent::LeaveAck { handle, .. }
            | EngineEvent::Disconnected { handle, .. } => *handle,
        }
    }
}

/// Non-blocking engine contract. Implementations never report results by
/// return value; every outcome arrives later as an [`EngineEvent`] on the
/// queue the controller drains.
pub trait EngineGateway: Send + Sync {
    fn connect_and_publish(&self, handle: SessionHandle, url: PublishUrl, role: Role);
    /// Leaving an unknown or already-left handle acknowledges with `Ok`.
    fn leave(&self, handle: SessionHandle);
}

#[async_trait]
pub trait StreamingLink: Send + Sync {
    async fn leave(&self) -> anyhow::Result<()>;
    fn subscribe_events(&self) -> broadcast::Receiver<LinkEvent>;
}

#[async_trait]
pub trait StreamingTransport: Send + Sync {
    async fn connect(&self, options: StreamOptions) -> anyhow::Result<Arc<dyn StreamingLink>>;
}

pub struct MissingTransport;

#[async_trait]
impl StreamingTransport for MissingTransport {
    async fn connect(&self, _options: StreamOptions) -> anyhow::Result<Arc<dyn StreamingLink>> {
        Err(anyhow!("streaming engine is unavailable"))
    }
}
