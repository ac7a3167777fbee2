//! In-process stand-in for a CDN streaming engine.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::{LinkEvent, StreamOptions, StreamingLink, StreamingTransport};

#[derive(Debug, Clone, Default)]
pub struct LoopbackConfig {
    pub connect_latency: Duration,
    /// When set, every connect attempt fails with this reason.
    pub fail_reason: Option<String>,
}

pub struct LoopbackTransport {
    config: LoopbackConfig,
    connect_calls: AtomicU32,
    leave_calls: Arc<AtomicU32>,
    last_link: Mutex<Option<Arc<LoopbackLink>>>,
}

impl LoopbackTransport {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            connect_calls: AtomicU32::new(0),
            leave_calls: Arc::new(AtomicU32::new(0)),
            last_link: Mutex::new(None),
        }
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn leave_calls(&self) -> u32 {
        self.leave_calls.load(Ordering::SeqCst)
    }

    pub async fn last_options(&self) -> Option<StreamOptions> {
        self.last_link
            .lock()
            .await
            .as_ref()
            .map(|link| link.options.clone())
    }

    /// Drops the most recent link as if the network went away. Returns
    /// `false` when there is no live link to drop, including a link nobody
    /// has subscribed to yet.
    pub async fn simulate_network_loss(&self, reason: impl Into<String>) -> bool {
        let guard = self.last_link.lock().await;
        let Some(link) = guard.as_ref() else {
            return false;
        };
        if link.events_tx.receiver_count() == 0 {
            return false;
        }
        if link.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let _ = link.events_tx.send(LinkEvent::Disconnected {
            reason: reason.into(),
        });
        true
    }
}

#[async_trait]
impl StreamingTransport for LoopbackTransport {
    async fn connect(&self, options: StreamOptions) -> anyhow::Result<Arc<dyn StreamingLink>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.connect_latency.is_zero() {
            tokio::time::sleep(self.config.connect_latency).await;
        }
        if let Some(reason) = &self.config.fail_reason {
            return Err(anyhow!("{reason}"));
        }

        let direction = if options.role.publishes() {
            "pushing to"
        } else {
            "pulling from"
        };
        info!("loopback: {} {direction} {}", options.role.label(), options.url);
        let link = Arc::new(LoopbackLink {
            options,
            events_tx: broadcast::channel(8).0,
            closed: AtomicBool::new(false),
            leave_calls: Arc::clone(&self.leave_calls),
        });
        self.last_link.lock().await.replace(Arc::clone(&link));
        Ok(link)
    }
}

pub struct LoopbackLink {
    options: StreamOptions,
    events_tx: broadcast::Sender<LinkEvent>,
    closed: AtomicBool,
    leave_calls: Arc<AtomicU32>,
}

#[async_trait]
impl StreamingLink for LoopbackLink {
    async fn leave(&self) -> anyhow::Result<()> {
        self.leave_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events_tx.subscribe()
    }
}
