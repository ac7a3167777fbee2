use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::domain::{PublishUrl, Role, SessionHandle};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    EngineError, EngineEvent, EngineGateway, LinkEvent, StreamOptions, StreamingLink,
    StreamingTransport,
};

struct ActiveLink {
    link: Arc<dyn StreamingLink>,
    event_task: JoinHandle<()>,
}

type LinkTable = Arc<Mutex<HashMap<SessionHandle, ActiveLink>>>;

/// Drives an async [`StreamingTransport`] and marshals every result onto a
/// single event queue, so the consumer sees per-handle callbacks in order.
///
/// Must be used from within a Tokio runtime.
pub struct TransportGateway {
    transport: Arc<dyn StreamingTransport>,
    events: mpsc::UnboundedSender<EngineEvent>,
    call_timeout: Duration,
    links: LinkTable,
}

impl TransportGateway {
    pub fn new(
        transport: Arc<dyn StreamingTransport>,
        call_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let gateway = Self {
            transport,
            events,
            call_timeout,
            links: Arc::new(Mutex::new(HashMap::new())),
        };
        (gateway, events_rx)
    }

    pub async fn live_handles(&self) -> Vec<SessionHandle> {
        let mut handles = self.links.lock().await.keys().copied().collect::<Vec<_>>();
        handles.sort();
        handles
    }

    /// Leaves every link still held without reporting acks. Used at panel
    /// teardown once the controller has stopped listening.
    pub async fn close_all(&self) {
        let drained = {
            let mut links = self.links.lock().await;
            links.drain().collect::<Vec<_>>()
        };

        for (handle, active) in drained {
            active.event_task.abort();
            if let Err(err) = active.link.leave().await {
                warn!("engine: leave during teardown failed handle={handle} error={err}");
            }
        }
    }
}

impl EngineGateway for TransportGateway {
    fn connect_and_publish(&self, handle: SessionHandle, url: PublishUrl, role: Role) {
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let links = Arc::clone(&self.links);
        let call_timeout = self.call_timeout;

        tokio::spawn(async move {
            info!("engine: connecting handle={handle} role={} url={url}", role.label());
            let connect = transport.connect(StreamOptions { url, role });
            let link = match tokio::time::timeout(call_timeout, connect).await {
                Ok(Ok(link)) => link,
                Ok(Err(err)) => {
                    let _ = events.send(EngineEvent::ConnectResult {
                        handle,
                        result: Err(EngineError::Transport(err.to_string())),
                    });
                    return;
                }
                Err(_) => {
                    let _ = events.send(EngineEvent::ConnectResult {
                        handle,
                        result: Err(EngineError::Timeout(call_timeout)),
                    });
                    return;
                }
            };

            // The table lock is held until the result is queued: a leave always
            // finds the link, and the forwarder cannot report a disconnect
            // ahead of the connect result.
            let link_events = link.subscribe_events();
            let mut table = links.lock().await;
            let event_task = tokio::spawn(forward_link_events(
                handle,
                link_events,
                events.clone(),
                Arc::clone(&links),
            ));
            table.insert(handle, ActiveLink { link, event_task });
            let _ = events.send(EngineEvent::ConnectResult {
                handle,
                result: Ok(()),
            });
        });
    }

    fn leave(&self, handle: SessionHandle) {
        let events = self.events.clone();
        let links = Arc::clone(&self.links);
        let call_timeout = self.call_timeout;

        tokio::spawn(async move {
            let active = links.lock().await.remove(&handle);
            let result = match active {
                Some(active) => {
                    active.event_task.abort();
                    match tokio::time::timeout(call_timeout, active.link.leave()).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(EngineError::Transport(err.to_string())),
                        Err(_) => Err(EngineError::Timeout(call_timeout)),
                    }
                }
                None => {
                    debug!("engine: leave on released handle={handle}");
                    Ok(())
                }
            };
            let _ = events.send(EngineEvent::LeaveAck { handle, result });
        });
    }
}

async fn forward_link_events(
    handle: SessionHandle,
    mut link_events: broadcast::Receiver<LinkEvent>,
    events: mpsc::UnboundedSender<EngineEvent>,
    links: LinkTable,
) {
    loop {
        match link_events.recv().await {
            Ok(LinkEvent::Disconnected { reason }) => {
                links.lock().await.remove(&handle);
                warn!("engine: link lost handle={handle} reason={reason}");
                let _ = events.send(EngineEvent::Disconnected { handle, reason });
                return;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("engine: link event stream lagged handle={handle} skipped={skipped}");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_gateway_tests.rs"]
mod tests;
