use super::*;
use std::{sync::Mutex, time::Duration};

use engine_gateway::{LoopbackConfig, LoopbackTransport, TransportGateway};

#[derive(Debug, Clone, PartialEq, Eq)]
enum GatewayCall {
    Connect {
        handle: SessionHandle,
        url: String,
        role: Role,
    },
    Leave(SessionHandle),
}

#[derive(Default)]
struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
}

impl RecordingGateway {
    fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn leave_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::Leave(_)))
            .count()
    }

    fn connect_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::Connect { .. }))
            .count()
    }
}

impl EngineGateway for RecordingGateway {
    fn connect_and_publish(&self, handle: SessionHandle, url: PublishUrl, role: Role) {
        self.calls
            .lock()
            .expect("calls lock")
            .push(GatewayCall::Connect {
                handle,
                url: url.as_str().to_string(),
                role,
            });
    }

    fn leave(&self, handle: SessionHandle) {
        self.calls
            .lock()
            .expect("calls lock")
            .push(GatewayCall::Leave(handle));
    }
}

struct Harness {
    gateway: Arc<RecordingGateway>,
    controller: SessionController,
    statuses: mpsc::UnboundedReceiver<StatusUpdate>,
}

impl Harness {
    fn new() -> Self {
        let gateway = Arc::new(RecordingGateway::default());
        let (controller, statuses) = SessionController::new(gateway.clone(), UrlPolicy::default());
        Self {
            gateway,
            controller,
            statuses,
        }
    }

    fn ready() -> Self {
        let mut harness = Self::new();
        harness
            .controller
            .select_role(Role::LocalBroadcaster)
            .expect("role");
        harness
            .controller
            .set_url("rtmp://example.com/live")
            .expect("url");
        harness
    }

    fn drain(&mut self) -> Vec<SessionStatus> {
        let mut seen = Vec::new();
        while let Ok(update) = self.statuses.try_recv() {
            seen.push(update.status);
        }
        seen
    }

    fn connect_ok(&mut self, handle: SessionHandle) {
        self.controller
            .handle_engine_event(EngineEvent::ConnectResult {
                handle,
                result: Ok(()),
            });
    }

    fn leave_ok(&mut self, handle: SessionHandle) {
        self.controller
            .handle_engine_event(EngineEvent::LeaveAck {
                handle,
                result: Ok(()),
            });
    }
}

#[test]
fn last_role_and_url_win_before_start() {
    let mut harness = Harness::new();
    harness
        .controller
        .select_role(Role::RemoteViewer)
        .expect("role");
    harness
        .controller
        .select_role(Role::LocalBroadcaster)
        .expect("role");
    harness
        .controller
        .set_url("rtmp://first.example.com/live")
        .expect("url");
    harness
        .controller
        .set_url(" rtmp://second.example.com/live ")
        .expect("url");

    let handle = harness.controller.start().expect("start");

    assert_eq!(
        harness.gateway.calls(),
        vec![GatewayCall::Connect {
            handle,
            url: "rtmp://second.example.com/live".to_string(),
            role: Role::LocalBroadcaster,
        }]
    );
}

#[test]
fn start_without_role_makes_no_engine_call() {
    let mut harness = Harness::new();
    harness
        .controller
        .set_url("rtmp://example.com/live")
        .expect("url");

    assert_eq!(harness.controller.start(), Err(SessionError::MissingRole));
    assert_eq!(harness.gateway.connect_count(), 0);
    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    assert!(harness.drain().is_empty());
}

#[test]
fn start_without_url_makes_no_engine_call() {
    let mut harness = Harness::new();
    harness
        .controller
        .select_role(Role::RemoteViewer)
        .expect("role");

    assert_eq!(harness.controller.start(), Err(SessionError::MissingUrl));
    assert_eq!(harness.gateway.connect_count(), 0);
    assert!(!harness.controller.state().is_ready_to_start());
}

#[test]
fn rejected_url_keeps_previous_value() {
    let mut harness = Harness::ready();

    let err = harness
        .controller
        .set_url("not a url")
        .expect_err("malformed url");
    assert!(matches!(err, SessionError::InvalidUrl(_)));
    assert!(err.is_input_error());

    assert!(matches!(
        harness.controller.set_url("   "),
        Err(SessionError::InvalidUrl(shared::error::UrlRejection::Empty))
    ));
    assert_eq!(
        harness.controller.state().url().map(PublishUrl::as_str),
        Some("rtmp://example.com/live")
    );
}

#[test]
fn engine_success_reaches_active_with_one_active_status() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    assert_eq!(harness.controller.phase(), SessionPhase::Connecting);

    harness.connect_ok(handle);

    assert_eq!(harness.controller.phase(), SessionPhase::Active);
    assert!(harness.controller.state().active_since().is_some());
    let statuses = harness.drain();
    assert_eq!(
        statuses,
        vec![SessionStatus::Connecting, SessionStatus::Active]
    );
}

#[test]
fn duplicate_start_is_rejected_while_live() {
    let mut harness = Harness::ready();
    harness.controller.start().expect("start");

    assert_eq!(
        harness.controller.start(),
        Err(SessionError::AlreadyActive {
            phase: SessionPhase::Connecting,
        })
    );
    assert_eq!(harness.gateway.connect_count(), 1);
}

#[test]
fn role_and_url_are_frozen_while_live() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);

    assert_eq!(
        harness.controller.select_role(Role::RemoteViewer),
        Err(SessionError::InvalidTransition {
            operation: "select_role",
            phase: SessionPhase::Active,
        })
    );
    assert!(matches!(
        harness.controller.set_url("rtmp://other.example.com/live"),
        Err(SessionError::InvalidTransition { .. })
    ));
    assert_eq!(
        harness.controller.state().role(),
        Some(Role::LocalBroadcaster)
    );
    assert_eq!(
        harness.controller.state().url().map(PublishUrl::as_str),
        Some("rtmp://example.com/live")
    );
}

#[test]
fn stop_twice_from_idle_is_silent() {
    let mut harness = Harness::ready();

    harness.controller.stop();
    harness.controller.stop();

    assert!(harness.gateway.calls().is_empty());
    assert!(harness.drain().is_empty());
    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
}

#[test]
fn engine_failure_returns_to_idle_and_keeps_inputs_for_retry() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");

    harness
        .controller
        .handle_engine_event(EngineEvent::ConnectResult {
            handle,
            result: Err(EngineError::Transport("timeout".to_string())),
        });

    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    let failed = harness
        .drain()
        .into_iter()
        .filter(|status| matches!(status, SessionStatus::Failed(_)))
        .collect::<Vec<_>>();
    assert_eq!(
        failed,
        vec![SessionStatus::Failed(SessionFailure::Engine(
            "timeout".to_string()
        ))]
    );

    let state = harness.controller.state();
    assert_eq!(state.role(), Some(Role::LocalBroadcaster));
    assert_eq!(
        state.url().map(PublishUrl::as_str),
        Some("rtmp://example.com/live")
    );
    assert_eq!(
        state.last_error(),
        Some(&SessionFailure::Engine("timeout".to_string()))
    );
    assert!(state.is_ready_to_start());
}

#[test]
fn stop_during_connect_chains_leave_and_never_goes_active() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");

    harness.controller.stop();
    assert_eq!(harness.controller.phase(), SessionPhase::Stopping);
    assert!(harness.controller.state().stop_requested());
    assert_eq!(harness.gateway.leave_count(), 0);

    harness.connect_ok(handle);
    assert_eq!(harness.controller.phase(), SessionPhase::Stopping);
    assert_eq!(
        harness.gateway.calls().last(),
        Some(&GatewayCall::Leave(handle))
    );

    harness.leave_ok(handle);
    assert_eq!(harness.controller.phase(), SessionPhase::Idle);

    let statuses = harness.drain();
    assert!(!statuses.contains(&SessionStatus::Active));
    assert_eq!(
        statuses,
        vec![
            SessionStatus::Connecting,
            SessionStatus::Stopping,
            SessionStatus::Idle
        ]
    );
}

#[test]
fn stop_during_connect_still_leaves_when_connect_fails() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.controller.stop();

    harness
        .controller
        .handle_engine_event(EngineEvent::ConnectResult {
            handle,
            result: Err(EngineError::Timeout(Duration::from_secs(10))),
        });
    assert_eq!(harness.gateway.leave_count(), 1);

    harness.leave_ok(handle);
    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    assert!(harness.controller.state().last_error().is_none());
}

#[test]
fn stop_from_active_waits_for_ack() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);
    harness.drain();

    harness.controller.stop();
    assert_eq!(harness.controller.phase(), SessionPhase::Stopping);
    assert_eq!(harness.gateway.leave_count(), 1);

    // A second tap while the leave is in flight does nothing.
    harness.controller.stop();
    assert_eq!(harness.gateway.leave_count(), 1);

    harness.leave_ok(handle);
    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    assert_eq!(harness.controller.state().handle(), None);
    assert_eq!(
        harness.drain(),
        vec![SessionStatus::Stopping, SessionStatus::Idle]
    );
}

#[test]
fn disconnect_while_active_reports_network_lost() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);
    harness.drain();

    harness
        .controller
        .handle_engine_event(EngineEvent::Disconnected {
            handle,
            reason: "uplink reset".to_string(),
        });

    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    let lost = SessionFailure::NetworkLost("uplink reset".to_string());
    assert_eq!(harness.controller.state().last_error(), Some(&lost));
    assert_eq!(harness.drain(), vec![SessionStatus::Failed(lost)]);
}

#[test]
fn disconnect_while_connecting_reports_network_lost() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");

    harness
        .controller
        .handle_engine_event(EngineEvent::Disconnected {
            handle,
            reason: "dns".to_string(),
        });

    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    assert!(harness
        .controller
        .state()
        .last_error()
        .is_some_and(SessionFailure::is_network_lost));
}

#[test]
fn disconnect_for_other_handle_is_ignored() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);
    harness.drain();

    harness
        .controller
        .handle_engine_event(EngineEvent::Disconnected {
            handle: SessionHandle(handle.0 + 100),
            reason: "stale".to_string(),
        });

    assert_eq!(harness.controller.phase(), SessionPhase::Active);
    assert!(harness.drain().is_empty());
}

#[test]
fn disconnect_while_stopping_is_ignored() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);
    harness.controller.stop();
    harness.drain();

    harness
        .controller
        .handle_engine_event(EngineEvent::Disconnected {
            handle,
            reason: "late".to_string(),
        });
    assert_eq!(harness.controller.phase(), SessionPhase::Stopping);
    assert!(harness.drain().is_empty());

    harness.leave_ok(handle);
    assert_eq!(harness.drain(), vec![SessionStatus::Idle]);
}

#[test]
fn callbacks_for_superseded_handle_are_dropped_after_retry() {
    let mut harness = Harness::ready();
    let first = harness.controller.start().expect("start");
    harness
        .controller
        .handle_engine_event(EngineEvent::ConnectResult {
            handle: first,
            result: Err(EngineError::Transport("refused".to_string())),
        });

    let second = harness.controller.start().expect("retry");
    assert_ne!(first, second);
    harness.drain();

    // A late success for the first attempt must not promote the retry.
    harness.connect_ok(first);
    assert_eq!(harness.controller.phase(), SessionPhase::Connecting);
    assert!(harness.drain().is_empty());

    harness.connect_ok(second);
    assert_eq!(harness.controller.phase(), SessionPhase::Active);
    assert_eq!(harness.controller.state().handle(), Some(second));
}

#[test]
fn leave_failure_still_settles_idle() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);
    harness.controller.stop();
    harness.drain();

    harness
        .controller
        .handle_engine_event(EngineEvent::LeaveAck {
            handle,
            result: Err(EngineError::Transport("socket closed".to_string())),
        });

    assert_eq!(harness.controller.phase(), SessionPhase::Idle);
    assert_eq!(
        harness.drain(),
        vec![SessionStatus::Failed(SessionFailure::Engine(
            "socket closed".to_string()
        ))]
    );
}

#[test]
fn shutdown_releases_live_session() {
    let mut harness = Harness::ready();
    let handle = harness.controller.start().expect("start");
    harness.connect_ok(handle);

    harness.controller.shutdown();

    assert_eq!(harness.gateway.leave_count(), 1);
    assert_eq!(harness.controller.phase(), SessionPhase::Stopping);
}

#[tokio::test(start_paused = true)]
async fn loopback_engine_round_trip_through_event_queue() {
    let transport = Arc::new(LoopbackTransport::new(LoopbackConfig {
        connect_latency: Duration::from_millis(250),
        fail_reason: None,
    }));
    let (gateway, mut engine_events) =
        TransportGateway::new(transport.clone(), Duration::from_secs(5));
    let (mut controller, mut statuses) =
        SessionController::new(Arc::new(gateway), UrlPolicy::default());

    controller.select_role(Role::RemoteViewer).expect("role");
    controller
        .set_url("https://cdn.example.com/live/stream.flv")
        .expect("url");
    controller.start().expect("start");

    let mut seen = Vec::new();
    while controller.phase() != SessionPhase::Active {
        let event = engine_events.recv().await.expect("engine event");
        controller.handle_engine_event(event);
    }
    controller.stop();
    while controller.phase() != SessionPhase::Idle {
        let event = engine_events.recv().await.expect("engine event");
        controller.handle_engine_event(event);
    }
    while let Ok(update) = statuses.try_recv() {
        seen.push(update.status);
    }

    assert_eq!(
        seen,
        vec![
            SessionStatus::Connecting,
            SessionStatus::Active,
            SessionStatus::Stopping,
            SessionStatus::Idle
        ]
    );
    assert_eq!(transport.connect_calls(), 1);
    assert_eq!(transport.leave_calls(), 1);
}
