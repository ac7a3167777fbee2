//! Session worker: the single execution context that owns the presenter.
//!
//! Panel commands, engine callbacks and status updates are all drained by one
//! `select!` loop, so the controller never sees concurrent calls.

use std::{sync::Arc, time::Duration};

use engine_gateway::{
    EngineEvent, LoopbackConfig, LoopbackTransport, MissingTransport, StreamingTransport,
    TransportGateway,
};
use session_core::SessionController;
use shared::{
    domain::SessionPhase,
    protocol::{SessionStatus, StatusUpdate},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend_bridge::commands::{PanelCommand, HELP_TEXT};
use crate::config::Settings;
use crate::controller::{
    events::{UiError, UiErrorContext, UiEvent},
    presenter::{PanelPresenter, PanelView},
};

pub struct PanelRuntime {
    presenter: PanelPresenter,
    gateway: Arc<TransportGateway>,
    loopback: Option<Arc<LoopbackTransport>>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    statuses: mpsc::UnboundedReceiver<StatusUpdate>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    teardown_grace: Duration,
    last_view: Option<PanelView>,
}

impl PanelRuntime {
    /// Without a loopback config the panel runs against an engine that
    /// refuses every connect.
    pub fn build(
        settings: &Settings,
        loopback: Option<LoopbackConfig>,
        ui_tx: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        let loopback = loopback.map(|config| Arc::new(LoopbackTransport::new(config)));
        let transport: Arc<dyn StreamingTransport> = match &loopback {
            Some(transport) => Arc::clone(transport) as Arc<dyn StreamingTransport>,
            None => Arc::new(MissingTransport),
        };

        let (gateway, engine_events) = TransportGateway::new(transport, settings.connect_timeout());
        let gateway = Arc::new(gateway);
        let (controller, statuses) =
            SessionController::new(Arc::clone(&gateway) as _, settings.url_policy());

        let mut runtime = Self {
            presenter: PanelPresenter::new(controller),
            gateway,
            loopback,
            engine_events,
            statuses,
            ui_tx,
            teardown_grace: settings.teardown_grace(),
            last_view: None,
        };

        if let Some(role) = settings.role {
            if let Err(err) = runtime.presenter.on_role_tapped(role) {
                runtime.report(UiError::from_session_error(UiErrorContext::RoleSelection, &err));
            }
        }
        if let Some(url) = &settings.publish_url {
            if let Err(err) = runtime.presenter.on_url_changed(url) {
                runtime.report(UiError::from_session_error(UiErrorContext::PublishUrl, &err));
            }
        }

        runtime
    }

    #[cfg(test)]
    pub fn loopback(&self) -> Option<Arc<LoopbackTransport>> {
        self.loopback.clone()
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<PanelCommand>) {
        info!("panel: worker ready");
        self.publish_view();

        loop {
            tokio::select! {
                biased;
                Some(update) = self.statuses.recv() => self.on_status(update),
                Some(event) = self.engine_events.recv() => self.presenter.on_engine_event(event),
                command = commands.recv() => match command {
                    Some(PanelCommand::Quit) | None => break,
                    Some(command) => self.apply(command).await,
                },
            }
        }

        self.teardown().await;
    }

    async fn apply(&mut self, command: PanelCommand) {
        let outcome = match command {
            PanelCommand::SelectRole(role) => self
                .presenter
                .on_role_tapped(role)
                .map_err(|err| UiError::from_session_error(UiErrorContext::RoleSelection, &err)),
            PanelCommand::SetUrl(text) => self
                .presenter
                .on_url_changed(&text)
                .map_err(|err| UiError::from_session_error(UiErrorContext::PublishUrl, &err)),
            PanelCommand::Start => self
                .presenter
                .on_start_tapped()
                .map_err(|err| UiError::from_session_error(UiErrorContext::Start, &err)),
            PanelCommand::Stop => {
                self.presenter.on_stop_tapped();
                Ok(())
            }
            PanelCommand::DropNetwork(reason) => {
                self.drop_network(reason).await;
                Ok(())
            }
            PanelCommand::Status => {
                let view = self.presenter.view();
                self.send(UiEvent::ViewChanged(view));
                return;
            }
            PanelCommand::Help => {
                self.send(UiEvent::Info(HELP_TEXT.to_string()));
                return;
            }
            PanelCommand::Quit => return,
        };

        if let Err(err) = outcome {
            self.report(err);
        }
        self.publish_view();
    }

    fn on_status(&mut self, update: StatusUpdate) {
        if let SessionStatus::Failed(failure) = &update.status {
            self.report(UiError::from_failure(failure));
        }
        let view = self.presenter.on_status_changed(&update);
        self.publish(view);
    }

    async fn drop_network(&mut self, reason: String) {
        let Some(loopback) = &self.loopback else {
            self.send(UiEvent::Info(
                "network loss can only be simulated on the loopback engine".to_string(),
            ));
            return;
        };

        if !loopback.simulate_network_loss(reason).await {
            self.send(UiEvent::Info("no live link to drop".to_string()));
        }
    }

    async fn teardown(&mut self) {
        self.presenter.teardown();

        let deadline = tokio::time::Instant::now() + self.teardown_grace;
        while self.presenter.controller().phase() != SessionPhase::Idle {
            match tokio::time::timeout_at(deadline, self.engine_events.recv()).await {
                Ok(Some(event)) => self.presenter.on_engine_event(event),
                Ok(None) | Err(_) => {
                    warn!(
                        "panel: session still {} at teardown deadline",
                        self.presenter.controller().phase()
                    );
                    break;
                }
            }
        }
        while let Ok(update) = self.statuses.try_recv() {
            self.on_status(update);
        }

        self.gateway.close_all().await;
        info!("panel: worker stopped");
        self.send(UiEvent::Shutdown);
    }

    fn publish_view(&mut self) {
        let view = self.presenter.view();
        self.publish(view);
    }

    fn publish(&mut self, view: PanelView) {
        if self.last_view.as_ref() == Some(&view) {
            return;
        }
        self.last_view = Some(view.clone());
        self.send(UiEvent::ViewChanged(view));
    }

    fn report(&self, err: UiError) {
        if err.is_user_visible() {
            self.send(UiEvent::Error(err));
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
