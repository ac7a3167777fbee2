//! Command orchestration from panel input to the session worker queue.

use tokio::sync::mpsc::{error::TrySendError, Sender};

use crate::backend_bridge::commands::PanelCommand;
use crate::controller::events::{UiError, UiErrorContext};

pub fn dispatch_panel_command(
    cmd_tx: &Sender<PanelCommand>,
    cmd: PanelCommand,
) -> Result<(), UiError> {
    let cmd_name = cmd.name();

    match cmd_tx.try_send(cmd) {
        Ok(()) => {
            tracing::debug!(command = cmd_name, "queued panel->session command");
            Ok(())
        }
        Err(TrySendError::Full(_)) => Err(UiError::from_message(
            UiErrorContext::CommandInput,
            "Panel command queue is full; please retry",
        )),
        Err(TrySendError::Closed(_)) => Err(UiError::from_message(
            UiErrorContext::CommandInput,
            "Session worker has stopped; restart the panel",
        )),
    }
}
