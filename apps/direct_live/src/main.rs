use std::{io::BufRead, path::PathBuf, thread};

use anyhow::Result;
use clap::Parser;
use engine_gateway::LoopbackConfig;
use shared::domain::Role;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod backend_bridge;
mod config;
mod controller;

use backend_bridge::{
    commands::{parse_command, PanelCommand},
    runtime::PanelRuntime,
};
use config::{load_settings, Settings, DEFAULT_CONFIG_FILE};
use controller::{
    events::{UiError, UiErrorCategory, UiErrorContext, UiEvent},
    orchestration::dispatch_panel_command,
};

const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Parser, Debug)]
#[command(name = "direct_live", about = "Direct Live CDN streaming control panel")]
struct Args {
    /// Settings file; a missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    role: Option<Role>,
    /// Make every loopback connect fail with this reason.
    #[arg(long)]
    fail_with: Option<String>,
    /// Run without a streaming engine.
    #[arg(long)]
    no_engine: bool,
    /// Print panel state as JSON lines.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.url {
            settings.publish_url = Some(url.clone());
        }
        if let Some(role) = self.role {
            settings.role = Some(role);
        }
        if let Some(reason) = &self.fail_with {
            settings.loopback_fail_reason = Some(reason.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config);
    args.apply(&mut settings);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let loopback = (!args.no_engine).then(|| LoopbackConfig {
        connect_latency: settings.loopback_latency(),
        fail_reason: settings.loopback_fail_reason.clone(),
    });

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let runtime = PanelRuntime::build(&settings, loopback, ui_tx.clone());

    spawn_input_reader(cmd_tx, ui_tx);
    let printer = tokio::spawn(print_ui_events(ui_rx, args.json));

    runtime.run(cmd_rx).await;
    printer.await??;
    Ok(())
}

fn spawn_input_reader(cmd_tx: mpsc::Sender<PanelCommand>, ui_tx: mpsc::UnboundedSender<UiEvent>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };

            match parse_command(&line) {
                Ok(Some(command)) => {
                    let quit = command == PanelCommand::Quit;
                    if let Err(err) = dispatch_panel_command(&cmd_tx, command) {
                        let _ = ui_tx.send(UiEvent::Error(err));
                    }
                    if quit {
                        return;
                    }
                }
                Ok(None) => {}
                Err(message) => {
                    let _ = ui_tx.send(UiEvent::Error(UiError::from_message(
                        UiErrorContext::CommandInput,
                        message,
                    )));
                }
            }
        }

        // End of input closes the panel the same way quit does.
        let _ = cmd_tx.blocking_send(PanelCommand::Quit);
    });
}

async fn print_ui_events(mut ui_rx: mpsc::UnboundedReceiver<UiEvent>, json: bool) -> Result<()> {
    while let Some(event) = ui_rx.recv().await {
        match event {
            UiEvent::ViewChanged(view) if json => println!("{}", serde_json::to_string(&view)?),
            UiEvent::ViewChanged(view) => println!("{}", view.to_text()),
            UiEvent::Info(message) => println!("{message}"),
            UiEvent::Error(err) => {
                tracing::debug!(context = ?err.context(), "panel: showing error");
                eprintln!("error ({}): {}", category_label(err.category()), err.message());
            }
            UiEvent::Shutdown => break,
        }
    }
    Ok(())
}

fn category_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Validation => "input",
        UiErrorCategory::Transition => "state",
        UiErrorCategory::Engine => "engine",
        UiErrorCategory::Network => "network",
        UiErrorCategory::Command => "command",
    }
}
