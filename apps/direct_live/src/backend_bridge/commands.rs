//! Panel commands queued from the input thread to the session worker.

use shared::domain::Role;

pub const HELP_TEXT: &str = "\
commands:
  role local|remote     pick the local broadcaster or remote viewer role
  url <publish-url>     set the publish url (rtmp://, rtmps://, http://, https://)
  start                 start the session
  stop                  stop the session
  drop [reason]         simulate network loss on the loopback engine
  status                show the panel
  help                  show this help
  quit                  stop any session and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    SelectRole(Role),
    SetUrl(String),
    Start,
    Stop,
    DropNetwork(String),
    Status,
    Help,
    Quit,
}

impl PanelCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PanelCommand::SelectRole(_) => "select_role",
            PanelCommand::SetUrl(_) => "set_url",
            PanelCommand::Start => "start",
            PanelCommand::Stop => "stop",
            PanelCommand::DropNetwork(_) => "drop_network",
            PanelCommand::Status => "status",
            PanelCommand::Help => "help",
            PanelCommand::Quit => "quit",
        }
    }
}

/// Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<PanelCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "role" => PanelCommand::SelectRole(rest.parse::<Role>().map_err(|err| err.to_string())?),
        "url" => PanelCommand::SetUrl(rest.to_string()),
        "start" => PanelCommand::Start,
        "stop" => PanelCommand::Stop,
        "drop" => PanelCommand::DropNetwork(if rest.is_empty() {
            "network unreachable".to_string()
        } else {
            rest.to_string()
        }),
        "status" => PanelCommand::Status,
        "help" | "?" => PanelCommand::Help,
        "quit" | "exit" => PanelCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };

    Ok(Some(command))
}
