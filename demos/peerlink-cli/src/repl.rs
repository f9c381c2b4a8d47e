//! Line commands typed at the prompt.

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Peers,
    Refresh,
    Connect(String),
    ConnectAll,
    Dm(String),
    Create { channel: String, peer: Option<String> },
    Join(String),
    Channels,
    Send(String),
    Clear,
    History,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  peers                    list known peers and link state
  refresh                  ask the relay for the peer list
  connect <peer>           link with one peer
  connect-all              link with every known peer
  dm <peer>                open a direct-message channel
  create <channel> [peer]  create and enter a room
  join <channel>           switch to a channel
  channels                 list joined channels with unread counts
  send <text>              send to the current channel (or just type)
  clear                    wipe local message history
  history                  show the current channel's messages
  status                   show identity, connection and channel
  quit                     leave";

/// Parses one line. A line that is not a command is sent as a message.
///
/// Returns `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let cmd = match head {
        "peers" => ReplCommand::Peers,
        "refresh" => ReplCommand::Refresh,
        "connect" => ReplCommand::Connect(required(rest, "connect <peer>")?),
        "connect-all" => ReplCommand::ConnectAll,
        "dm" => ReplCommand::Dm(required(rest, "dm <peer>")?),
        "create" => {
            let mut parts = rest.split_whitespace();
            let channel = parts
                .next()
                .ok_or_else(|| "usage: create <channel> [peer]".to_string())?;
            ReplCommand::Create {
                channel: channel.to_string(),
                peer: parts.next().map(str::to_string),
            }
        }
        "join" => ReplCommand::Join(required(rest, "join <channel>")?),
        "channels" => ReplCommand::Channels,
        "send" => ReplCommand::Send(required(rest, "send <text>")?),
        "clear" => ReplCommand::Clear,
        "history" => ReplCommand::History,
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        _ => ReplCommand::Send(line.to_string()),
    };
    Ok(Some(cmd))
}

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(arg.to_string())
    }
}
