//! peerlink-cli: terminal chat client for a Peerlink relay.
//!
//! Connects to the relay, keeps the connection alive across drops, and
//! turns typed lines into chat commands. Anything that is not a command
//! is sent to the current channel.

mod repl;

use std::time::Duration;

use clap::Parser;
use peerlink::prelude::*;
use peerlink::transport::DEFAULT_WS_PORT;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::repl::{HELP, ReplCommand};

/// peerlink-cli: chat over a peer-to-peer relay
#[derive(Parser)]
#[command(name = "peerlink-cli", version, about = "Terminal chat client for a Peerlink relay")]
struct Cli {
    /// Relay host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay WebSocket port
    #[arg(short, long, default_value_t = DEFAULT_WS_PORT)]
    port: u16,

    /// Local peer id; the relay assigns one if omitted
    #[arg(long)]
    peer_id: Option<String>,

    /// Use wss instead of ws
    #[arg(long)]
    secure: bool,

    /// Channel to start in
    #[arg(short, long, default_value = "general")]
    channel: String,

    /// Delay before reconnecting, in milliseconds
    #[arg(long, default_value_t = 1500)]
    reconnect_ms: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "peerlink_cli=debug,peerlink=debug,peerlink_session=debug,peerlink_transport=debug,peerlink_state=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(cli.verbose)
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "peerlink-cli exited with an error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), PeerlinkError> {
    let mut builder = ClientBuilder::new()
        .host(cli.host)
        .port(cli.port)
        .secure(cli.secure)
        .default_channel(cli.channel)
        .reconnect_delay(Duration::from_millis(cli.reconnect_ms));
    if let Some(peer_id) = cli.peer_id {
        builder = builder.peer_id(peer_id);
    }
    let session = builder.build()?;

    if let Some(endpoint) = session.endpoint() {
        println!("connecting to {endpoint} (type `help` for commands)");
    }

    let mut views = session.subscribe_view();
    let mut notices = session.subscribe_notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printer = Printer::new(&session.view());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match repl::parse(&line) {
                    Ok(Some(ReplCommand::Quit)) => break,
                    Ok(Some(cmd)) => execute(&session, cmd),
                    Ok(None) => {}
                    Err(usage) => println!("{usage}"),
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                printer.update(&view);
            }
            notice = notices.recv() => match notice {
                Ok(Notice::ConnectFailed { info }) => println!("! connect failed: {info}"),
                Ok(Notice::StatusChanged(status)) => println!("* {status}"),
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "notice feed lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await?;
    Ok(())
}

fn execute(session: &SessionController, cmd: ReplCommand) {
    let result = match cmd {
        ReplCommand::Peers => {
            print_peers(&session.view());
            Ok(())
        }
        ReplCommand::Refresh => session.list_peers(),
        ReplCommand::Connect(peer) => session.connect_peer(peer),
        ReplCommand::ConnectAll => session.connect_all_known_peers(),
        ReplCommand::Dm(peer) => session.start_direct_message(peer),
        ReplCommand::Create { channel, peer } => {
            session.create_room(channel, peer.map(PeerId::from))
        }
        ReplCommand::Join(channel) => session.select_channel(channel),
        ReplCommand::Channels => {
            print_channels(&session.view());
            Ok(())
        }
        ReplCommand::Send(text) => session.send_message(text),
        ReplCommand::Clear => {
            session.clear_messages();
            Ok(())
        }
        ReplCommand::History => {
            let view = session.view();
            println!("-- #{} --", view.current);
            for message in &view.messages {
                print_message(message);
            }
            Ok(())
        }
        ReplCommand::Status => {
            let view = session.view();
            println!(
                "me: {}  relay: {}  channel: #{}  links: {}",
                view.me,
                view.status,
                view.current,
                view.connection_count()
            );
            Ok(())
        }
        ReplCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ReplCommand::Quit => Ok(()),
    };

    if let Err(reason) = result {
        println!("! {reason}");
    }
}

fn print_peers(view: &ChatView) {
    if view.peers.is_empty() {
        println!("no known peers");
        return;
    }
    for (id, info) in &view.peers {
        let link = if view.connections.contains(id) { "linked" } else { "-" };
        let me = if *id == view.me { " (me)" } else { "" };
        println!("  {id}{me}  {}:{}  {link}", info.ip, info.port);
    }
}

fn print_channels(view: &ChatView) {
    for channel in &view.channels {
        let marker = if *channel == view.current { '*' } else { ' ' };
        match view.unread_in(channel) {
            0 => println!("{marker} #{channel}"),
            n => println!("{marker} #{channel} ({n} unread)"),
        }
    }
}

fn print_message(message: &ChatMessage) {
    println!("[{}] {}: {}", message.channel, message.from, message.text);
}

/// Prints messages of the current channel as they arrive.
struct Printer {
    channel: ChannelId,
    shown: usize,
}

impl Printer {
    fn new(view: &ChatView) -> Self {
        Self {
            channel: view.current.clone(),
            shown: view.messages.len(),
        }
    }

    fn update(&mut self, view: &ChatView) {
        if view.current != self.channel {
            println!("-- now in #{} --", view.current);
            self.channel = view.current.clone();
            self.shown = 0;
        }
        if view.messages.len() < self.shown {
            // History was cleared.
            self.shown = 0;
        }
        for message in &view.messages[self.shown..] {
            print_message(message);
        }
        self.shown = view.messages.len();
    }
}
