//! The session controller: owns one transport and one chat state and
//! keeps them in step.
//!
//! ```text
//!            frames                  InboundEvent             Vec<Effect>
//! Transport ───────→ EventDecoder ───────────────→ ChatState ─────────────┐
//!     ↑                                                                  │
//!     └────────────── Effect::Send (encoded by JsonCodec) ───────────────┤
//!                                                                        ↓
//!                                   watch<ChatView> / broadcast<Notice>
//! ```
//!
//! Transport callbacks run on the transport's driver task. Everything
//! they touch lives in [`Core`], which the callbacks reach through a
//! `Weak` so the transport never keeps the controller alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use peerlink_protocol::{ChannelId, Codec, Command, EventDecoder, JsonCodec, PeerId};
use peerlink_state::{ChatState, ChatView, CommandRejected, Effect, Notice};
use peerlink_transport::{
    ConnectionStatus, Endpoint, Subscription, TransportConfig, WebSocketTransport,
};
use tokio::sync::{broadcast, watch};

use crate::{Credentials, Lifecycle, SessionConfig, SessionError};

/// Notices buffered per slow subscriber before it starts lagging.
const NOTICE_CAPACITY: usize = 64;

/// State shared with transport callbacks.
struct Core {
    state: Mutex<ChatState>,
    decoder: EventDecoder,
    codec: JsonCodec,
    /// Where `Effect::Send` goes. `None` between links.
    transport: Mutex<Option<WebSocketTransport>>,
    /// Bumped whenever a link starts or stops. Callbacks from an older
    /// link compare it and bail out.
    generation: AtomicU64,
    view: watch::Sender<ChatView>,
    notices: broadcast::Sender<Notice>,
}

/// A running transport and our subscriptions to it.
struct Link {
    endpoint: Endpoint,
    transport: WebSocketTransport,
    frames: Subscription,
    statuses: Subscription,
}

/// The composition root of the chat client.
///
/// Owns the transport exclusively. All commands are synchronous and
/// never block: they update the state, hand any outbound frames to the
/// transport, and return.
///
/// Dropping the controller closes it.
pub struct SessionController {
    config: SessionConfig,
    lifecycle: Mutex<Lifecycle>,
    link: Mutex<Option<Link>>,
    core: Arc<Core>,
}

impl SessionController {
    /// Builds a controller and, if the credentials carry a port, starts
    /// connecting right away.
    ///
    /// Must be called inside a Tokio runtime for the connection to start.
    /// Outside one, the controller is left in
    /// [`Lifecycle::AwaitingEndpoint`].
    pub fn new(config: SessionConfig, credentials: Credentials) -> Self {
        let state =
            ChatState::with_default_channel(credentials.peer_id.clone(), config.default_channel.clone());
        let (view, _) = watch::channel(state.view());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let core = Arc::new(Core {
            state: Mutex::new(state),
            decoder: EventDecoder::new().with_default_channel(config.default_channel.clone()),
            codec: JsonCodec,
            transport: Mutex::new(None),
            generation: AtomicU64::new(0),
            view,
            notices,
        });

        let controller = Self {
            config,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            link: Mutex::new(None),
            core,
        };

        match credentials.ws_port {
            Some(port) => {
                let endpoint = controller.config.endpoint_for(port);
                if let Err(e) = controller.start(endpoint) {
                    tracing::warn!(error = %e, "starting without a connection");
                    controller.set_lifecycle(Lifecycle::AwaitingEndpoint);
                }
            }
            None => controller.set_lifecycle(Lifecycle::AwaitingEndpoint),
        }
        controller
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Points the controller at `endpoint`.
    ///
    /// The same endpoint as the live link is a no-op. A different one
    /// closes the live link (passing through
    /// [`Lifecycle::AwaitingEndpoint`]) and connects a fresh transport.
    ///
    /// # Errors
    /// [`SessionError::TornDown`] after [`close`](Self::close), or
    /// [`SessionError::StartFailed`] if the transport did not start.
    pub fn set_endpoint(&self, endpoint: Endpoint) -> Result<(), SessionError> {
        if self.lifecycle() == Lifecycle::TornDown {
            return Err(SessionError::TornDown);
        }
        if lock(&self.link).as_ref().is_some_and(|l| l.endpoint == endpoint) {
            tracing::debug!(%endpoint, "endpoint unchanged");
            return Ok(());
        }

        if let Some(old) = self.stop_link() {
            tracing::info!(%endpoint, "switching endpoint");
            old.close();
            self.set_lifecycle(Lifecycle::AwaitingEndpoint);
        }

        let result = self.start(endpoint);
        if result.is_err() {
            self.set_lifecycle(Lifecycle::AwaitingEndpoint);
        }
        result
    }

    /// Shorthand for [`set_endpoint`](Self::set_endpoint) with
    /// [`SessionConfig::endpoint_for`].
    pub fn set_port(&self, port: u16) -> Result<(), SessionError> {
        self.set_endpoint(self.config.endpoint_for(port))
    }

    /// Tears the session down: unsubscribes, stops the transport and
    /// cancels any pending reconnect. Idempotent. Returns immediately;
    /// use [`shutdown`](Self::shutdown) to wait for the socket to close.
    pub fn close(&self) {
        if self.lifecycle() == Lifecycle::TornDown {
            return;
        }
        if let Some(transport) = self.stop_link() {
            transport.close();
        }
        self.set_lifecycle(Lifecycle::TornDown);
    }

    /// Like [`close`](Self::close), but waits until the transport's
    /// driver has exited.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        if self.lifecycle() == Lifecycle::TornDown {
            return Ok(());
        }
        let transport = self.stop_link();
        self.set_lifecycle(Lifecycle::TornDown);
        if let Some(transport) = transport {
            transport.shutdown().await?;
        }
        Ok(())
    }

    fn start(&self, endpoint: Endpoint) -> Result<(), SessionError> {
        let transport = WebSocketTransport::with_endpoint(
            TransportConfig::with_reconnect_delay(self.config.reconnect_delay),
            endpoint.clone(),
        );
        let generation = self.core.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let weak = Arc::downgrade(&self.core);
        let frame_core = weak.clone();
        let frames = transport.subscribe(move |frame| {
            if let Some(core) = frame_core.upgrade() {
                core.on_frame(generation, frame);
            }
        });
        let statuses = transport.subscribe_status(move |status| {
            if let Some(core) = weak.upgrade() {
                core.on_status(generation, *status);
            }
        });

        *lock(&self.core.transport) = Some(transport.clone());
        if !transport.connect() {
            *lock(&self.core.transport) = None;
            return Err(SessionError::StartFailed(endpoint.to_string()));
        }

        tracing::info!(%endpoint, "session connecting");
        *lock(&self.link) = Some(Link {
            endpoint,
            transport,
            frames,
            statuses,
        });
        self.set_lifecycle(Lifecycle::Active);
        Ok(())
    }

    /// Detaches the live link and marks the state closed. The caller
    /// stops the returned transport.
    fn stop_link(&self) -> Option<WebSocketTransport> {
        let link = lock(&self.link).take()?;
        self.core.generation.fetch_add(1, Ordering::SeqCst);
        *lock(&self.core.transport) = None;

        link.frames.unsubscribe();
        link.statuses.unsubscribe();
        self.core.step(|state| state.set_status(ConnectionStatus::Closed));
        Some(link.transport)
    }

    fn set_lifecycle(&self, next: Lifecycle) {
        let mut current = lock(&self.lifecycle);
        if *current == next {
            return;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(from = %*current, to = %next, "unexpected lifecycle transition");
        }
        tracing::info!(from = %*current, to = %next, "session lifecycle");
        *current = next;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Asks the relay for the current peer list.
    pub fn list_peers(&self) -> Result<(), CommandRejected> {
        self.core.command("list_peers", |s| s.list_peers())
    }

    /// Requests membership of `channel`.
    pub fn join(&self, channel: impl Into<ChannelId>) -> Result<(), CommandRejected> {
        let channel = channel.into();
        self.core.command("join", |s| s.join(channel))
    }

    /// Switches the active channel and requests membership if connected.
    pub fn select_channel(&self, channel: impl Into<ChannelId>) -> Result<(), CommandRejected> {
        let channel = channel.into();
        self.core.command("select_channel", |s| s.select_channel(channel))
    }

    /// Creates (and immediately joins) a room, optionally scoped to one
    /// peer.
    pub fn create_room(
        &self,
        channel: impl Into<ChannelId>,
        to_peer: Option<PeerId>,
    ) -> Result<(), CommandRejected> {
        let channel = channel.into();
        self.core
            .command("create_room", |s| s.create_room(channel, to_peer))
    }

    /// Requests a peer-to-peer link with `peer_id`.
    pub fn connect_peer(&self, peer_id: impl Into<PeerId>) -> Result<(), CommandRejected> {
        let peer_id = peer_id.into();
        self.core.command("connect", |s| s.connect_peer(peer_id))
    }

    /// Requests a link with every known peer.
    pub fn connect_all_known_peers(&self) -> Result<(), CommandRejected> {
        self.core
            .command("connect_all", |s| s.connect_all_known_peers())
    }

    /// Publishes `text` on `channel`.
    pub fn broadcast(
        &self,
        channel: impl Into<ChannelId>,
        text: impl Into<String>,
    ) -> Result<(), CommandRejected> {
        let channel = channel.into();
        let text = text.into();
        self.core.command("broadcast", |s| s.broadcast(channel, text))
    }

    /// Publishes `text` on the active channel.
    pub fn send_message(&self, text: impl Into<String>) -> Result<(), CommandRejected> {
        let text = text.into();
        self.core.command("send_message", |s| s.send_message(text))
    }

    /// Opens (and activates) the direct-message channel with `peer_id`.
    pub fn start_direct_message(&self, peer_id: impl Into<PeerId>) -> Result<(), CommandRejected> {
        let peer_id = peer_id.into();
        self.core
            .command("start_direct_message", |s| s.start_direct_message(peer_id))
    }

    /// Wipes all local message history.
    pub fn clear_messages(&self) {
        self.core.step(|s| {
            s.clear_messages();
            Vec::new()
        });
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Current snapshot of the chat state.
    pub fn view(&self) -> ChatView {
        self.core.view.borrow().clone()
    }

    /// A receiver that sees every new snapshot.
    pub fn subscribe_view(&self) -> watch::Receiver<ChatView> {
        self.core.view.subscribe()
    }

    /// A receiver for notices (failed peer connects, status changes).
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.core.notices.subscribe()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.lifecycle)
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.core.state).status()
    }

    /// Endpoint of the live link, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        lock(&self.link).as_ref().map(|l| l.endpoint.clone())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("lifecycle", &self.lifecycle())
            .field("endpoint", &self.endpoint())
            .field("status", &self.status())
            .finish()
    }
}

impl Core {
    fn on_frame(&self, generation: u64, frame: &str) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        match self.decoder.decode(frame) {
            Ok(event) => self.step(|state| state.apply(event)),
            Err(e) => tracing::warn!(error = %e, "dropping undecodable frame"),
        }
    }

    fn on_status(&self, generation: u64, status: ConnectionStatus) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.step(|state| state.set_status(status));
    }

    /// Runs one infallible transition, publishes the new view, then
    /// executes the effects outside the state lock.
    fn step<F>(&self, f: F)
    where
        F: FnOnce(&mut ChatState) -> Vec<Effect>,
    {
        let effects = {
            let mut state = lock(&self.state);
            let effects = f(&mut state);
            self.view.send_replace(state.view());
            effects
        };
        self.execute(effects);
    }

    /// Like [`step`](Self::step) for a command that may be rejected.
    /// A rejected command leaves the state and the view untouched.
    fn command<F>(&self, name: &'static str, f: F) -> Result<(), CommandRejected>
    where
        F: FnOnce(&mut ChatState) -> Result<Vec<Effect>, CommandRejected>,
    {
        let effects = {
            let mut state = lock(&self.state);
            match f(&mut state) {
                Ok(effects) => {
                    self.view.send_replace(state.view());
                    effects
                }
                Err(reason) => {
                    tracing::warn!(command = name, %reason, "command rejected");
                    return Err(reason);
                }
            }
        };
        tracing::debug!(command = name, sends = effects.len(), "command accepted");
        self.execute(effects);
        Ok(())
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(command) => self.send(&command),
                Effect::Notice(notice) => {
                    // Err only means nobody is listening.
                    let _ = self.notices.send(notice);
                }
            }
        }
    }

    fn send(&self, command: &Command) {
        let text = match self.codec.encode_text(command) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(command = command.name(), error = %e, "dropping command");
                return;
            }
        };
        let transport = lock(&self.transport).clone();
        match transport {
            Some(transport) => {
                transport.send_text(text);
            }
            None => tracing::warn!(command = command.name(), "dropping command, no transport"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
