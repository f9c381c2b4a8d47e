//! Reconnecting WebSocket client using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    ConnectionStatus, Endpoint, Registry, Subscription, TransportConfig,
    TransportError,
};

/// How long a stopping driver waits for its close frame to go out.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// State shared between the handles and the driver task.
///
/// The driver only ever holds this part, never the [`Inner`] that owns
/// it, so dropping the last handle drops the shutdown sender and stops
/// the driver.
///
/// Every driver is tagged with the generation current when it was
/// spawned. Status and writer updates from an older generation are
/// ignored, so a retired driver that is still winding down cannot clobber
/// the link that replaced it.
struct Shared {
    generation: AtomicU64,
    status: Mutex<ConnectionStatus>,
    outbound: Mutex<Option<(u64, mpsc::UnboundedSender<String>)>>,
    frames: Registry<str>,
    statuses: Registry<ConnectionStatus>,
}

struct Driver {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    config: TransportConfig,
    endpoint: Mutex<Option<Endpoint>>,
    driver: Mutex<Option<Driver>>,
    shared: Arc<Shared>,
}

/// Handle to a single reconnecting WebSocket connection.
///
/// Cheap to clone; every clone talks to the same socket. The connection
/// is driven by one background task, spawned by [`connect`](Self::connect)
/// and stopped by [`close`](Self::close) or by dropping the last handle.
#[derive(Clone)]
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

impl WebSocketTransport {
    /// Creates an idle transport with no endpoint.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                endpoint: Mutex::new(None),
                driver: Mutex::new(None),
                shared: Arc::new(Shared {
                    generation: AtomicU64::new(0),
                    status: Mutex::new(ConnectionStatus::Idle),
                    outbound: Mutex::new(None),
                    frames: Registry::new(),
                    statuses: Registry::new(),
                }),
            }),
        }
    }

    /// Creates an idle transport bound to `endpoint`.
    pub fn with_endpoint(config: TransportConfig, endpoint: Endpoint) -> Self {
        let transport = Self::new(config);
        transport.set_endpoint(endpoint);
        transport
    }

    /// Sets the endpoint used by the next [`connect`](Self::connect).
    ///
    /// A driver that is already running keeps dialing its original
    /// endpoint; close it first to switch.
    pub fn set_endpoint(&self, endpoint: Endpoint) {
        *lock(&self.inner.endpoint) = Some(endpoint);
    }

    /// Returns the configured endpoint, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        lock(&self.inner.endpoint).clone()
    }

    /// Starts the connection driver.
    ///
    /// Idempotent: does nothing if a driver is already running or if no
    /// endpoint has been configured. Must be called from within a Tokio
    /// runtime. Returns `true` if a new driver was started.
    pub fn connect(&self) -> bool {
        let Some(endpoint) = self.endpoint() else {
            tracing::debug!("connect ignored: {}", TransportError::NoEndpoint);
            return false;
        };

        let mut driver = lock(&self.inner.driver);
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            tracing::debug!(%endpoint, "connect ignored: driver already running");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "connect called outside a Tokio runtime");
                return false;
            }
        };

        let generation = self.inner.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(run_driver(
            Arc::clone(&self.inner.shared),
            generation,
            endpoint,
            self.inner.config.clone(),
            shutdown_rx,
        ));
        *driver = Some(Driver {
            shutdown: shutdown_tx,
            task,
        });
        true
    }

    /// Serializes `payload` as JSON and queues it for transmission.
    ///
    /// Only transmits while the status is [`ConnectionStatus::Connected`].
    /// Otherwise the frame is dropped with a warning. Never queues across
    /// reconnects and never fails loudly. Returns `true` if the frame was
    /// handed to the socket writer.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::warn!(error = %e, "dropping outbound frame: encode failed");
                false
            }
        }
    }

    /// Queues an already-encoded text frame. Same gating as [`send`](Self::send).
    pub fn send_text(&self, text: String) -> bool {
        let shared = &self.inner.shared;
        let status = *lock(&shared.status);
        if !status.is_connected() {
            tracing::warn!(%status, frame = %text, "cannot send, socket not open");
            return false;
        }
        match lock(&shared.outbound).as_ref() {
            Some((_, tx)) => {
                tracing::debug!(frame = %text, "send");
                tx.send(text).is_ok()
            }
            None => {
                tracing::warn!(frame = %text, "cannot send, writer gone");
                false
            }
        }
    }

    /// Registers a handler for every inbound text frame.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.shared.frames.subscribe(handler)
    }

    /// Registers a handler for every status transition.
    pub fn subscribe_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.inner.shared.statuses.subscribe(handler)
    }

    /// Returns the current status.
    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.inner.shared.status)
    }

    /// Stops the driver: closes the socket and cancels any pending
    /// reconnect. Returns immediately; use [`shutdown`](Self::shutdown)
    /// to wait for the driver to finish.
    ///
    /// Calling [`connect`](Self::connect) right afterwards is fine: the new
    /// driver takes over the status feed and the writer even if the old one
    /// has not exited yet.
    pub fn close(&self) {
        if let Some(driver) = lock(&self.inner.driver).take() {
            tracing::info!("closing transport");
            let _ = driver.shutdown.send(());
        }
    }

    /// Stops the driver and waits until it has exited.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let driver = lock(&self.inner.driver).take();
        if let Some(driver) = driver {
            let _ = driver.shutdown.send(());
            driver.task.await.map_err(|e| {
                TransportError::ConnectionClosed(format!("driver task failed: {e}"))
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("endpoint", &self.endpoint())
            .field("status", &self.status())
            .finish()
    }
}

/// How one connected session of the driver ended.
enum Exit {
    /// Owner asked us to stop.
    Stopped,
    /// Peer closed the socket.
    Closed,
    /// Read or write failed.
    Failed(TransportError),
}

/// Connect, pump, and reconnect until shut down.
async fn run_driver(
    shared: Arc<Shared>,
    generation: u64,
    endpoint: Endpoint,
    config: TransportConfig,
    mut shutdown: oneshot::Receiver<()>,
) {
    let url = endpoint.url();

    loop {
        shared.set_status(generation, ConnectionStatus::Connecting);
        tracing::info!(%url, generation, "connecting");

        let attempt = tokio::select! {
            _ = &mut shutdown => {
                shared.set_status(generation, ConnectionStatus::Closed);
                return;
            }
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        match attempt {
            Ok((ws, _response)) => {
                let (mut sink, mut stream) = ws.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                shared.install_writer(generation, tx);
                shared.set_status(generation, ConnectionStatus::Connected);
                tracing::info!(%url, "connected");

                let exit = loop {
                    tokio::select! {
                        _ = &mut shutdown => break Exit::Stopped,
                        Some(text) = rx.recv() => {
                            // A peer that stops reading stalls the write, so
                            // shutdown has to stay reachable while it is pending.
                            tokio::select! {
                                _ = &mut shutdown => break Exit::Stopped,
                                sent = sink.send(Message::Text(text.into())) => {
                                    if let Err(e) = sent {
                                        break Exit::Failed(TransportError::SendFailed(
                                            std::io::Error::new(std::io::ErrorKind::BrokenPipe, e),
                                        ));
                                    }
                                }
                            }
                        }
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                shared.frames.dispatch(text.as_str());
                            }
                            Some(Ok(Message::Binary(data))) => {
                                match std::str::from_utf8(&data) {
                                    Ok(text) => shared.frames.dispatch(text),
                                    Err(e) => tracing::warn!(
                                        error = %e,
                                        "dropping binary frame that is not UTF-8"
                                    ),
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break Exit::Closed,
                            Some(Ok(_)) => {} // ping/pong/raw frame
                            Some(Err(e)) => {
                                break Exit::Failed(TransportError::ReceiveFailed(
                                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, e),
                                ));
                            }
                        },
                    }
                };

                shared.remove_writer(generation);
                match exit {
                    Exit::Stopped => {
                        if tokio::time::timeout(CLOSE_GRACE, sink.send(Message::Close(None)))
                            .await
                            .is_err()
                        {
                            tracing::debug!(%url, "close frame not flushed, dropping socket");
                        }
                        shared.set_status(generation, ConnectionStatus::Closed);
                        tracing::info!(%url, "transport stopped");
                        return;
                    }
                    Exit::Closed => {
                        tracing::info!(%url, "connection closed, will reconnect");
                    }
                    Exit::Failed(e) => {
                        tracing::warn!(%url, error = %e, "connection failed, will reconnect");
                        shared.set_status(generation, ConnectionStatus::Error);
                    }
                }
                shared.set_status(generation, ConnectionStatus::Closed);
            }
            Err(e) => {
                let err = TransportError::ConnectFailed {
                    url: url.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e),
                };
                tracing::warn!(error = %err, "connect attempt failed");
                shared.set_status(generation, ConnectionStatus::Error);
                shared.set_status(generation, ConnectionStatus::Closed);
            }
        }

        tracing::debug!(delay_ms = config.reconnect_delay.as_millis() as u64, "reconnect scheduled");
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(%url, "reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn install_writer(&self, generation: u64, tx: mpsc::UnboundedSender<String>) {
        let mut outbound = lock(&self.outbound);
        if self.is_current(generation) {
            *outbound = Some((generation, tx));
        }
    }

    fn remove_writer(&self, generation: u64) {
        let mut outbound = lock(&self.outbound);
        if outbound.as_ref().is_some_and(|(owner, _)| *owner == generation) {
            *outbound = None;
        }
    }

    /// Records and publishes a status transition made by the driver of
    /// `generation`. Transitions from a superseded driver are dropped.
    fn set_status(&self, generation: u64, next: ConnectionStatus) {
        {
            let mut status = lock(&self.status);
            if !self.is_current(generation) {
                tracing::debug!(generation, to = %next, "ignoring status from retired driver");
                return;
            }
            if *status == next {
                return;
            }
            if !status.can_transition_to(next) {
                tracing::warn!(from = %*status, to = %next, "unexpected status transition");
            }
            *status = next;
        }
        tracing::debug!(status = %next, "status changed");
        self.statuses.dispatch(&next);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
