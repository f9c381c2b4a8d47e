//! `ClientBuilder`: one-stop setup for a connected session.

use std::time::Duration;

use peerlink_protocol::{ChannelId, PeerId};
use peerlink_session::{Credentials, Lifecycle, SessionConfig, SessionController, SessionError};

use crate::PeerlinkError;

/// Builder for a [`SessionController`].
///
/// # Example
///
/// ```rust,no_run
/// use peerlink::prelude::*;
///
/// # async fn run() -> Result<(), PeerlinkError> {
/// let session = ClientBuilder::new()
///     .host("127.0.0.1")
///     .port(7000)
///     .peer_id("alice")
///     .build()?;
/// session.send_message("hello")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: SessionConfig,
    credentials: Credentials,
}

impl ClientBuilder {
    /// Creates a builder with default settings and no port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relay host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config = self.config.with_host(host);
        self
    }

    /// Sets the relay's WebSocket port.
    pub fn port(mut self, port: u16) -> Self {
        self.credentials.ws_port = Some(port);
        self
    }

    /// Sets the local identity. Without one the relay assigns it.
    pub fn peer_id(mut self, peer_id: impl Into<PeerId>) -> Self {
        self.credentials.peer_id = Some(peer_id.into());
        self
    }

    /// Uses `wss` instead of `ws`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.config = self.config.with_secure_origin(secure);
        self
    }

    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.config = self.config.with_ws_path(path);
        self
    }

    pub fn default_channel(mut self, channel: impl Into<ChannelId>) -> Self {
        self.config = self.config.with_default_channel(channel);
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_reconnect_delay(delay);
        self
    }

    /// Replaces the whole session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the controller and starts connecting if a port was given.
    ///
    /// # Errors
    /// Returns [`SessionError::StartFailed`] if a port was given but the
    /// transport could not start, which happens outside a Tokio runtime.
    pub fn build(self) -> Result<SessionController, PeerlinkError> {
        let port = self.credentials.ws_port;
        let session = SessionController::new(self.config, self.credentials);

        match port {
            Some(port) if session.lifecycle() != Lifecycle::Active => {
                let target = session.config().endpoint_for(port).to_string();
                return Err(SessionError::StartFailed(target).into());
            }
            _ => {}
        }
        tracing::debug!(lifecycle = %session.lifecycle(), "client built");
        Ok(session)
    }
}
