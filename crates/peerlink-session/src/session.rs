//! Session configuration, credentials, and the controller lifecycle.

use std::fmt;
use std::time::Duration;

use peerlink_protocol::{ChannelId, PeerId};
use peerlink_transport::{DEFAULT_WS_PATH, Endpoint};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// How the controller reaches the relay and sets up its state.
///
/// Start from `SessionConfig::default()` and override what you need:
///
/// ```rust
/// use std::time::Duration;
/// use peerlink_session::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_host("relay.local")
///     .with_secure_origin(true)
///     .with_reconnect_delay(Duration::from_secs(2));
/// assert_eq!(config.endpoint_for(7000).url(), "wss://relay.local:7000/ws");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay host name or address.
    pub host: String,

    /// Whether the hosting context was loaded over a secure origin. Picks
    /// `wss` over `ws`.
    pub secure_origin: bool,

    /// WebSocket request path on the relay.
    pub ws_path: String,

    /// Channel joined and shown at startup, and used for chat frames that
    /// name no channel.
    pub default_channel: ChannelId,

    /// Fixed delay before reconnecting after an unexpected close.
    ///
    /// Default: 1.5 seconds. There is no backoff and no retry limit.
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            secure_origin: false,
            ws_path: DEFAULT_WS_PATH.to_string(),
            default_channel: ChannelId::general(),
            reconnect_delay: Duration::from_millis(1500),
        }
    }
}

impl SessionConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_secure_origin(mut self, secure: bool) -> Self {
        self.secure_origin = secure;
        self
    }

    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    pub fn with_default_channel(mut self, channel: impl Into<ChannelId>) -> Self {
        self.default_channel = channel.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Resolves the relay endpoint for `port` from this config.
    pub fn endpoint_for(&self, port: u16) -> Endpoint {
        Endpoint::resolve(self.host.clone(), port, self.secure_origin).with_path(self.ws_path.clone())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// What the authentication exchange hands over before the controller is
/// built. Both parts are optional: without a peer id the relay assigns
/// one, and without a port the controller waits for an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub peer_id: Option<PeerId>,
    pub ws_port: Option<u16>,
}

impl Credentials {
    pub fn new(peer_id: impl Into<PeerId>, ws_port: u16) -> Self {
        Self {
            peer_id: Some(peer_id.into()),
            ws_port: Some(ws_port),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of a [`SessionController`](crate::SessionController).
///
/// ```text
/// Uninitialized ──→ AwaitingEndpoint ⇄ Active
///       │                  │             │
///       └──────────────────┴─────────────┴──→ TornDown
/// ```
///
/// - **Uninitialized**: only seen during construction.
/// - **AwaitingEndpoint**: built without a usable endpoint, or between
///   two endpoints.
/// - **Active**: a transport is running against an endpoint.
/// - **TornDown**: closed for good. The transport is stopped and no
///   reconnect will happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Uninitialized,
    AwaitingEndpoint,
    Active,
    TornDown,
}

impl Lifecycle {
    /// Returns `true` if moving from `self` to `next` is legal.
    pub fn can_transition_to(self, next: Self) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Uninitialized, AwaitingEndpoint)
                | (Uninitialized, Active)
                | (AwaitingEndpoint, Active)
                | (Active, AwaitingEndpoint)
                | (Uninitialized | AwaitingEndpoint | Active, TornDown)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingEndpoint => "awaiting-endpoint",
            Self::Active => "active",
            Self::TornDown => "torn-down",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.secure_origin);
        assert_eq!(config.default_channel.as_str(), "general");
        assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_endpoint_for_uses_config() {
        let config = SessionConfig::default().with_ws_path("relay");
        assert_eq!(config.endpoint_for(7001).url(), "ws://127.0.0.1:7001/relay");
    }

    #[test]
    fn test_lifecycle_transitions() {
        use Lifecycle::*;
        assert!(Uninitialized.can_transition_to(AwaitingEndpoint));
        assert!(AwaitingEndpoint.can_transition_to(Active));
        assert!(Active.can_transition_to(AwaitingEndpoint));
        assert!(Active.can_transition_to(TornDown));
        assert!(!TornDown.can_transition_to(Active));
        assert!(!TornDown.can_transition_to(TornDown));
        assert!(!Active.can_transition_to(Uninitialized));
    }

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("p1", 7001);
        assert_eq!(creds.peer_id, Some(PeerId::new("p1")));
        assert_eq!(creds.ws_port, Some(7001));
        assert_eq!(Credentials::default().ws_port, None);
    }
}
