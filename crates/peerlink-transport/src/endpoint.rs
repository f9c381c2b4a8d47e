//! Connection targets and transport tuning.

use std::fmt;
use std::time::Duration;

/// Port used when the authentication exchange did not hand one out.
pub const DEFAULT_WS_PORT: u16 = 7000;

/// Path the relay serves its WebSocket endpoint on.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// A fully resolved WebSocket endpoint.
///
/// The scheme is fixed at resolution time: `wss` when the hosting context
/// was loaded over a secure origin, `ws` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address of the relay.
    pub host: String,
    /// TCP port of the relay's WebSocket listener.
    pub port: u16,
    /// Whether to use the secure (`wss`) scheme.
    pub secure: bool,
    /// Request path, always starting with `/`.
    pub path: String,
}

impl Endpoint {
    /// Resolves an endpoint from the pieces handed over by the
    /// authentication collaborator.
    pub fn resolve(host: impl Into<String>, port: u16, secure_origin: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure: secure_origin,
            path: DEFAULT_WS_PATH.to_string(),
        }
    }

    /// Overrides the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Returns `"ws"` or `"wss"`.
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Renders the endpoint as a URL suitable for `connect_async`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme(), self.host, self.port, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Tuning knobs for the reconnecting transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Fixed delay between an unexpected close and the next connect
    /// attempt. There is no backoff growth and no retry ceiling.
    pub reconnect_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(1500),
        }
    }
}

impl TransportConfig {
    /// Creates a config with the given reconnect delay.
    pub fn with_reconnect_delay(reconnect_delay: Duration) -> Self {
        Self { reconnect_delay }
    }
}
