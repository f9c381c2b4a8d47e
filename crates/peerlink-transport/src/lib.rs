//! Client transport layer for Peerlink.
//!
//! Owns exactly one logical WebSocket connection to a relay endpoint and
//! exposes three things to the layers above:
//!
//! - a fire-and-forget [`send`](WebSocketTransport::send) that only
//!   transmits while connected,
//! - a broadcast feed of inbound text frames,
//! - a feed of [`ConnectionStatus`] transitions.
//!
//! When the socket drops unexpectedly the driver reconnects after a fixed
//! delay, forever, until its owner shuts it down.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`

mod endpoint;
mod error;
mod registry;
#[cfg(feature = "websocket")]
mod websocket;

pub use endpoint::{DEFAULT_WS_PATH, DEFAULT_WS_PORT, Endpoint, TransportConfig};
pub use error::TransportError;
pub use registry::{Registry, Subscription};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::fmt;

/// The state of the transport's socket.
///
/// Exactly one value holds at a time. Transitions follow the connection
/// attempt cycle:
///
/// ```text
/// Idle → Connecting → Connected ──→ Closed → Connecting → …
///             │          │            ↑
///             │          └──→ Error ──┤
///             └──→ Error ─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// Never connected.
    #[default]
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// The socket is open.
    Connected,
    /// The socket is closed; a reconnect may be pending.
    Closed,
    /// The attempt or the live socket failed. Always followed by `Closed`.
    Error,
}

impl ConnectionStatus {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Closed)
                | (Connected, Closed)
                | (Connected, Error)
                | (Error, Closed)
                | (Closed, Connecting)
        )
    }

    /// Returns `true` if outbound frames can be transmitted.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lowercase wire-style name, as shown to users.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
