//! Core protocol types for Peerlink's wire format.
//!
//! Identity newtypes, the peer address record, the normalized chat
//! message, and the outbound [`Command`] set. Inbound events live in
//! [`crate::event`] because they are classified by hand rather than
//! derived.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a peer, unique within a session.
///
/// `#[serde(transparent)]` keeps it a bare JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Sentinel used before the relay has told us who we are, and for
    /// chat frames that name no sender.
    pub const UNKNOWN: &'static str = "unknown";

    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The `"unknown"` sentinel.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Returns `true` for the `"unknown"` sentinel.
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque name of a message stream.
///
/// One value, [`ChannelId::META`], is reserved by the relay for internal
/// bookkeeping. It may show up in events but is never shown to users or
/// selectable by them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// The channel every client starts in.
    pub const DEFAULT: &'static str = "general";

    /// The reserved, hidden channel.
    pub const META: &'static str = "__meta__";

    /// Wraps a raw channel name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The default `"general"` channel.
    pub fn general() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Returns `true` for the reserved `"__meta__"` channel.
    pub fn is_meta(&self) -> bool {
        self.0 == Self::META
    }

    /// Borrows the raw channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ---------------------------------------------------------------------------
// Peer and message records
// ---------------------------------------------------------------------------

/// Network address metadata the relay publishes for a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer's advertised address.
    pub ip: String,
    /// Peer's advertised port.
    pub port: u16,
}

/// A chat message after normalization.
///
/// Immutable once appended to a channel's history. `timestamp` is seconds
/// since the Unix epoch, fractional, and travels as `ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Channel the message belongs to.
    pub channel: ChannelId,
    /// Sender, or the `"unknown"` sentinel.
    pub from: PeerId,
    /// Message body.
    pub text: String,
    /// Send time in seconds since the epoch.
    #[serde(rename = "ts")]
    pub timestamp: f64,
}

// ---------------------------------------------------------------------------
// Command (client → relay)
// ---------------------------------------------------------------------------

/// A request the client sends to the relay.
///
/// Internally tagged on `cmd`, so `Command::Join { channel }` goes out as
/// `{"cmd":"join","channel":"general"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Ask for the current peer map. Answered with a `peers` event.
    ListPeers,

    /// Ask for server-side membership of a channel.
    Join { channel: ChannelId },

    /// Create a room, optionally scoped to a single peer (direct messages).
    CreateRoom {
        channel: ChannelId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_peer: Option<PeerId>,
    },

    /// Ask the relay to set up a peer-to-peer link.
    Connect { peer_id: PeerId },

    /// Publish a message on a channel.
    Broadcast { channel: ChannelId, text: String },
}

impl Command {
    /// The `cmd` tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListPeers => "list_peers",
            Self::Join { .. } => "join",
            Self::CreateRoom { .. } => "create_room",
            Self::Connect { .. } => "connect",
            Self::Broadcast { .. } => "broadcast",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
