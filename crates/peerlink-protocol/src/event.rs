//! Inbound event classification.
//!
//! The relay and the peers behind it do not agree on one message shape.
//! Chat frames arrive as `{"type":"msg",...}`, `{"type":"message",...}`
//! or as a bare `{"payload":{...}}`, and each sender spells the sender
//! and body fields differently. Instead of a derived `Deserialize`, frames
//! are parsed to a `serde_json::Value` and classified by hand so the
//! fallback chains below can be applied exactly:
//!
//! | field     | fallback order                                   |
//! |-----------|--------------------------------------------------|
//! | channel   | `channel`, then the default channel              |
//! | from      | `from`, `peer_id`, then `"unknown"`              |
//! | text      | `text`, `msg`, then the payload dumped as JSON   |
//! | timestamp | `ts`, then the decoder's clock                   |
//!
//! A field only counts if it is "truthy": not null, not `false`, not `0`
//! and not the empty string.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::{ChannelId, ChatMessage, Codec, JsonCodec, PeerId, PeerInfo, ProtocolError};

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The relay assigned (or confirmed) our identity.
    Connected { peer_id: Option<PeerId> },

    /// Full replacement of the known peer map.
    Peers(BTreeMap<PeerId, PeerInfo>),

    /// A normalized chat message.
    Chat(ChatMessage),

    /// We are now a member of this channel.
    JoinedChannel(ChannelId),

    /// A peer link came up.
    PeerConnected(PeerId),

    /// A peer link went down.
    PeerDisconnected(PeerId),

    /// Outcome of an earlier `connect` command.
    ConnectResult { ok: bool, info: String },

    /// Anything else. Kept so new relay event kinds pass through the
    /// pipeline without breaking it.
    Unrecognized { kind: Option<String> },
}

impl InboundEvent {
    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Peers(_) => "peers",
            Self::Chat(_) => "msg",
            Self::JoinedChannel(_) => "joined_channel",
            Self::PeerConnected(_) => "peer_connected",
            Self::PeerDisconnected(_) => "peer_disconnected",
            Self::ConnectResult { .. } => "connect_result",
            Self::Unrecognized { kind } => kind.as_deref().unwrap_or("<none>"),
        }
    }
}

/// Turns raw frames into [`InboundEvent`]s.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    default_channel: ChannelId,
    clock: fn() -> f64,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder {
    /// Creates a decoder that files unaddressed chat under `"general"`
    /// and stamps untimed chat with the system clock.
    pub fn new() -> Self {
        Self {
            default_channel: ChannelId::general(),
            clock: unix_now,
        }
    }

    /// Overrides the channel used for chat frames that name none.
    pub fn with_default_channel(mut self, channel: ChannelId) -> Self {
        self.default_channel = channel;
        self
    }

    /// Overrides the clock used for chat frames without `ts`.
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    /// Parses and classifies one text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the frame is not JSON. The
    /// caller should drop the frame and keep the connection.
    pub fn decode(&self, frame: &str) -> Result<InboundEvent, ProtocolError> {
        let value: Value = JsonCodec.decode(frame.as_bytes())?;
        Ok(self.classify(&value))
    }

    /// Classifies an already-parsed frame. Never fails.
    pub fn classify(&self, frame: &Value) -> InboundEvent {
        let kind = frame.get("type").and_then(Value::as_str);

        match kind {
            Some("connected") => InboundEvent::Connected {
                peer_id: truthy_text(frame.get("peer_id")).map(PeerId::from),
            },
            Some("peers") => InboundEvent::Peers(parse_peers(frame.get("peers"))),
            Some("msg" | "message") => InboundEvent::Chat(self.normalize_chat(frame)),
            _ if frame.get("payload").is_some_and(is_truthy) => {
                InboundEvent::Chat(self.normalize_chat(frame))
            }
            Some("joined_channel") => match truthy_text(frame.get("channel")) {
                Some(channel) => InboundEvent::JoinedChannel(ChannelId::from(channel)),
                None => unrecognized(kind),
            },
            Some("peer_connected") => match truthy_text(frame.get("peer_id")) {
                Some(peer) => InboundEvent::PeerConnected(PeerId::from(peer)),
                None => unrecognized(kind),
            },
            Some("peer_disconnected") => match truthy_text(frame.get("peer_id")) {
                Some(peer) => InboundEvent::PeerDisconnected(PeerId::from(peer)),
                None => unrecognized(kind),
            },
            Some("connect_result") => InboundEvent::ConnectResult {
                ok: frame.get("ok").is_some_and(is_truthy),
                info: frame.get("info").map(text_of).unwrap_or_default(),
            },
            _ => unrecognized(kind),
        }
    }

    /// Applies the chat fallback chains to a chat-shaped frame.
    fn normalize_chat(&self, frame: &Value) -> ChatMessage {
        let p = match frame.get("payload") {
            Some(payload) if is_truthy(payload) => payload,
            _ => frame,
        };

        let channel = truthy_text(p.get("channel"))
            .map(ChannelId::from)
            .unwrap_or_else(|| self.default_channel.clone());
        let from = truthy_text(p.get("from"))
            .or_else(|| truthy_text(p.get("peer_id")))
            .map(PeerId::from)
            .unwrap_or_else(PeerId::unknown);
        let text = truthy_text(p.get("text"))
            .or_else(|| truthy_text(p.get("msg")))
            .unwrap_or_else(|| p.to_string());
        let timestamp = p
            .get("ts")
            .filter(|v| is_truthy(v))
            .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
            .unwrap_or_else(self.clock);

        ChatMessage {
            channel,
            from,
            text,
            timestamp,
        }
    }
}

fn unrecognized(kind: Option<&str>) -> InboundEvent {
    InboundEvent::Unrecognized {
        kind: kind.map(str::to_string),
    }
}

/// Parses `{"peerId": {"ip": ..., "port": ...}, ...}`.
///
/// A missing or non-object map is treated as empty; entries that do not
/// parse are skipped one by one.
fn parse_peers(peers: Option<&Value>) -> BTreeMap<PeerId, PeerInfo> {
    let Some(Value::Object(entries)) = peers else {
        return BTreeMap::new();
    };

    let mut out = BTreeMap::new();
    for (id, info) in entries {
        match serde_json::from_value::<PeerInfo>(info.clone()) {
            Ok(info) => {
                out.insert(PeerId::new(id.as_str()), info);
            }
            Err(e) => {
                tracing::debug!(peer_id = %id, error = %e, "skipping malformed peer entry");
            }
        }
    }
    out
}

/// JavaScript-style truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A value as display text: strings verbatim, everything else as JSON.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy_text(value: Option<&Value>) -> Option<String> {
    value.filter(|v| is_truthy(v)).map(text_of)
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
