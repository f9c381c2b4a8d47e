//! Event-sourced chat state for Peerlink.
//!
//! [`ChatState`] owns everything the client knows: identity, peers, the
//! signaling-level connection set, joined channels, per-channel history
//! and read markers. It changes only through:
//!
//! - [`ChatState::apply`] for an [`InboundEvent`](peerlink_protocol::InboundEvent),
//! - [`ChatState::set_status`] for a transport status transition,
//! - the local command methods (`join`, `create_room`, ...).
//!
//! Each returns a list of [`Effect`]s (commands to send, notices to show)
//! that the owner executes. The reducer never does I/O, so it is tested
//! without a socket.
//!
//! ```text
//! InboundEvent ─→ ChatState::apply ─→ Vec<Effect> ─→ Transport / UI
//! ```

mod effect;
mod error;
mod state;
mod view;

pub use effect::{Effect, Notice};
pub use error::CommandRejected;
pub use state::ChatState;
pub use view::ChatView;

use peerlink_protocol::{ChannelId, PeerId};

/// Prefix of direct-message channel names.
pub const DM_PREFIX: &str = "dm";

/// Derives the direct-message channel shared by `a` and `b`.
///
/// The two ids are sorted before joining, so both participants arrive at
/// the same name regardless of who starts the conversation. Ids are ordered
/// by UTF-16 code units, matching the browser client, so mixed clients
/// agree on the name even for ids outside the Basic Multilingual Plane.
///
/// ```rust
/// use peerlink_protocol::PeerId;
/// use peerlink_state::dm_channel;
///
/// let a = PeerId::new("bob");
/// let b = PeerId::new("alice");
/// assert_eq!(dm_channel(&a, &b).as_str(), "dm:alice:bob");
/// assert_eq!(dm_channel(&a, &b), dm_channel(&b, &a));
/// ```
pub fn dm_channel(a: &PeerId, b: &PeerId) -> ChannelId {
    let in_order = a.as_str().encode_utf16().le(b.as_str().encode_utf16());
    let (low, high) = if in_order { (a, b) } else { (b, a) };
    ChannelId::new(format!("{DM_PREFIX}:{low}:{high}"))
}
