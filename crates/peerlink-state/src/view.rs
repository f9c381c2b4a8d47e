//! Read-only snapshot handed to the presentation layer.

use std::collections::{BTreeMap, BTreeSet};

use peerlink_protocol::{ChannelId, ChatMessage, PeerId, PeerInfo};
use peerlink_transport::ConnectionStatus;

/// Everything a UI needs to render one frame.
///
/// Built by [`ChatState::view`](crate::ChatState::view). The reserved
/// channel never appears in `channels` or `unread`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    /// Local identity, or the `"unknown"` sentinel.
    pub me: PeerId,
    /// Relay socket status.
    pub status: ConnectionStatus,
    /// Known peers.
    pub peers: BTreeMap<PeerId, PeerInfo>,
    /// Peers with a live signaling-level link.
    pub connections: BTreeSet<PeerId>,
    /// Joined channels in join order.
    pub channels: Vec<ChannelId>,
    /// The active channel.
    pub current: ChannelId,
    /// History of the active channel.
    pub messages: Vec<ChatMessage>,
    /// Unread count per channel, including joined channels with no
    /// messages.
    pub unread: BTreeMap<ChannelId, usize>,
}

impl ChatView {
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Unread count of one channel; 0 for channels never seen.
    pub fn unread_in(&self, channel: &ChannelId) -> usize {
        self.unread.get(channel).copied().unwrap_or(0)
    }

    pub fn total_unread(&self) -> usize {
        self.unread.values().sum()
    }
}
