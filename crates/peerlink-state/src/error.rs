//! Local command rejections.

use peerlink_protocol::ChannelId;
use peerlink_transport::ConnectionStatus;

/// A user command that failed a local precondition and was not sent.
///
/// Nothing in the state is rolled back because nothing was committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejected {
    /// The relay socket is not open.
    #[error("not connected (status: {0})")]
    NotConnected(ConnectionStatus),

    /// Message text was empty or whitespace only.
    #[error("message text is empty")]
    EmptyText,

    /// The reserved channel cannot be joined, selected, or written to.
    #[error("channel {0} is reserved")]
    ReservedChannel(ChannelId),

    /// A channel name was empty.
    #[error("channel name is empty")]
    EmptyChannel,

    /// A peer id was empty.
    #[error("peer id is empty")]
    EmptyPeer,
}
