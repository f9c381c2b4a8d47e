//! Unified error type for Peerlink.

use peerlink_protocol::ProtocolError;
use peerlink_session::SessionError;
use peerlink_state::CommandRejected;
use peerlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift any layer's error into this
/// one.
#[derive(Debug, thiserror::Error)]
pub enum PeerlinkError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A single frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lifecycle error (torn down, failed to start).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A command failed a local precondition.
    #[error(transparent)]
    Rejected(#[from] CommandRejected),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: PeerlinkError = err.into();
        assert!(matches!(top, PeerlinkError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let top: PeerlinkError = err.into();
        assert!(matches!(top, PeerlinkError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let top: PeerlinkError = SessionError::TornDown.into();
        assert!(matches!(top, PeerlinkError::Session(_)));
        assert_eq!(top.to_string(), "session is torn down");
    }

    #[test]
    fn test_from_rejection() {
        let top: PeerlinkError = CommandRejected::EmptyText.into();
        assert!(matches!(top, PeerlinkError::Rejected(CommandRejected::EmptyText)));
    }
}
