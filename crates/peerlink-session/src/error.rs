//! Error types for the session layer.

use peerlink_transport::TransportError;

/// Errors from controller lifecycle operations.
///
/// Command methods never return these; they report
/// [`CommandRejected`](peerlink_state::CommandRejected) instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The controller was closed and cannot be reused.
    #[error("session is torn down")]
    TornDown,

    /// The transport could not be started, e.g. outside a Tokio runtime.
    #[error("transport did not start for {0}")]
    StartFailed(String),

    /// The transport failed while shutting down.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
