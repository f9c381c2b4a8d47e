//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means one frame was bad. It never says
//! anything about the connection: the frame is dropped, the error is
//! logged, and the stream carries on.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound command failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// An inbound frame was not valid JSON.
    ///
    /// Common causes: truncated frames, plain-text debug output from the
    /// relay, or a sender that is not speaking this protocol at all.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but cannot be used, e.g. it is not UTF-8 text.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
