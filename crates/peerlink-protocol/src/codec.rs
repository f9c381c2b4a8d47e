//! Codec trait and the JSON implementation.
//!
//! The relay speaks one JSON object per text frame. Everything that turns
//! Rust values into frame text, or frame text into `serde_json::Value`,
//! goes through a [`Codec`] so the text format is decided in one place.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts values to frame bytes and back.
///
/// `Send + Sync + 'static` because the session controller shares its
/// codec with transport callbacks that run on the driver task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into frame bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes frame bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes a value as frame text.
    ///
    /// # Errors
    /// Fails like [`encode`](Self::encode), or with
    /// `ProtocolError::InvalidMessage` if the codec produced non-UTF-8.
    fn encode_text<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use peerlink_protocol::{Codec, Command, JsonCodec};
///
/// let text = JsonCodec.encode_text(&Command::ListPeers).unwrap();
/// assert_eq!(text, r#"{"cmd":"list_peers"}"#);
///
/// let back: Command = JsonCodec.decode(text.as_bytes()).unwrap();
/// assert_eq!(back, Command::ListPeers);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<serde_json::Value, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_text_is_compact_json() {
        let text = JsonCodec
            .encode_text(&serde_json::json!({ "cmd": "join", "channel": "general" }))
            .unwrap();
        assert!(!text.contains('\n'));
        assert!(text.contains(r#""cmd":"join""#));
    }
}
