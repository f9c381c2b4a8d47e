//! Wire protocol for Peerlink.
//!
//! This crate defines what the client and the relay say to each other:
//!
//! - **Types** ([`PeerId`], [`ChannelId`], [`ChatMessage`], [`Command`]):
//!   identities and the outbound command set.
//! - **Events** ([`InboundEvent`], [`EventDecoder`]): inbound frames
//!   classified into a closed set, with the legacy chat shapes folded in.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values become frame
//!   text and back.
//! - **Errors** ([`ProtocolError`]): a single bad frame.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw text frames) and
//! the chat state reducer. It knows nothing about sockets or about what
//! the client does with an event.
//!
//! ```text
//! Transport (text) → Protocol (InboundEvent) → State (ChatState)
//! ```

mod codec;
mod error;
mod event;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use event::{EventDecoder, InboundEvent};
pub use types::{ChannelId, ChatMessage, Command, PeerId, PeerInfo};
