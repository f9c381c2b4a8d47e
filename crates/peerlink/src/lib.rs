//! # Peerlink
//!
//! Client core for a peer-to-peer chat relay.
//!
//! Peerlink keeps one persistent WebSocket connection to a relay,
//! rebuilds peers, channels and message histories from the relay's event
//! stream, and exposes the result as a [`ChatView`](peerlink_state::ChatView)
//! snapshot plus a small command API.
//!
//! ## Layers
//!
//! | Crate | Role |
//! |---|---|
//! | [`transport`] | reconnecting socket, status feed, subscriber fan-out |
//! | [`protocol`] | outbound commands, inbound event classification |
//! | [`state`] | event-sourced chat state and unread bookkeeping |
//! | [`session`] | lifecycle and the command API |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peerlink::prelude::*;
//!
//! # async fn run() -> Result<(), PeerlinkError> {
//! let session = ClientBuilder::new().port(7000).build()?;
//! let mut views = session.subscribe_view();
//! while views.changed().await.is_ok() {
//!     let view = views.borrow().clone();
//!     println!("{} unread in {} channels", view.total_unread(), view.channels.len());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::ClientBuilder;
pub use error::PeerlinkError;

pub use peerlink_protocol as protocol;
pub use peerlink_session as session;
pub use peerlink_state as state;
pub use peerlink_transport as transport;

/// Everything a typical client needs.
pub mod prelude {
    pub use crate::{ClientBuilder, PeerlinkError};
    pub use peerlink_protocol::{ChannelId, ChatMessage, PeerId, PeerInfo};
    pub use peerlink_session::{
        Credentials, Lifecycle, SessionConfig, SessionController, SessionError,
    };
    pub use peerlink_state::{ChatView, CommandRejected, Notice, dm_channel};
    pub use peerlink_transport::{ConnectionStatus, Endpoint};
}
