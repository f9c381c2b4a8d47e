//! Session control for the Peerlink chat client.
//!
//! The [`SessionController`] is the composition root: it owns one
//! reconnecting transport, decodes every inbound frame, folds it into a
//! [`ChatState`](peerlink_state::ChatState), sends whatever the reducer
//! asks for, and republishes the result.
//!
//! # How it fits in the stack
//!
//! ```text
//! Presentation (above)  ← renders ChatView, calls command methods
//!     ↕
//! Session Layer (this crate)  ← lifecycle, command gating, effect execution
//!     ↕
//! State / Protocol / Transport (below)
//! ```
//!
//! # Lifecycle
//!
//! A controller built from [`Credentials`] with a port connects at once;
//! without one it waits in [`Lifecycle::AwaitingEndpoint`] until
//! [`SessionController::set_endpoint`]. [`SessionController::close`]
//! (or dropping the controller) stops the transport for good.

mod controller;
mod error;
mod session;

pub use controller::SessionController;
pub use error::SessionError;
pub use session::{Credentials, Lifecycle, SessionConfig};

pub use peerlink_state::{ChatView, CommandRejected, Notice};
