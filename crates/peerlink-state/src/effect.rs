//! What a state transition asks the outside world to do.

use peerlink_protocol::Command;
use peerlink_transport::ConnectionStatus;

/// Output of a reducer step.
///
/// The reducer never touches the socket. It returns effects and the
/// owner executes them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Transmit a command to the relay.
    Send(Command),
    /// Surface something to the user.
    Notice(Notice),
}

/// A user-visible event that is not part of the state itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The relay could not set up a peer link.
    ConnectFailed { info: String },
    /// The relay socket changed status.
    StatusChanged(ConnectionStatus),
}
