/// Errors that can occur in the transport layer.
///
/// None of these are fatal to the client: the driver reports them as a
/// status transition and schedules the next connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No endpoint has been configured yet.
    #[error("no endpoint configured")]
    NoEndpoint,

    /// Opening the socket failed.
    #[error("connect to {url} failed: {source}")]
    ConnectFailed {
        /// The URL that was dialed.
        url: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
