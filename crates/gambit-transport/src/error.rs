//! Transport failures.

use std::io;

/// What went wrong below the protocol layer.
///
/// None of these are reported to peers; the server logs them and drops
/// the affected connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The listener failed to hand out a TCP stream.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The WebSocket opening handshake failed or timed out.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    /// `shutdown` was called; no further connections are accepted.
    #[error("transport shut down")]
    Shutdown,
}
