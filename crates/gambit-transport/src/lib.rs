//! Network endpoint for Gambit.
//!
//! The server loop is written against two small traits: a [`Transport`]
//! hands out [`Connection`]s, and a connection moves whole frames in both
//! directions. [`WebSocketTransport`] is the one implementation; besides
//! WebSocket clients it answers a plain HTTP liveness probe on the same
//! port.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{DEFAULT_HEALTH_PATH, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique number of an accepted connection. Only used in logs;
/// peers are identified by their session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener producing connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops handing out connections. Every later `accept` fails.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer's duplex frame channel.
///
/// `send` may run while another task is parked in `recv`; broadcasts
/// never queue behind a slow reader.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error>;

    /// The next frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn remote_addr(&self) -> SocketAddr;
}
