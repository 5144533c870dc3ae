//! `GambitServer` builder and accept loop.
//!
//! This is the entry point for running a Gambit session server. It ties
//! together all the layers: transport → protocol → dispatcher → rooms.

use std::future::Future;
use std::time::Duration;

use gambit_protocol::JsonCodec;
use gambit_room::{spawn_dispatcher, DispatcherHandle, RoomConfig};
use gambit_session::SessionConfig;
use gambit_transport::{Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{GambitError, ServerConfig};

/// Builder for configuring and starting a Gambit server.
///
/// # Example
///
/// ```rust,ignore
/// use gambit::prelude::*;
///
/// let server = GambitServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct GambitServerBuilder {
    config: ServerConfig,
    bind_addr: Option<String>,
    room_config: RoomConfig,
}

impl GambitServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bind_addr: None,
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind, overriding the config's `host:port`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn room_config(mut self, room_config: RoomConfig) -> Self {
        self.room_config = room_config;
        self
    }

    /// Binds the listener and starts the room dispatcher.
    ///
    /// Uses `JsonCodec` on a `WebSocketTransport`.
    pub async fn build(self) -> Result<GambitServer, GambitError> {
        let addr = self.bind_addr.unwrap_or_else(|| self.config.bind_addr());
        let transport = WebSocketTransport::bind(&addr)
            .await?
            .with_health_path(self.config.health_path.clone());

        let session_config = SessionConfig {
            max_sessions: self.config.max_sessions,
            ..SessionConfig::default()
        };
        let dispatcher = spawn_dispatcher(self.room_config, session_config);

        Ok(GambitServer {
            transport,
            dispatcher,
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
        })
    }
}

impl Default for GambitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Gambit server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GambitServer {
    transport: WebSocketTransport,
    dispatcher: DispatcherHandle,
    codec: JsonCodec,
    idle_timeout: Duration,
}

impl GambitServer {
    pub fn builder() -> GambitServerBuilder {
        GambitServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the room dispatcher, e.g. for [`stats`](DispatcherHandle::stats).
    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), GambitError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops the
    /// transport and the dispatcher.
    ///
    /// Connections already open stay up until their peers leave; their
    /// requests fail with `UNAVAILABLE` once the dispatcher is gone.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), GambitError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Gambit server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let dispatcher = self.dispatcher.clone();
                        let codec = self.codec;
                        let idle_timeout = self.idle_timeout;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, dispatcher, codec, idle_timeout).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(TransportError::Handshake(reason)) => {
                        tracing::debug!(%reason, "WebSocket handshake failed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },

                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        if let Ok(stats) = self.dispatcher.stats().await {
            tracing::info!(
                rooms = stats.rooms,
                sessions = stats.sessions,
                moves_relayed = stats.moves_relayed,
                "Gambit server stopping"
            );
        }
        self.transport.shutdown().await?;
        // Already gone is fine.
        let _ = self.dispatcher.shutdown().await;
        Ok(())
    }
}
