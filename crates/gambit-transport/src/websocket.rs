//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The listener serves two kinds of client on one port: browsers that
//! upgrade to a WebSocket, and load balancers that poll a plain HTTP
//! liveness route. The first bytes of each TCP stream are peeked (not
//! consumed) to tell them apart.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Route answered with `200 ok` instead of a WebSocket upgrade.
pub const DEFAULT_HEALTH_PATH: &str = "/healthz";

/// How long a fresh TCP stream may take to identify itself and finish
/// the opening handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on an HTTP probe request head we are willing to drain.
const MAX_PROBE_HEAD: usize = 8 * 1024;

const PROBE_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
content-type: text/plain\r\n\
content-length: 2\r\n\
connection: close\r\n\
\r\n\
ok";

/// Finished handshakes waiting for [`accept`](Transport::accept).
const ACCEPT_BACKLOG: usize = 64;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

type Accepted = Result<WebSocketConnection, TransportError>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// The listener moves into a background task on the first
/// [`accept`](Transport::accept). Each TCP stream is classified and
/// upgraded on a task of its own, so a client that stalls mid-handshake
/// never holds up the next one.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    listener: Option<TcpListener>,
    health_path: String,
    incoming: Option<mpsc::Receiver<Accepted>>,
    closed: watch::Sender<bool>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let bind_failed = |source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_failed)?;
        let local_addr = listener.local_addr().map_err(bind_failed)?;
        tracing::info!(addr, %local_addr, "WebSocket transport listening");

        let (closed, _) = watch::channel(false);
        Ok(Self {
            local_addr,
            listener: Some(listener),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            incoming: None,
            closed,
        })
    }

    /// Replaces the liveness route (default [`DEFAULT_HEALTH_PATH`]).
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// The address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    fn start_acceptor(&mut self) -> Result<&mut mpsc::Receiver<Accepted>, TransportError> {
        if self.incoming.is_none() {
            let listener = self.listener.take().ok_or(TransportError::Shutdown)?;
            let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
            tokio::spawn(run_acceptor(
                listener,
                Arc::from(self.health_path.as_str()),
                tx,
                self.closed.subscribe(),
            ));
            self.incoming = Some(rx);
        }
        self.incoming.as_mut().ok_or(TransportError::Shutdown)
    }
}

/// Owns the listener until shutdown, handing each stream to [`admit`].
async fn run_acceptor(
    listener: TcpListener,
    health_path: Arc<str>,
    accepted: mpsc::Sender<Accepted>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        let (stream, addr) = tokio::select! {
            result = listener.accept() => match result {
                Ok(pair) => pair,
                Err(e) => {
                    if accepted.send(Err(TransportError::Accept(e))).await.is_err() {
                        return;
                    }
                    continue;
                }
            },
            // Drop the non-Send `watch::Ref` before the select output is held across an await.
            _ = async { let _ = closed.wait_for(|closed| *closed).await; } => {
                tracing::debug!("acceptor stopped");
                return;
            }
        };

        let health_path = Arc::clone(&health_path);
        let accepted = accepted.clone();
        tokio::spawn(async move {
            if let Some(result) = admit(stream, addr, &health_path).await {
                // The transport may be gone already.
                let _ = accepted.send(result).await;
            }
        });
    }
}

/// Classifies a fresh stream and finishes its opening handshake.
///
/// Liveness probes are answered here and yield `None`, as do streams
/// that never identify themselves.
async fn admit(stream: TcpStream, addr: SocketAddr, health_path: &str) -> Option<Accepted> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, is_health_probe(&stream, health_path)).await {
        Ok(Ok(true)) => {
            tracing::trace!(%addr, "liveness probe");
            if let Err(e) = answer_probe(stream).await {
                tracing::debug!(%addr, error = %e, "liveness probe write failed");
            }
            return None;
        }
        Ok(Ok(false)) => {}
        Ok(Err(e)) => {
            tracing::debug!(%addr, error = %e, "peek failed, dropping stream");
            return None;
        }
        Err(_) => {
            tracing::debug!(%addr, "client sent nothing, dropping stream");
            return None;
        }
    }

    let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => return Some(Err(TransportError::Handshake(e.to_string()))),
        Err(_) => return Some(Err(TransportError::Handshake("timed out".to_string()))),
    };

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    let (sink, stream) = ws.split();
    Some(Ok(WebSocketConnection {
        id,
        remote_addr: addr,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    }))
}

/// Whether the stream starts with `GET <health_path> `.
async fn is_health_probe(stream: &TcpStream, health_path: &str) -> std::io::Result<bool> {
    let probe = format!("GET {health_path} ").into_bytes();
    let mut buf = vec![0u8; probe.len()];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 || buf[..n] != probe[..n] {
            return Ok(false);
        }
        if n == probe.len() {
            return Ok(true);
        }
        // A prefix matched but the rest hasn't arrived yet.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Drains the probe's request head and answers `200 ok`.
async fn answer_probe(mut stream: TcpStream) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_PROBE_HEAD {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    stream.write_all(PROBE_RESPONSE).await?;
    stream.shutdown().await
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Accepts the next WebSocket client. Liveness probes arriving in
    /// between are answered on the side and never returned.
    ///
    /// Cancel-safe: a connection that finished its handshake while the
    /// caller was busy stays queued for the next call.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if *self.closed.borrow() {
            return Err(TransportError::Shutdown);
        }
        let incoming = self.start_acceptor()?;
        incoming.recv().await.unwrap_or(Err(TransportError::Shutdown))
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.closed.send_replace(true);
        tracing::info!("WebSocket transport shut down");
        Ok(())
    }
}

/// A single WebSocket connection.
///
/// The write and read halves sit behind separate locks, so a task parked
/// in [`recv`](Connection::recv) never delays a broadcast going out.
pub struct WebSocketConnection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

fn send_failed(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::Send(e.to_string())
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 payloads go out as text frames (what browsers expect for
    /// JSON), anything else as binary.
    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(frame) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(frame.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(send_failed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(send_failed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
