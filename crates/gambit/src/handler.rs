//! Per-connection handler: welcome, request routing and broadcast fan-out.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the dispatcher → receive a session id
//!   2. Send `Welcome` carrying that id
//!   3. Loop: inbound frames → dispatcher requests, outbound broadcasts →
//!      `Event` frames, until the peer closes or goes idle

use std::time::{Duration, Instant};

use gambit_protocol::{Codec, Envelope, Payload, Reply, ServerEvent, SessionId, PROTOCOL_VERSION};
use gambit_room::DispatcherHandle;
use gambit_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::GambitError;

/// Drop guard that reports the disconnect when the handler exits.
///
/// Covers every exit path, including a panic in the handler. `Drop` is
/// synchronous, so the report goes out on a fire-and-forget task.
struct SessionGuard {
    session: SessionId,
    dispatcher: DispatcherHandle,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session = self.session.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.disconnect(session).await;
        });
    }
}

/// Writes envelopes to one connection, numbering them as it goes.
struct Outbound<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outbound<'_, C> {
    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    async fn send(&mut self, payload: Payload) -> Result<(), GambitError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.elapsed_ms(),
            payload,
        };
        self.seq += 1;
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    dispatcher: DispatcherHandle,
    codec: C,
    idle_timeout: Duration,
) -> Result<(), GambitError> {
    let conn_id = conn.id();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let session = match dispatcher.connect(events_tx).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "no session for connection, closing");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let _guard = SessionGuard {
        session: session.clone(),
        dispatcher: dispatcher.clone(),
    };
    tracing::info!(%conn_id, %session, remote = %conn.remote_addr(), "session opened");

    let mut out = Outbound {
        conn: &conn,
        codec: &codec,
        seq: 0,
        start: Instant::now(),
    };
    out.send(Payload::Welcome {
        session_id: session.clone(),
        protocol_version: PROTOCOL_VERSION,
    })
    .await?;

    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%session, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%session, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);
                handle_frame(&mut out, &dispatcher, &session, &data).await?;
            }

            Some(event) = events_rx.recv() => {
                out.send(Payload::Event(event)).await?;
            }

            () = &mut idle => {
                tracing::info!(%session, timeout = ?idle_timeout, "connection idle, closing");
                let _ = conn.close().await;
                break;
            }
        }
    }

    // _guard drops here → dispatcher sees the disconnect.
    Ok(())
}

/// Decodes one inbound frame and answers it.
///
/// A request's reply is written before any broadcast it caused: the
/// broadcasts wait in the event channel until this returns.
async fn handle_frame<C: Codec>(
    out: &mut Outbound<'_, C>,
    dispatcher: &DispatcherHandle,
    session: &SessionId,
    data: &[u8],
) -> Result<(), GambitError> {
    let envelope: Envelope = match out.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(%session, error = %e, "failed to decode envelope");
            return Ok(());
        }
    };

    match envelope.payload {
        Payload::Heartbeat { client_time } => {
            let server_time = out.elapsed_ms();
            out.send(Payload::HeartbeatAck {
                client_time,
                server_time,
            })
            .await
        }

        Payload::Request(event) => {
            let result = dispatcher.request(session, event).await;
            let reply = Reply::from_result(envelope.seq, result.map_err(|e| e.code()));
            out.send(Payload::Reply(reply)).await
        }

        other => {
            tracing::debug!(%session, payload = ?other, "ignoring server-only payload from client");
            Ok(())
        }
    }
}
