//! The dispatcher actor: the one task that owns all room state.
//!
//! Connection handlers talk to it through a [`DispatcherHandle`]. Every
//! command is handled to completion before the next is read, so all state
//! transitions are totally ordered in arrival sequence and no lock is
//! needed anywhere in the room layer.

use std::collections::HashMap;

use gambit_protocol::{ClientEvent, LeaveReason, ReplyData, ServerEvent, SessionId};
use gambit_session::{SessionConfig, SessionManager};
use tokio::sync::{mpsc, oneshot};

use crate::{Delivery, Outcome, RoomConfig, RoomError, RoomStore};

/// Channel on which a connection receives its broadcasts.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to the dispatcher through its channel.
pub(crate) enum Command {
    /// Register a new connection and issue its session id.
    Connect {
        events: EventSender,
        reply: oneshot::Sender<Result<SessionId, RoomError>>,
    },

    /// Run one client request.
    Request {
        session: SessionId,
        event: ClientEvent,
        reply: oneshot::Sender<Result<ReplyData, RoomError>>,
    },

    /// The connection closed. Treated as leaving with reason `disconnect`.
    Disconnect { session: SessionId },

    Stats {
        reply: oneshot::Sender<DispatcherStats>,
    },

    Shutdown,
}

/// Counters describing the dispatcher's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatcherStats {
    pub rooms: usize,
    pub sessions: usize,
    pub pending_offers: usize,
    pub moves_relayed: u64,
}

/// Handle to the running dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Registers a connection. Broadcasts for it arrive on `events`.
    pub async fn connect(&self, events: EventSender) -> Result<SessionId, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Connect {
                events,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable)?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)?
    }

    /// Sends a request and waits for its direct reply.
    pub async fn request(&self, session: &SessionId, event: ClientEvent) -> Result<ReplyData, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Request {
                session: session.clone(),
                event,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable)?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)?
    }

    /// Reports a closed connection (fire-and-forget).
    pub async fn disconnect(&self, session: SessionId) {
        if self.sender.send(Command::Disconnect { session }).await.is_err() {
            tracing::debug!("dispatcher gone, disconnect dropped");
        }
    }

    pub async fn stats(&self) -> Result<DispatcherStats, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Stats { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable)?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)
    }

    /// Stops the dispatcher. Pending commands behind this one are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(Command::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable)
    }
}

/// The actor state. Runs inside a Tokio task.
struct Dispatcher {
    store: RoomStore,
    sessions: SessionManager,
    /// Per-session outbound channels.
    senders: HashMap<SessionId, EventSender>,
    receiver: mpsc::Receiver<Command>,
}

impl Dispatcher {
    async fn run(mut self) {
        tracing::info!("room dispatcher started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                Command::Connect { events, reply } => {
                    let result = self.handle_connect(events);
                    let _ = reply.send(result);
                }
                Command::Request {
                    session,
                    event,
                    reply,
                } => {
                    let result = self.handle_request(&session, event);
                    let _ = reply.send(result);
                }
                Command::Disconnect { session } => {
                    self.handle_disconnect(&session);
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                Command::Shutdown => {
                    tracing::info!("room dispatcher shutting down");
                    break;
                }
            }
        }

        tracing::info!(
            rooms = self.store.registry().len(),
            sessions = self.sessions.len(),
            "room dispatcher stopped"
        );
    }

    fn handle_connect(&mut self, events: EventSender) -> Result<SessionId, RoomError> {
        let id = self.sessions.create()?.id.clone();
        self.senders.insert(id.clone(), events);
        Ok(id)
    }

    fn handle_request(&mut self, session: &SessionId, event: ClientEvent) -> Result<ReplyData, RoomError> {
        if !self.sessions.contains(session) {
            tracing::warn!(%session, event = event.name(), "request from unknown session");
            return Err(RoomError::Session(gambit_session::SessionError::NotFound(
                session.clone(),
            )));
        }

        let room_id = event.room_id().clone();
        let name = event.name();
        let mut outcome: Outcome<()> = Outcome::ok(());

        if let ClientEvent::JoinRoom { .. } = &event {
            // A session sits in one room at a time; switching rooms
            // vacates the old seat, unless the new room can't take it.
            let current = self.sessions.room_of(session).filter(|r| **r != room_id).cloned();
            if let Some(current) = current {
                let target_full = self
                    .store
                    .registry()
                    .get(&room_id)
                    .is_some_and(|room| !room.state().is_joinable());
                if target_full {
                    tracing::debug!(%session, %room_id, "room switch refused, target full");
                    return Err(RoomError::RoomFull(room_id));
                }
                let _ = outcome.absorb(self.store.leave(&current, session, LeaveReason::Left));
                let _ = self.sessions.unseat(session);
            }
        }

        let is_join = matches!(event, ClientEvent::JoinRoom { .. });
        let is_leave = matches!(event, ClientEvent::LeaveRoom { .. });
        let result = outcome.absorb(self.store.handle(session, event));

        match &result {
            Ok(_) if is_join => {
                let _ = self.sessions.seat(session, room_id.clone());
            }
            Ok(_) if is_leave => {
                let _ = self.sessions.unseat(session);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%session, %room_id, event = name, error = %e, "request rejected");
            }
        }

        self.deliver(outcome.deliveries);
        result
    }

    fn handle_disconnect(&mut self, session: &SessionId) {
        self.senders.remove(session);
        let removed = match self.sessions.remove(session) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::debug!(%session, error = %e, "disconnect for unknown session");
                return;
            }
        };
        if let Some(room_id) = removed.room {
            let outcome = self.store.leave(&room_id, session, LeaveReason::Disconnect);
            self.deliver(outcome.deliveries);
        }
    }

    /// Pushes each delivery to its session. Silently drops events for
    /// sessions whose connection is already gone.
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for Delivery { to, event } in deliveries {
            if let Some(sender) = self.senders.get(&to) {
                let _ = sender.send(event);
            }
        }
    }

    fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            rooms: self.store.registry().len(),
            sessions: self.sessions.len(),
            pending_offers: self.store.offers().len(),
            moves_relayed: self.store.relay().relayed(),
        }
    }
}

/// Spawns the dispatcher task and returns a handle to it.
///
/// `room_config.channel_size` bounds the command channel: when it fills
/// up, callers wait.
pub fn spawn_dispatcher(room_config: RoomConfig, session_config: SessionConfig) -> DispatcherHandle {
    let (tx, rx) = mpsc::channel(room_config.channel_size.max(1));

    let dispatcher = Dispatcher {
        store: RoomStore::new(&room_config),
        sessions: SessionManager::new(session_config),
        senders: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(dispatcher.run());

    DispatcherHandle { sender: tx }
}
