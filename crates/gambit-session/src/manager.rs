//! The session manager: every open connection and the room it sits in.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself. It is owned by the room
//! dispatcher task and only ever touched from there, so a plain `HashMap`
//! is enough.

use std::collections::HashMap;
use std::time::Instant;

use gambit_protocol::{RoomId, SessionId};
use rand::Rng;

use crate::{Session, SessionConfig, SessionError};

/// Issues session ids and tracks which room each session occupies.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ seat(room) ──→ unseat() ──→ remove()
///    │             ↑  │                       ↑
///    │             └──┘ (switch rooms)        │
///    └────────────────────────────────────────┘ (close without joining)
/// ```
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Issues a fresh session for a newly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::CapacityReached`] when `max_sessions`
    /// sessions are already open.
    pub fn create(&mut self) -> Result<&Session, SessionError> {
        if self.sessions.len() >= self.config.max_sessions {
            return Err(SessionError::CapacityReached {
                max: self.config.max_sessions,
            });
        }

        let id = loop {
            let candidate = SessionId(generate_id(self.config.id_bytes));
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        tracing::info!(session_id = %id, open = self.sessions.len() + 1, "session created");

        let session = Session {
            id: id.clone(),
            room: None,
            connected_at: Instant::now(),
        };
        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Forgets a session whose connection closed.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the id is unknown.
    pub fn remove(&mut self, id: &SessionId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        tracing::info!(
            session_id = %id,
            lifetime_ms = session.connected_at.elapsed().as_millis() as u64,
            "session removed"
        );
        Ok(session)
    }

    /// Records that `id` now occupies `room`. Returns the room it sat in
    /// before, if any, so the caller can vacate that seat.
    pub fn seat(&mut self, id: &SessionId, room: RoomId) -> Result<Option<RoomId>, SessionError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        Ok(session.room.replace(room))
    }

    /// Clears the room of `id`, returning it.
    pub fn unseat(&mut self, id: &SessionId) -> Result<Option<RoomId>, SessionError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        Ok(session.room.take())
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// The room `id` currently occupies.
    pub fn room_of(&self, id: &SessionId) -> Option<&RoomId> {
        self.sessions.get(id).and_then(|s| s.room.as_ref())
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generates a random lowercase hex string of `bytes` random bytes.
fn generate_id(bytes: usize) -> String {
    let mut rng = rand::rng();
    (0..bytes.max(1))
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
