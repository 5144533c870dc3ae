//! Session types: the server's record of one open connection.

use std::time::Instant;

use gambit_protocol::{RoomId, SessionId};

/// Configuration for session issuance.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Random bytes per session id. The id is their lowercase hex form,
    /// so the default of 16 bytes gives 32-character ids.
    pub id_bytes: usize,

    /// Upper bound on simultaneously open sessions.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_bytes: 16,
            max_sessions: 1024,
        }
    }
}

/// One connected participant.
///
/// `room` is the single room this session currently occupies, if any.
/// The room layer keeps it in step with room membership.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub room: Option<RoomId>,
    pub connected_at: Instant,
}
