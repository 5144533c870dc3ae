//! Error types for the session layer.

use gambit_protocol::SessionId;

/// Errors that can occur during session management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists with the given id. Either it was never issued or
    /// its connection already closed.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The server is already tracking `max` sessions.
    #[error("session limit of {max} reached")]
    CapacityReached { max: usize },
}
