//! Unified error type for the Gambit server.

use gambit_protocol::{ErrorCode, ProtocolError};
use gambit_room::RoomError;
use gambit_rules::RuleError;
use gambit_session::SessionError;
use gambit_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GambitError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, offer conflicts, dispatcher gone).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The local rule engine refused a move or an undo.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl GambitError {
    /// The wire code for errors that have one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Room(e) => Some(e.code()),
            Self::Rule(e) => Some(e.code()),
            Self::Session(e) => Some(RoomError::Session(e.clone()).code()),
            Self::Transport(_) | Self::Protocol(_) => None,
        }
    }
}
