//! Error types for the room layer.

use gambit_protocol::{ErrorCode, OfferId, RoomId, SessionId};
use gambit_session::SessionError;

/// Errors that can occur during room operations.
///
/// Every variant is local and recoverable: the room and whatever state it
/// still holds stay usable after any of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room already seats two participants.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The request is malformed (unknown offer kind, undo without a base
    /// fingerprint, ...).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An offer needs someone to receive it.
    #[error("no opponent in room {0}")]
    OpponentNotPresent(RoomId),

    /// The room's single offer slot is taken.
    #[error("an offer is already pending in room {0}")]
    OfferPending(RoomId),

    /// No pending offer, or the pending one has a different id.
    #[error("offer {0} not found")]
    OfferNotFound(OfferId),

    /// The proposer tried to answer its own offer.
    #[error("offer {0} cannot be answered by its proposer")]
    CannotAcceptOwn(OfferId),

    /// The undo's base position no longer matches the game.
    #[error("offer {0} is stale")]
    OfferStale(OfferId),

    /// The session does not occupy the room the request names.
    #[error("session {session} is not in room {room}")]
    NotInRoom { session: SessionId, room: RoomId },

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The dispatcher's command channel is closed.
    #[error("room dispatcher is unavailable")]
    Unavailable,
}

impl RoomError {
    /// The wire code reported on the triggering request.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::OpponentNotPresent(_) => ErrorCode::OpponentNotPresent,
            Self::OfferPending(_) => ErrorCode::OfferPending,
            Self::OfferNotFound(_) => ErrorCode::OfferNotFound,
            Self::CannotAcceptOwn(_) => ErrorCode::CannotAcceptOwn,
            Self::OfferStale(_) => ErrorCode::OfferStale,
            Self::NotInRoom { .. } => ErrorCode::NotInRoom,
            Self::Session(SessionError::NotFound(_)) => ErrorCode::NotInRoom,
            Self::Session(SessionError::CapacityReached { .. }) | Self::Unavailable => {
                ErrorCode::Unavailable
            }
        }
    }
}
