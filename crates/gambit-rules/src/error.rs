//! Error types for the rule engine.

use gambit_protocol::ErrorCode;

/// Errors that can occur while applying, undoing, or importing positions.
///
/// None of them mutate engine state: a failed call leaves the snapshot
/// stack exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The move is not legal in the current position (or the game is over).
    #[error("illegal move {from}{to}")]
    IllegalMove { from: String, to: String },

    /// Undo asked for more plies than the history holds.
    #[error("cannot undo {requested} plies with {available} snapshots of history")]
    NoHistory { requested: usize, available: usize },

    /// A square name that isn't `a1`..`h8`.
    #[error("invalid square {0:?}")]
    InvalidSquare(String),

    /// Move text that isn't UCI long algebraic (`e2e4`, `e7e8q`).
    #[error("invalid move notation {0:?}")]
    InvalidNotation(String),

    /// A fingerprint that doesn't parse as a sane position.
    #[error("invalid position {0:?}")]
    InvalidPosition(String),
}

impl RuleError {
    /// The wire code reported to the peer for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::IllegalMove { .. }
            | Self::InvalidSquare(_)
            | Self::InvalidNotation(_) => ErrorCode::IllegalMove,
            Self::NoHistory { .. } => ErrorCode::NoHistory,
            Self::InvalidPosition(_) => ErrorCode::BadRequest,
        }
    }
}
