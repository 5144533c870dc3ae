//! Rule-set variants and their turn structure.

use chess::{Board, BoardStatus};
use gambit_protocol::{VariantState, VariantTag};

use crate::snapshot::Snapshot;

/// The rule sets a [`RuleEngine`](crate::RuleEngine) can run.
///
/// Both share move generation; they differ in how a ply advances the turn
/// and in how deep an undo may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// Orthodox chess: every ply hands the move to the opponent.
    #[default]
    Standard,
    /// Each turn is up to two half-moves by the same side. A first
    /// half-move that gives check or ends the game ends the turn early.
    TwoStep,
}

/// What the engine learned about a ply before the variant decides how the
/// turn proceeds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlyContext {
    /// Sub-state the ply was played from.
    pub prior: VariantState,
    /// Board after the ply, opponent to move.
    pub board: Board,
    pub gives_check: bool,
    pub terminal: bool,
}

impl Variant {
    pub fn from_tag(tag: VariantTag) -> Self {
        match tag {
            VariantTag::Standard => Self::Standard,
            VariantTag::TwoStep => Self::TwoStep,
        }
    }

    pub fn tag(self) -> VariantTag {
        match self {
            Self::Standard => VariantTag::Standard,
            Self::TwoStep => VariantTag::TwoStep,
        }
    }

    /// Deepest undo an offer may request: one full turn by each side.
    pub fn max_undo_plies(self) -> u8 {
        match self {
            Self::Standard => 2,
            Self::TwoStep => 4,
        }
    }

    /// Clamps a requested undo depth into `1..=max_undo_plies`.
    /// An absent request means one ply.
    pub fn clamp_undo_plies(self, requested: Option<i64>) -> u8 {
        let max = self.max_undo_plies();
        let clamped = requested.unwrap_or(1).clamp(1, i64::from(max));
        u8::try_from(clamped).unwrap_or(max)
    }

    /// Builds the snapshot that follows a ply.
    pub(crate) fn complete_ply(self, ply: PlyContext) -> Snapshot {
        match self {
            Self::Standard => Snapshot::new(ply.board, VariantState::INITIAL),
            Self::TwoStep => {
                let first_half = ply.prior.turn_step == 0;
                if first_half && !ply.gives_check && !ply.terminal {
                    // Hand the move back to the side that just played,
                    // unless it has no second half-move to make.
                    if let Some(board) = ply.board.null_move() {
                        if board.status() == BoardStatus::Ongoing {
                            return Snapshot::new(board, VariantState { turn_step: 1 });
                        }
                    }
                }
                Snapshot::new(ply.board, VariantState::INITIAL)
            }
        }
    }
}
