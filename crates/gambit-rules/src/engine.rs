//! The rule engine: legality, termination, history and trusted import.

use chess::{BitBoard, Board, BoardStatus, ChessMove, EMPTY, MoveGen, Piece, Rank, Square};
use gambit_protocol::{Color, Fingerprint, MoveRecord, PieceKind, VariantState, VariantTag};
use tracing::trace;

use crate::error::RuleError;
use crate::notation::{from_chess_color, move_text, parse_uci, piece_kind, to_chess_color};
use crate::snapshot::{Snapshot, SnapshotStack};
use crate::variant::{PlyContext, Variant};

/// Why the game is (or isn't) over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    None,
    Checkmate,
    Stalemate,
    DrawInsufficientMaterial,
    DrawThreefoldRepetition,
}

impl TerminalReason {
    pub fn is_terminal(self) -> bool {
        self != Self::None
    }
}

/// Result of a successful [`RuleEngine::apply_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Canonical description of the ply, ready for a `make_move` payload.
    pub record: MoveRecord,
    /// Position after the ply.
    pub position: Fingerprint,
    pub variant_state: VariantState,
    /// Whether the mover's turn is over (always true for the standard
    /// variant; false after a quiet first half-move in two-step).
    pub turn_ended: bool,
}

/// Position, history, and rules for one game.
///
/// Every successful mutating call pushes or pops whole snapshots, so the
/// engine can always be rewound to any earlier reached position.
///
/// ```
/// use gambit_protocol::{Color, VariantTag};
/// use gambit_rules::RuleEngine;
///
/// let mut engine = RuleEngine::new(VariantTag::Standard);
/// engine.apply_uci("e2e4").unwrap();
/// assert_eq!(engine.side_to_move(), Color::Black);
/// assert!(engine.can_undo(1));
/// ```
#[derive(Debug, Clone)]
pub struct RuleEngine {
    variant: Variant,
    start: Snapshot,
    history: SnapshotStack,
}

impl RuleEngine {
    /// Builds an engine for `tag` at the orthodox starting position.
    pub fn new(tag: VariantTag) -> Self {
        let start = Snapshot::new(Board::default(), VariantState::INITIAL);
        Self {
            variant: Variant::from_tag(tag),
            start,
            history: SnapshotStack::new(start),
        }
    }

    /// Builds an engine for `tag` seeded at an arbitrary position. The
    /// seed becomes the position [`reset`](Self::reset) returns to.
    pub fn with_position(
        tag: VariantTag,
        position: &Fingerprint,
        state: VariantState,
    ) -> Result<Self, RuleError> {
        let start = Snapshot::parse(position, state)?;
        Ok(Self {
            variant: Variant::from_tag(tag),
            start,
            history: SnapshotStack::new(start),
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn tag(&self) -> VariantTag {
        self.variant.tag()
    }

    fn top(&self) -> &Snapshot {
        self.history.top()
    }

    fn board(&self) -> &Board {
        self.top().board()
    }

    // -- moves --------------------------------------------------------------

    /// Applies one ply. Fails with [`RuleError::IllegalMove`] without
    /// touching state if the move is illegal or the game is already over.
    ///
    /// A pawn reaching the last rank without an explicit promotion
    /// promotes to a queen.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Result<AppliedMove, RuleError> {
        let board = *self.board();
        let illegal = || RuleError::IllegalMove {
            from: from.to_string(),
            to: to.to_string(),
        };

        if self.is_terminal() {
            return Err(illegal());
        }
        let piece = board.piece_on(from).ok_or_else(illegal)?;
        let promotion = match promotion {
            None if piece == Piece::Pawn && is_last_rank(to) => Some(Piece::Queen),
            other => other,
        };

        let mv = ChessMove::new(from, to, promotion);
        if !board.legal(mv) {
            return Err(illegal());
        }

        let captured = board.piece_on(to).or_else(|| {
            // En passant lands on an empty square.
            (piece == Piece::Pawn && from.get_file() != to.get_file()).then_some(Piece::Pawn)
        });
        let after = board.make_move_new(mv);
        let gives_check = *after.checkers() != EMPTY;
        let terminal = self.reaches_terminal(&after);

        let prior = self.top().state();
        let next = self.variant.complete_ply(PlyContext {
            prior,
            board: after,
            gives_check,
            terminal,
        });
        self.history.push(next);

        let (from_text, to_text) = move_text(&mv);
        trace!(mv = %format!("{from_text}{to_text}"), turn_step = next.state().turn_step, "ply applied");

        Ok(AppliedMove {
            record: MoveRecord {
                from: from_text,
                to: to_text,
                piece: piece_kind(piece),
                captured: captured.map(piece_kind),
                promotion: mv.get_promotion().map(piece_kind),
                check: gives_check,
            },
            position: next.fingerprint(),
            variant_state: next.state(),
            turn_ended: next.state().is_initial(),
        })
    }

    /// [`apply_move`](Self::apply_move) from UCI text such as `e2e4`.
    pub fn apply_uci(&mut self, uci: &str) -> Result<AppliedMove, RuleError> {
        let (from, to, promotion) = parse_uci(uci)?;
        self.apply_move(from, to, promotion)
    }

    /// Terminal status of a candidate position before it is pushed.
    fn reaches_terminal(&self, after: &Board) -> bool {
        if after.status() != BoardStatus::Ongoing || insufficient_material(after) {
            return true;
        }
        let candidate = Snapshot::new(*after, VariantState::INITIAL);
        self.history.occurrences(&candidate) + 1 >= 3
    }

    // -- queries ------------------------------------------------------------

    pub fn current_position(&self) -> Fingerprint {
        self.top().fingerprint()
    }

    pub fn variant_state(&self) -> VariantState {
        self.top().state()
    }

    pub fn side_to_move(&self) -> Color {
        self.top().side_to_move()
    }

    pub fn is_in_check(&self) -> bool {
        *self.board().checkers() != EMPTY
    }

    /// Colour and kind of the piece on `square`, if any.
    pub fn piece_at(&self, square: Square) -> Option<(Color, PieceKind)> {
        let board = self.board();
        let piece = board.piece_on(square)?;
        let color = board.color_on(square)?;
        Some((from_chess_color(color), piece_kind(piece)))
    }

    /// Every square the piece on `from` may legally move to. Empty if the
    /// square is empty or holds a piece of the side not to move.
    pub fn legal_destinations(&self, from: Square) -> BitBoard {
        MoveGen::new_legal(self.board())
            .filter(|mv| mv.get_source() == from)
            .fold(EMPTY, |acc, mv| acc | BitBoard::from_square(mv.get_dest()))
    }

    pub fn king_square(&self, color: Color) -> Square {
        self.board().king_square(to_chess_color(color))
    }

    pub fn terminal_reason(&self) -> TerminalReason {
        let board = self.board();
        match board.status() {
            BoardStatus::Checkmate => return TerminalReason::Checkmate,
            BoardStatus::Stalemate => return TerminalReason::Stalemate,
            BoardStatus::Ongoing => {}
        }
        if insufficient_material(board) {
            return TerminalReason::DrawInsufficientMaterial;
        }
        if self.history.occurrences(self.top()) >= 3 {
            return TerminalReason::DrawThreefoldRepetition;
        }
        TerminalReason::None
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_reason().is_terminal()
    }

    // -- history ------------------------------------------------------------

    /// Whether `plies` snapshots can be popped. The start is never popped.
    pub fn can_undo(&self, plies: usize) -> bool {
        self.history.can_pop(plies)
    }

    /// Pops `plies` snapshots and returns the restored one.
    pub fn undo(&mut self, plies: usize) -> Result<Snapshot, RuleError> {
        let restored = *self.history.pop(plies)?;
        trace!(plies, depth = self.history.len(), "undo applied");
        Ok(restored)
    }

    /// How many plies take `for_color` back to the start of its most
    /// recent turn. Falls back to 1 when no such point exists.
    pub fn suggested_undo_plies(&self, for_color: Color) -> usize {
        self.history
            .distance_to(|s| s.side_to_move() == for_color && s.state().is_initial())
            .unwrap_or(1)
    }

    /// Number of snapshots, the start included.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // -- sync ---------------------------------------------------------------

    /// Current position and sub-state, as a peer would report them.
    pub fn export_state(&self) -> (Fingerprint, VariantState) {
        (self.current_position(), self.variant_state())
    }

    /// Pushes a position reported by the remote peer as a new snapshot.
    ///
    /// The position is trusted: it is parsed, never validated against the
    /// local board.
    pub fn import_state(
        &mut self,
        position: &Fingerprint,
        state: VariantState,
    ) -> Result<(), RuleError> {
        let snapshot = Snapshot::parse(position, state)?;
        self.history.push(snapshot);
        Ok(())
    }

    /// Replaces the whole history with a single trusted snapshot.
    pub fn reload(&mut self, position: &Fingerprint, state: VariantState) -> Result<(), RuleError> {
        let snapshot = Snapshot::parse(position, state)?;
        self.history.reset(snapshot);
        Ok(())
    }

    /// Returns to the starting position and clears history.
    pub fn reset(&mut self) {
        self.history.reset(self.start);
    }
}

fn is_last_rank(square: Square) -> bool {
    matches!(square.get_rank(), Rank::First | Rank::Eighth)
}

/// Neither side can possibly mate: bare kings, a single minor piece, or
/// only bishops that all stand on one square colour.
fn insufficient_material(board: &Board) -> bool {
    let heavy =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy != EMPTY {
        return false;
    }
    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);
    if knights + bishops.popcnt() <= 1 {
        return true;
    }
    if knights > 0 {
        return false;
    }
    let mut shades = bishops.map(|sq| (sq.get_rank().to_index() + sq.get_file().to_index()) % 2);
    match shades.next() {
        Some(first) => shades.all(|shade| shade == first),
        None => true,
    }
}
