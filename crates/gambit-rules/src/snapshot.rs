//! Position history shared by every variant.

use std::fmt;

use chess::Board;
use gambit_protocol::{Color, Fingerprint, VariantState};

use crate::error::RuleError;
use crate::notation::from_chess_color;

/// One reached position: the board plus the variant's turn sub-state.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    board: Board,
    state: VariantState,
}

impl Snapshot {
    pub fn new(board: Board, state: VariantState) -> Self {
        Self { board, state }
    }

    /// Parses a fingerprint (FEN) into a snapshot.
    pub fn parse(position: &Fingerprint, state: VariantState) -> Result<Self, RuleError> {
        let board: Board = position
            .0
            .parse()
            .map_err(|_| RuleError::InvalidPosition(position.0.clone()))?;
        Ok(Self::new(board, state))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> VariantState {
        self.state
    }

    /// Canonical position string used for staleness checks and sync.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(self.board.to_string())
    }

    pub fn side_to_move(&self) -> Color {
        from_chess_color(self.board.side_to_move())
    }

    /// Same position and same turn sub-state.
    pub fn repeats(&self, other: &Snapshot) -> bool {
        self.state == other.state && self.board.to_string() == other.board.to_string()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("position", &self.board.to_string())
            .field("turn_step", &self.state.turn_step)
            .finish()
    }
}

/// Ordered history of snapshots, oldest first. Never empty: the root
/// (the position the game started or was last resynchronised from) is
/// held apart from the plies pushed on top of it.
#[derive(Debug, Clone)]
pub struct SnapshotStack {
    root: Snapshot,
    plies: Vec<Snapshot>,
}

impl SnapshotStack {
    pub fn new(root: Snapshot) -> Self {
        Self {
            root,
            plies: Vec::new(),
        }
    }

    pub fn top(&self) -> &Snapshot {
        self.plies.last().unwrap_or(&self.root)
    }

    /// Number of snapshots, root included. Always at least 1.
    pub fn len(&self) -> usize {
        self.plies.len() + 1
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.plies.push(snapshot);
    }

    /// `n` plies can be popped while still leaving the root in place.
    pub fn can_pop(&self, n: usize) -> bool {
        self.len() > n
    }

    /// Removes the top `n` snapshots and returns the new top.
    pub fn pop(&mut self, n: usize) -> Result<&Snapshot, RuleError> {
        if !self.can_pop(n) {
            return Err(RuleError::NoHistory {
                requested: n,
                available: self.len(),
            });
        }
        self.plies.truncate(self.plies.len() - n);
        Ok(self.top())
    }

    /// Drops all history and starts again from `root`.
    pub fn reset(&mut self, root: Snapshot) {
        self.root = root;
        self.plies.clear();
    }

    /// Oldest-first iteration over every snapshot.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> {
        std::iter::once(&self.root).chain(self.plies.iter())
    }

    /// How many snapshots repeat `snapshot`.
    pub fn occurrences(&self, snapshot: &Snapshot) -> usize {
        self.iter().filter(|s| s.repeats(snapshot)).count()
    }

    /// Distance from the top to the nearest earlier snapshot matching
    /// `pred`, if any.
    pub fn distance_to(&self, pred: impl Fn(&Snapshot) -> bool) -> Option<usize> {
        self.iter()
            .rev()
            .enumerate()
            .skip(1)
            .find(|(_, s)| pred(s))
            .map(|(distance, _)| distance)
    }
}
