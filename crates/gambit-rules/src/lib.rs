//! Pluggable chess rule engine for Gambit peers.
//!
//! Each peer owns one [`RuleEngine`]: a board position, a variant-specific
//! turn sub-state, and a [`SnapshotStack`] of every position reached so far.
//! The stack is what makes multi-ply undo possible, and what the undo
//! negotiation consults to decide how many plies make up "one turn".
//!
//! # Key types
//!
//! - [`RuleEngine`]: move application, legality queries, termination,
//!   depth-bounded undo, trusted import/export
//! - [`Variant`]: the rule sets ([`Variant::Standard`], [`Variant::TwoStep`])
//!   built by [`RuleEngine::new`] from a [`VariantTag`](gambit_protocol::VariantTag)
//! - [`SnapshotStack`]: shared history machinery, composed into the engine
//! - [`SyncAdapter`]: reconciles the local engine with positions reported
//!   by the remote peer
//!
//! Move generation and position parsing come from the `chess` crate;
//! [`Square`] and [`Piece`] are re-exported from it.

mod engine;
mod error;
mod notation;
mod snapshot;
mod sync;
mod variant;

pub use chess::{BitBoard, Piece, Square};
pub use engine::{AppliedMove, RuleEngine, TerminalReason};
pub use error::RuleError;
pub use notation::{parse_square, parse_uci};
pub use snapshot::{Snapshot, SnapshotStack};
pub use sync::{SyncAdapter, SyncOutcome};
pub use variant::Variant;
