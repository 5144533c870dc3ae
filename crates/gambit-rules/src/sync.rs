//! Reconciling the local engine with positions reported by the peer.

use gambit_protocol::{Fingerprint, VariantState, VariantTag};
use tracing::{debug, info};

use crate::engine::RuleEngine;
use crate::error::RuleError;

/// What [`SyncAdapter::apply_remote_move`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The reported position was pushed as a new snapshot.
    Applied,
    /// The peer plays a different variant; the engine was rebuilt at the
    /// reported position and local history is gone.
    VariantSwitched { from: VariantTag, to: VariantTag },
}

/// Owns the local [`RuleEngine`] and keeps it in step with the peer.
///
/// Remote positions are trusted as reported. The adapter never replays
/// the move against the local board.
#[derive(Debug, Clone)]
pub struct SyncAdapter {
    engine: RuleEngine,
}

impl SyncAdapter {
    pub fn new(engine: RuleEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RuleEngine {
        &mut self.engine
    }

    /// Adopts the position carried by a relayed `move_made`.
    ///
    /// A missing `state` means the turn's initial sub-state. Every relayed
    /// ply is pushed, even one that repeats the local top, so undo depths
    /// stay in step with the peer.
    pub fn apply_remote_move(
        &mut self,
        position: &Fingerprint,
        tag: VariantTag,
        state: Option<VariantState>,
    ) -> Result<SyncOutcome, RuleError> {
        let state = state.unwrap_or(VariantState::INITIAL);
        let local = self.engine.tag();

        if tag != local {
            self.engine = RuleEngine::with_position(tag, position, state)?;
            info!(from = %local, to = %tag, "peer switched variant, engine rebuilt");
            return Ok(SyncOutcome::VariantSwitched { from: local, to: tag });
        }

        self.engine.import_state(position, state)?;
        Ok(SyncOutcome::Applied)
    }

    /// Reloads the engine at the given position, dropping all history.
    pub fn force_resync(
        &mut self,
        position: &Fingerprint,
        state: VariantState,
    ) -> Result<(), RuleError> {
        self.engine.reload(position, state)?;
        debug!(%position, "engine resynchronised");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_remote_move_same_variant_pushes_snapshot() {
        let mut remote = RuleEngine::new(VariantTag::Standard);
        let applied = remote.apply_uci("e2e4").unwrap();

        let mut sync = SyncAdapter::new(RuleEngine::new(VariantTag::Standard));
        let outcome = sync
            .apply_remote_move(&applied.position, VariantTag::Standard, None)
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Applied);
        assert_eq!(sync.engine().current_position(), applied.position);
        assert!(sync.engine().can_undo(1));

        // A repeated position is still a ply of its own.
        let again = sync
            .apply_remote_move(&applied.position, VariantTag::Standard, None)
            .unwrap();
        assert_eq!(again, SyncOutcome::Applied);
        assert_eq!(sync.engine().history_len(), 3);

        sync.engine_mut().undo(1).unwrap();
        assert_eq!(sync.engine().current_position(), applied.position);
        assert!(sync.engine().can_undo(1));
    }

    #[test]
    fn test_apply_remote_move_other_variant_rebuilds_engine() {
        let mut remote = RuleEngine::new(VariantTag::TwoStep);
        let applied = remote.apply_uci("e2e4").unwrap();

        let mut sync = SyncAdapter::new(RuleEngine::new(VariantTag::Standard));
        let outcome = sync
            .apply_remote_move(&applied.position, VariantTag::TwoStep, Some(applied.variant_state))
            .unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::VariantSwitched {
                from: VariantTag::Standard,
                to: VariantTag::TwoStep
            }
        );
        assert_eq!(sync.engine().tag(), VariantTag::TwoStep);
        assert_eq!(sync.engine().variant_state().turn_step, 1);
        assert!(!sync.engine().can_undo(1));
    }

    #[test]
    fn test_apply_remote_move_garbage_position_rejected() {
        let mut sync = SyncAdapter::new(RuleEngine::new(VariantTag::Standard));
        let before = sync.engine().export_state();
        let err = sync
            .apply_remote_move(&"garbage".into(), VariantTag::Standard, None)
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidPosition(_)));
        assert_eq!(sync.engine().export_state(), before);
    }

    #[test]
    fn test_force_resync_truncates_history() {
        let mut sync = SyncAdapter::new(RuleEngine::new(VariantTag::Standard));
        sync.engine_mut().apply_uci("e2e4").unwrap();
        sync.engine_mut().apply_uci("e7e5").unwrap();
        let (position, state) = sync.engine().export_state();

        sync.force_resync(&position, state).unwrap();
        assert_eq!(sync.engine().history_len(), 1);
        assert_eq!(sync.engine().current_position(), position);
    }
}
