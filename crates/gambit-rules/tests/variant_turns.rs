//! Turn structure, undo depth, and sync round-trips across variants.

use chess::{ALL_SQUARES, EMPTY};
use gambit_protocol::{Color, Fingerprint, VariantState, VariantTag};
use gambit_rules::{RuleEngine, RuleError, SyncAdapter, SyncOutcome, TerminalReason};

const ROOK_ENDGAME: &str = "4k3/8/8/8/8/8/8/R3K3 w - - 0 1";

fn two_step_at(fen: &str) -> RuleEngine {
    RuleEngine::with_position(VariantTag::TwoStep, &Fingerprint::from(fen), VariantState::INITIAL)
        .unwrap()
}

#[test]
fn test_two_step_quiet_first_half_keeps_move() {
    let mut engine = RuleEngine::new(VariantTag::TwoStep);

    let first = engine.apply_uci("e2e4").unwrap();
    assert!(!first.turn_ended);
    assert_eq!(first.variant_state.turn_step, 1);
    assert_eq!(engine.side_to_move(), Color::White);

    let second = engine.apply_uci("d2d4").unwrap();
    assert!(second.turn_ended);
    assert_eq!(engine.variant_state().turn_step, 0);
    assert_eq!(engine.side_to_move(), Color::Black);
}

#[test]
fn test_two_step_checking_first_half_ends_turn() {
    let mut engine = two_step_at(ROOK_ENDGAME);

    let applied = engine.apply_uci("a1a8").unwrap();
    assert!(applied.record.check);
    assert!(applied.turn_ended);
    assert_eq!(engine.variant_state().turn_step, 0);
    assert_eq!(engine.side_to_move(), Color::Black);
    assert!(engine.is_in_check());
}

#[test]
fn test_two_step_first_half_without_follow_up_passes_turn() {
    let mut engine = two_step_at("7k/8/8/1p6/2n5/pP6/P2n4/K7 w - - 0 1");

    let applied = engine.apply_uci("b3b4").unwrap();
    assert!(applied.turn_ended);
    assert_eq!(applied.variant_state, VariantState::INITIAL);
    assert_eq!(engine.side_to_move(), Color::Black);
    assert_eq!(engine.terminal_reason(), TerminalReason::None);
    assert!(!engine.is_terminal());

    engine.apply_uci("h8g8").unwrap();
}

#[test]
fn test_two_step_second_half_always_ends_turn() {
    let mut engine = two_step_at(ROOK_ENDGAME);
    engine.apply_uci("a1a2").unwrap();
    assert_eq!(engine.side_to_move(), Color::White);

    engine.apply_uci("a2a3").unwrap();
    assert_eq!(engine.side_to_move(), Color::Black);
    assert_eq!(engine.variant_state(), VariantState::INITIAL);
}

#[test]
fn test_suggested_undo_plies_two_step_spans_turns() {
    let mut engine = RuleEngine::new(VariantTag::TwoStep);
    // White: two half-moves. Black: one so far.
    for mv in ["e2e4", "d2d4", "e7e5"] {
        engine.apply_uci(mv).unwrap();
    }
    assert_eq!(engine.suggested_undo_plies(Color::White), 3);
    assert_eq!(engine.suggested_undo_plies(Color::Black), 1);

    engine.apply_uci("d7d5").unwrap();
    assert_eq!(engine.suggested_undo_plies(Color::Black), 2);
    assert_eq!(engine.suggested_undo_plies(Color::White), 4);
}

#[test]
fn test_undo_depth_exact_and_failure_non_mutating() {
    let mut engine = RuleEngine::new(VariantTag::TwoStep);
    let mut seen = vec![engine.current_position()];
    for mv in ["e2e4", "d2d4", "e7e5"] {
        engine.apply_uci(mv).unwrap();
        seen.push(engine.current_position());
    }

    let err = engine.undo(4).unwrap_err();
    assert_eq!(err, RuleError::NoHistory { requested: 4, available: 4 });
    assert_eq!(engine.history_len(), 4);

    let restored = engine.undo(3).unwrap();
    assert_eq!(restored.fingerprint(), seen[0]);
    assert_eq!(engine.history_len(), 1);
    assert_eq!(engine.variant_state().turn_step, 0);
}

#[test]
fn test_export_import_preserves_queries() {
    let mut original = RuleEngine::new(VariantTag::TwoStep);
    for mv in ["e2e4", "g1f3", "d7d5"] {
        original.apply_uci(mv).unwrap();
    }
    let (position, state) = original.export_state();

    let mut copy = RuleEngine::new(VariantTag::TwoStep);
    copy.import_state(&position, state).unwrap();

    assert_eq!(copy.current_position(), original.current_position());
    assert_eq!(copy.side_to_move(), original.side_to_move());
    assert_eq!(copy.variant_state(), original.variant_state());
    for square in ALL_SQUARES {
        assert_eq!(
            copy.legal_destinations(square),
            original.legal_destinations(square),
            "destinations differ on {square}"
        );
    }
}

#[test]
fn test_sync_adapter_tracks_remote_two_step_game() {
    let mut remote = RuleEngine::new(VariantTag::TwoStep);
    let mut local = SyncAdapter::new(RuleEngine::new(VariantTag::TwoStep));

    for mv in ["e2e4", "d2d4"] {
        let applied = remote.apply_uci(mv).unwrap();
        let outcome = local
            .apply_remote_move(&applied.position, VariantTag::TwoStep, Some(applied.variant_state))
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Applied);
    }
    assert_eq!(local.engine().export_state(), remote.export_state());
    assert_eq!(local.engine().side_to_move(), Color::Black);
    assert_eq!(local.engine().suggested_undo_plies(Color::White), 2);
}

#[test]
fn test_apply_move_terminal_game_rejected() {
    let mut engine = RuleEngine::with_position(
        VariantTag::Standard,
        &Fingerprint::from("4k3/8/8/8/8/8/8/4K3 w - - 0 1"),
        VariantState::INITIAL,
    )
    .unwrap();
    assert_eq!(engine.terminal_reason(), TerminalReason::DrawInsufficientMaterial);
    assert!(engine.legal_destinations(chess::Square::E1) != EMPTY);
    assert!(matches!(engine.apply_uci("e1e2"), Err(RuleError::IllegalMove { .. })));
}
