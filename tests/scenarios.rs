//! Integration tests built directly from the six end-to-end scenarios
//! (spec §8), exercising the public `duel_core` API rather than any one
//! module's internals.

use chess::{Board, MoveGen};
use duel_core::error::TransportError;
use duel_core::model_client::CallParams;
use duel_core::rng::SampleRng;
use duel_core::{run_ply, EngineConfig, ModelClient, PlyInputs};
use std::str::FromStr;

struct ScriptedClient {
    replies: Vec<&'static str>,
    idx: usize,
}

impl ModelClient for ScriptedClient {
    fn call(
        &mut self,
        _prompt: &str,
        _model_id: &str,
        _params: CallParams,
    ) -> Result<String, TransportError> {
        let reply = self.replies.get(self.idx).copied().unwrap_or(self.replies.last().unwrap());
        self.idx += 1;
        Ok(reply.to_string())
    }
}

fn run(
    board: &Board,
    replies: Vec<&'static str>,
    recent_san: &[String],
    recent_uci: &[String],
    last_san: Option<&str>,
) -> duel_core::DecisionResult {
    let config = EngineConfig::default();
    let mut client = ScriptedClient { replies, idx: 0 };
    let mut failed_moves = Vec::new();
    let mut sample_rng = SampleRng::from_seed(1);
    let mut backoff_rng = rand::thread_rng();
    let inputs = PlyInputs {
        board,
        model_id: "model-under-test",
        recent_san,
        recent_uci,
        opening_name: "Opening",
        last_san,
    };
    run_ply(&inputs, &config, &mut client, &mut failed_moves, &mut sample_rng, &mut backoff_rng).unwrap()
}

#[test]
fn scenario_1_happy_opening_move() {
    let board = Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
    let result = run(&board, vec!["MOVE: e4"], &[], &[], None);
    assert_eq!(result.uci, "e2e4");
    assert!(!result.forced_fallback);
    let after = board.make_move_new(result.chess_move);
    assert_eq!(
        after.to_string(),
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
    );
}

#[test]
fn scenario_2_illegal_move_then_recovery() {
    let board = Board::from_str("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
    let result = run(
        &board,
        vec!["MOVE: e2e3", "MOVE: e5"],
        &["e4".to_string()],
        &["e2e4".to_string()],
        Some("e4"),
    );
    assert_eq!(result.uci, "e7e5");
    assert_eq!(result.turn_state.attempt, 1);
}

#[test]
fn scenario_3_queen_hang_veto_then_recovery() {
    // White K+Q vs Black K+R: moving the queen onto the open file the rook
    // covers hangs it for nothing; the next reply retreats instead.
    let board = Board::from_str("3rk3/8/8/8/3Q4/8/8/4K3 w - - 0 1").unwrap();
    let result = run(&board, vec!["MOVE: d4d6", "MOVE: d4a4"], &[], &[], None);
    assert_eq!(result.uci, "d4a4");
    assert_eq!(result.turn_state.veto_retries, 1);
    assert!(result.turn_state.vetoed_moves.contains(&"d4d6".to_string()));
}

#[test]
fn scenario_4_parse_fallback_via_san_token_scan() {
    let board = Board::default();
    let result = run(&board, vec!["I will play Nf3 to develop."], &[], &[], None);
    assert_eq!(result.uci, "g1f3");
    assert_eq!(result.turn_state.attempt, 0);
}

#[test]
fn scenario_5_oscillation_is_seeded_into_avoid_moves() {
    // Both knights shuttled out and home again: 1. Nf3 Nf6 2. Ng1 Ng8,
    // reaching a position identical to the start but for the counters.
    let board =
        Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 4 3").unwrap();
    let recent_san = vec!["Nf3".to_string(), "Nf6".to_string(), "Ng1".to_string(), "Ng8".to_string()];
    let recent_uci = vec!["g1f3".to_string(), "g8f6".to_string(), "f3g1".to_string(), "f6g8".to_string()];
    let result = run(&board, vec!["MOVE: Nf3"], &recent_san, &recent_uci, Some("Ng8"));
    // White's own last move (f3g1, the "B" half of the ABAB shuttle) is
    // seeded into avoid_moves even though the model proposes it again
    // regardless; avoid_moves is a prompt hint, not an enforced filter.
    assert_eq!(result.turn_state.avoid_moves, vec!["f3g1".to_string()]);
    assert_eq!(result.uci, "g1f3");
}

#[test]
fn scenario_6_forced_single_legal_move_skips_tactical_filter() {
    let board = Board::from_str("k6q/8/8/8/8/8/6P1/7K w - - 0 1").unwrap();
    assert_eq!(MoveGen::new_legal(&board).len(), 1);
    let result = run(&board, vec!["MOVE: anything, it does not matter"], &[], &[], None);
    assert_eq!(result.uci, "h1g1");
    assert!(!result.forced_fallback);
    assert_eq!(result.turn_state.attempt, 0);
}
