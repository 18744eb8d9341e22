//! Decision Loop (spec §4.6): the per-ply state machine —
//! `Start → Prompt → Await → Parse → Validate → (Commit | Veto | Invalid)
//! → (End | Retry)`.

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model_client::{call_params_for_phase, call_with_backoff, ModelClient};
use crate::notation::{format_san, format_uci};
use crate::parser::{parse_model_response_detailed, ParseOutcome};
use crate::position::{self, Phase, PositionAnalysis};
use crate::prompt::{build_prompt, PromptContext};
use crate::rng::SampleRng;
use crate::tactical::{self, BlunderInfo};
use chess::{Board, ChessMove, MoveGen};
use tracing::{info, warn};
use uuid::Uuid;

/// Per-ply state (spec §3 "Turn state"); destroyed on commit.
#[derive(Debug, Clone, Default)]
pub struct TurnState {
    pub turn_id: String,
    pub attempt: u32,
    pub veto_retries: u32,
    pub vetoed_moves: Vec<String>,
    pub avoid_moves: Vec<String>,
    pub last_failure: Option<String>,
    pub last_blunder_info: Option<BlunderInfo>,
}

impl TurnState {
    fn new(avoid_moves: Vec<String>) -> Self {
        TurnState {
            turn_id: Uuid::new_v4().to_string(),
            attempt: 0,
            veto_retries: 0,
            vetoed_moves: Vec::new(),
            avoid_moves,
            last_failure: None,
            last_blunder_info: None,
        }
    }
}

/// Result of a committed ply.
#[derive(Debug, Clone)]
pub struct DecisionResult {
    pub chess_move: ChessMove,
    pub san: String,
    pub uci: String,
    pub forced_fallback: bool,
    pub turn_state: TurnState,
}

/// Everything the loop needs from the surrounding Game state that isn't
/// owned by the turn itself.
pub struct PlyInputs<'a> {
    pub board: &'a Board,
    pub model_id: &'a str,
    pub recent_san: &'a [String],
    pub recent_uci: &'a [String],
    pub opening_name: &'a str,
    pub last_san: Option<&'a str>,
}

/// If the side to move's last two own plies (4 and 2 plies back) exactly
/// reverse each other — the same piece shuttling back and forth — seed
/// `avoid_moves` with the most recent of the two, so a third repetition
/// isn't immediately proposed again (spec §4.6 Start step; the exact
/// repetition-detection rule is source-ambiguous per spec §9 Open
/// Question 3, this is the concrete rule chosen here).
pub fn seed_oscillation_avoid(recent_uci: &[String]) -> Vec<String> {
    let n = recent_uci.len();
    if n < 4 {
        return Vec::new();
    }
    let older = &recent_uci[n - 4];
    let recent = &recent_uci[n - 2];
    if older.len() >= 4 && recent.len() >= 4 && older[0..2] == recent[2..4] && older[2..4] == recent[0..2] {
        vec![recent.clone()]
    } else {
        Vec::new()
    }
}

fn parse_failure_message(last: Option<&str>) -> String {
    match last {
        None => "Could not parse a move from your response. Respond with exactly: \
                  MOVE: <SAN or UCI>"
            .to_string(),
        Some(prev) => format!(
            "Could not parse a move from your response (previous issue: {prev}). \
             Respond with first line only: MOVE: <SAN or UCI>"
        ),
    }
}

fn illegal_move_message(token: &str) -> String {
    format!("'{token}' is not a legal move in the current position. Choose from the sampled legal moves or propose another legal move.")
}

fn veto_message(info: &BlunderInfo, uci: &str) -> String {
    format!(
        "Move {uci} was rejected: worst-case material drop of {} vs threshold {} \
         (opponent reply {}). Propose a safer move.",
        info.worst_drop, info.threshold, info.worst_reply_uci
    )
}

/// Run the Decision Loop for one ply. Returns `Ok` once a move is
/// committed (possibly via forced fallback); returns `Err` only for the
/// two fatal cases that escape to the Game Driver (spec §7).
pub fn run_ply(
    inputs: &PlyInputs,
    config: &EngineConfig,
    client: &mut dyn ModelClient,
    failed_moves: &mut Vec<String>,
    sample_rng: &mut SampleRng,
    backoff_rng: &mut impl rand::Rng,
) -> Result<DecisionResult, CoreError> {
    let board = inputs.board;
    let legal_moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
    if legal_moves.is_empty() {
        return Err(CoreError::NoLegalMoves);
    }

    let analysis: PositionAnalysis = position::analyze(board);
    let max_attempts = config.max_attempts(analysis.phase);
    let mut turn = TurnState::new(seed_oscillation_avoid(inputs.recent_uci));

    info!(
        turn_id = %turn.turn_id,
        phase = %analysis.phase,
        fen = %board,
        legal_count = legal_moves.len(),
        "TurnContext"
    );

    // Single legal move: skip prompting entirely and commit it directly,
    // bypassing both the model and the Tactical Filter (spec §4.6/§8).
    if legal_moves.len() == 1 {
        let mv = legal_moves[0];
        return Ok(finish_commit(board, mv, false, turn));
    }

    loop {
        let safe_suggestions = if turn.veto_retries > 0 {
            tactical::safe_candidates(board, &turn.vetoed_moves, config.safe_suggestions_count)
        } else {
            Vec::new()
        };

        let ctx = PromptContext {
            board,
            analysis: &analysis,
            opening_name: inputs.opening_name,
            recent_san: inputs.recent_san,
            last_san: inputs.last_san,
            last_failure: turn.last_failure.as_deref(),
            avoid_moves: &turn.avoid_moves,
            safe_suggestions: &safe_suggestions,
            veto_occurred: turn.veto_retries > 0,
        };
        let prompt = build_prompt(&ctx, config, turn.veto_retries, sample_rng);
        let params = call_params_for_phase(config, analysis.phase);

        let response = call_with_backoff(
            client,
            &prompt,
            inputs.model_id,
            params,
            config.transport_max_retries,
            backoff_rng,
        );

        let response = match response {
            Ok(text) => text,
            Err(transport_err) => {
                // Treated as ParseError for loop purposes (spec §7).
                warn!(turn_id = %turn.turn_id, error = %transport_err, "ParseFailure");
                turn.last_failure = Some(format!("transport failure: {transport_err}"));
                turn.attempt += 1;
                if turn.attempt >= max_attempts {
                    return Ok(exhausted_fallback(board, turn, analysis.phase, analysis.tactical_density));
                }
                continue;
            }
        };

        match parse_model_response_detailed(board, &response) {
            ParseOutcome::NoMove => {
                warn!(turn_id = %turn.turn_id, "ParseFailure");
                turn.last_failure = Some(parse_failure_message(turn.last_failure.as_deref()));
                turn.attempt += 1;
                if turn.attempt >= max_attempts {
                    return Ok(exhausted_fallback(board, turn, analysis.phase, analysis.tactical_density));
                }
            }
            ParseOutcome::UnresolvedToken(token) => {
                failed_moves.push(token.clone());
                turn.last_failure = Some(illegal_move_message(&token));
                turn.attempt += 1;
                if turn.attempt >= max_attempts {
                    return Ok(exhausted_fallback(board, turn, analysis.phase, analysis.tactical_density));
                }
            }
            ParseOutcome::Parsed(parsed) => {
                let info = tactical::blunder_check(
                    board,
                    parsed.chess_move,
                    analysis.phase,
                    analysis.tactical_density,
                );
                if info.vetoed() {
                    let uci = format_uci(parsed.chess_move);
                    turn.vetoed_moves.push(uci.clone());
                    turn.last_failure = Some(veto_message(&info, &uci));
                    turn.last_blunder_info = Some(info);
                    turn.veto_retries += 1;
                    if turn.veto_retries >= config.veto_retry_cap {
                        return Ok(force_fallback(board, turn, analysis.phase, analysis.tactical_density));
                    }
                    // Veto does not consume an attempt (spec §3 invariant 4).
                    continue;
                }
                failed_moves.clear();
                return Ok(finish_commit(board, parsed.chess_move, false, turn));
            }
        }
    }
}

fn exhausted_fallback(
    board: &Board,
    turn: TurnState,
    phase: Phase,
    tactical_density: u32,
) -> DecisionResult {
    let mv = tactical::safe_fallback(board, &turn.vetoed_moves)
        .expect("board has at least one legal move, checked at loop entry");
    let still_vetoed = tactical::blunder_check(board, mv, phase, tactical_density).vetoed();
    finish_commit(board, mv, still_vetoed, turn)
}

fn force_fallback(
    board: &Board,
    turn: TurnState,
    phase: Phase,
    tactical_density: u32,
) -> DecisionResult {
    exhausted_fallback(board, turn, phase, tactical_density)
}

fn finish_commit(board: &Board, mv: ChessMove, forced_fallback: bool, turn: TurnState) -> DecisionResult {
    let san = format_san(board, mv);
    let uci = format_uci(mv);
    info!(
        turn_id = %turn.turn_id,
        san = %san,
        uci = %uci,
        forced_fallback,
        "MoveApplied"
    );
    DecisionResult {
        chess_move: mv,
        san,
        uci,
        forced_fallback,
        turn_state: turn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_client::CallParams;
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
        ) -> Result<String, crate::error::TransportError> {
            let reply = self.replies.get(self.idx).copied().unwrap_or(self.replies.last().unwrap());
            self.idx += 1;
            Ok(reply.to_string())
        }
    }

    #[test]
    fn happy_opening_move_commits() {
        let board = Board::default();
        let config = EngineConfig::default();
        let mut client = ScriptedClient { replies: vec!["MOVE: e4"], idx: 0 };
        let mut failed_moves = Vec::new();
        let mut sample_rng = SampleRng::from_seed(1);
        let mut backoff_rng = rand::thread_rng();

        let inputs = PlyInputs {
            board: &board,
            model_id: "model-a",
            recent_san: &[],
            recent_uci: &[],
            opening_name: "Opening",
            last_san: None,
        };
        let result = run_ply(
            &inputs,
            &config,
            &mut client,
            &mut failed_moves,
            &mut sample_rng,
            &mut backoff_rng,
        )
        .unwrap();
        assert_eq!(result.uci, "e2e4");
        assert!(!result.forced_fallback);
    }

    #[test]
    fn illegal_move_then_recovery() {
        // After 1. e4, Black to move; first reply names White's pawn move.
        let board =
            Board::from_str("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
                .unwrap();
        let config = EngineConfig::default();
        let mut client = ScriptedClient {
            replies: vec!["MOVE: e2e3", "MOVE: e5"],
            idx: 0,
        };
        let mut failed_moves = Vec::new();
        let mut sample_rng = SampleRng::from_seed(2);
        let mut backoff_rng = rand::thread_rng();

        let inputs = PlyInputs {
            board: &board,
            model_id: "model-b",
            recent_san: &["e4".to_string()],
            recent_uci: &["e2e4".to_string()],
            opening_name: "King's Pawn Game",
            last_san: Some("e4"),
        };
        let result = run_ply(
            &inputs,
            &config,
            &mut client,
            &mut failed_moves,
            &mut sample_rng,
            &mut backoff_rng,
        )
        .unwrap();
        assert_eq!(result.uci, "e7e5");
        assert_eq!(result.turn_state.attempt, 1);
    }

    #[test]
    fn single_legal_move_skips_veto_and_model() {
        // White king in check along the h-file with its only escape to g1:
        // g2 is blocked by its own pawn and no piece can interpose or
        // capture the checking queen.
        let board = Board::from_str("k6q/8/8/8/8/8/6P1/7K w - - 0 1").unwrap();
        assert_eq!(MoveGen::new_legal(&board).len(), 1);
        let config = EngineConfig::default();
        let mut client = ScriptedClient { replies: vec!["MOVE: does-not-matter"], idx: 0 };
        let mut failed_moves = Vec::new();
        let mut sample_rng = SampleRng::from_seed(3);
        let mut backoff_rng = rand::thread_rng();

        let inputs = PlyInputs {
            board: &board,
            model_id: "model-a",
            recent_san: &[],
            recent_uci: &[],
            opening_name: "Opening",
            last_san: None,
        };
        let result = run_ply(
            &inputs,
            &config,
            &mut client,
            &mut failed_moves,
            &mut sample_rng,
            &mut backoff_rng,
        )
        .unwrap();
        assert!(!result.forced_fallback);
        assert_eq!(result.turn_state.attempt, 0);
    }

    #[test]
    fn oscillation_seeds_avoid_moves() {
        let history = vec![
            "g1f3".to_string(),
            "g8f6".to_string(),
            "f3g1".to_string(),
            "f6g8".to_string(),
        ];
        let avoid = seed_oscillation_avoid(&history);
        assert_eq!(avoid, vec!["f3g1".to_string()]);
    }

    #[test]
    fn no_oscillation_when_moves_differ() {
        let history = vec![
            "g1f3".to_string(),
            "g8f6".to_string(),
            "b1c3".to_string(),
            "f6g8".to_string(),
        ];
        assert!(seed_oscillation_avoid(&history).is_empty());
    }
}
