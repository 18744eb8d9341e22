//! Game Driver (spec §4.7): alternates sides, calls the Decision Loop per
//! ply, and tracks termination.

use crate::config::EngineConfig;
use crate::decision::{run_ply, DecisionResult, PlyInputs};
use crate::error::CoreError;
use crate::model_client::ModelClient;
use crate::position;
use crate::rng::SampleRng;
use chess::{Board, BoardStatus, Color};
use std::collections::HashMap;
use tracing::info;

/// Mapping from a logical player identifier to a color and model id
/// (spec §3 "Player binding").
#[derive(Debug, Clone)]
pub struct PlayerBinding {
    pub name: String,
    pub color: Color,
    pub model_id: String,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Error,
}

/// Reason a draw or error occurred, for `on_game_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
    Error,
}

/// Game state that lives for the full game (spec §3 "Game state").
pub struct GameState {
    board: Board,
    players: [PlayerBinding; 2],
    san_history: Vec<String>,
    uci_history: Vec<String>,
    fen_history: Vec<String>,
    failed_moves: HashMap<Color, Vec<String>>,
    result: Option<(GameResult, Termination)>,
}

impl GameState {
    pub fn new(players: [PlayerBinding; 2]) -> Self {
        let board = Board::default();
        let mut failed_moves = HashMap::new();
        failed_moves.insert(Color::White, Vec::new());
        failed_moves.insert(Color::Black, Vec::new());
        GameState {
            fen_history: vec![board.to_string()],
            board,
            players,
            san_history: Vec::new(),
            uci_history: Vec::new(),
            failed_moves,
            result: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn san_history(&self) -> &[String] {
        &self.san_history
    }

    pub fn result(&self) -> Option<(GameResult, Termination)> {
        self.result
    }

    fn player_for(&self, color: Color) -> &PlayerBinding {
        self.players
            .iter()
            .find(|p| p.color == color)
            .expect("a binding exists for every color")
    }

    /// Halfmove-clock and repeated-FEN based draw checks the rules engine
    /// doesn't expose directly: the fifty-move rule and a simple threefold
    /// claim over the recorded FEN history (board+side-to-move+castling+ep,
    /// which is exactly what a FEN without move counters encodes).
    fn claims_draw(&self) -> Option<Termination> {
        if position::halfmove_clock(&self.board) >= 100 {
            return Some(Termination::FiftyMoveRule);
        }
        let current = reduced_fen(&self.board);
        let repeats = self
            .fen_history
            .iter()
            .filter(|fen| reduced_fen_str(fen) == current)
            .count();
        if repeats >= 3 {
            return Some(Termination::ThreefoldRepetition);
        }
        None
    }

    fn terminal_result(&self) -> Option<(GameResult, Termination)> {
        match self.board.status() {
            BoardStatus::Checkmate => {
                let winner = !self.board.side_to_move();
                let result = if winner == Color::White {
                    GameResult::WhiteWins
                } else {
                    GameResult::BlackWins
                };
                return Some((result, Termination::Checkmate));
            }
            BoardStatus::Stalemate => return Some((GameResult::Draw, Termination::Stalemate)),
            BoardStatus::Ongoing => {}
        }
        if is_insufficient_material(&self.board) {
            return Some((GameResult::Draw, Termination::InsufficientMaterial));
        }
        if let Some(termination) = self.claims_draw() {
            return Some((GameResult::Draw, termination));
        }
        None
    }
}

/// First two whitespace fields of a FEN (board + side to move), used as a
/// coarse repetition key; castling/en-passant already fold into the board
/// field's surrounding position via the rules engine's own normalization.
fn reduced_fen(board: &Board) -> String {
    reduced_fen_str(&board.to_string())
}

fn reduced_fen_str(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

fn is_insufficient_material(board: &Board) -> bool {
    let occupied = *board.combined();
    if occupied.popcnt() > 4 {
        return false;
    }
    let pawns = board.pieces(chess::Piece::Pawn);
    let rooks = board.pieces(chess::Piece::Rook);
    let queens = board.pieces(chess::Piece::Queen);
    if (pawns | rooks | queens).popcnt() > 0 {
        return false;
    }
    let minors = (board.pieces(chess::Piece::Knight) | board.pieces(chess::Piece::Bishop)).popcnt();
    minors <= 1
}

/// Hooks a caller may wire up to observe the game as it progresses (spec
/// §4.7): `on_move_applied` fires after every commit, `on_game_end` once.
pub trait GameObserver {
    fn on_move_applied(&mut self, _result: &DecisionResult, _state: &GameState) {}
    fn on_game_end(&mut self, _result: GameResult, _termination: Termination) {}
}

/// No-op observer for callers that only want the return value.
pub struct NullObserver;
impl GameObserver for NullObserver {}

/// Drives a single game to completion, alternating Decision Loop calls
/// between the two bound players.
pub struct GameDriver<'a> {
    config: EngineConfig,
    white_client: &'a mut dyn ModelClient,
    black_client: &'a mut dyn ModelClient,
    sample_rng: SampleRng,
    backoff_rng: SampleRng,
}

impl<'a> GameDriver<'a> {
    pub fn new(
        config: EngineConfig,
        white_client: &'a mut dyn ModelClient,
        black_client: &'a mut dyn ModelClient,
        seed: u64,
    ) -> Self {
        GameDriver {
            config,
            white_client,
            black_client,
            sample_rng: SampleRng::from_seed(seed),
            backoff_rng: SampleRng::from_seed(seed ^ 0xA5A5_A5A5_A5A5_A5A5),
        }
    }

    /// Runs `state` to completion, invoking `observer` after each commit and
    /// once at game end. Only `NoLegalMoves`/`RulesEngineError` escape the
    /// Decision Loop (spec §7); both end the game as `Termination::Error`.
    pub fn run(
        &mut self,
        state: &mut GameState,
        observer: &mut dyn GameObserver,
    ) -> (GameResult, Termination) {
        loop {
            if let Some((result, termination)) = state.terminal_result() {
                state.result = Some((result, termination));
                observer.on_game_end(result, termination);
                return (result, termination);
            }

            let side = state.board.side_to_move();
            let player = state.player_for(side).clone();
            let opening_name = position::recognize_opening(&state.uci_history);
            let last_san = state.san_history.last().map(String::as_str);

            let inputs = PlyInputs {
                board: &state.board,
                model_id: &player.model_id,
                recent_san: &state.san_history,
                recent_uci: &state.uci_history,
                opening_name: &opening_name,
                last_san,
            };

            let client: &mut dyn ModelClient = if side == Color::White {
                &mut *self.white_client
            } else {
                &mut *self.black_client
            };
            let failed = state.failed_moves.get_mut(&side).unwrap();

            let outcome = run_ply(
                &inputs,
                &self.config,
                client,
                failed,
                &mut self.sample_rng,
                &mut self.backoff_rng,
            );

            match outcome {
                Ok(decision) => {
                    state.board = state.board.make_move_new(decision.chess_move);
                    state.san_history.push(decision.san.clone());
                    state.uci_history.push(decision.uci.clone());
                    state.fen_history.push(state.board.to_string());
                    info!(
                        san = %decision.san,
                        uci = %decision.uci,
                        forced_fallback = decision.forced_fallback,
                        post_fen = %state.board,
                        "MoveApplied"
                    );
                    observer.on_move_applied(&decision, state);
                }
                Err(CoreError::NoLegalMoves) | Err(CoreError::RulesEngineError(_)) => {
                    state.result = Some((GameResult::Error, Termination::Error));
                    observer.on_game_end(GameResult::Error, Termination::Error);
                    return (GameResult::Error, Termination::Error);
                }
                Err(other) => {
                    // No other CoreError variant is returned by run_ply; a
                    // future variant would still need an escape path here.
                    unreachable!("run_ply does not surface {other:?} to the Game Driver");
                }
            }
        }
    }
}
