//! Tactical Filter (spec §4.3): shallow worst-case material lookahead that
//! gates model moves, plus safe-fallback ranking.

use crate::notation::{format_uci, is_capture};
use crate::position::{self, Phase};
use chess::{Board, BoardStatus, ChessMove, Color, MoveGen};

const FORCING_REPLY_CAP: usize = 12;
const FALLBACK_REPLY_CAP: usize = 10;

/// Outcome of [`blunder_check`], matching spec §3's `last_blunder_info`.
#[derive(Debug, Clone)]
pub struct BlunderInfo {
    pub threshold: i32,
    pub worst_drop: i32,
    pub worst_reply_uci: String,
    pub queen_sac: bool,
}

impl BlunderInfo {
    pub fn vetoed(&self) -> bool {
        self.queen_sac || self.worst_drop >= self.threshold
    }
}

/// `base_threshold` (spec §4.3): 3 in a quiet endgame, 5 in a sharp
/// position, 4 otherwise.
pub fn base_threshold(phase: Phase, tactical_density: u32) -> i32 {
    if phase == Phase::Endgame && tactical_density <= 2 {
        3
    } else if tactical_density >= 6 {
        5
    } else {
        4
    }
}

/// Opponent replies ordered forcing-first (captures, then the rest),
/// capped at `limit`.
fn forcing_first_replies(board: &Board, limit: usize) -> Vec<ChessMove> {
    let mut captures = Vec::new();
    let mut others = Vec::new();
    for mv in MoveGen::new_legal(board) {
        if is_capture(board, mv) {
            captures.push(mv);
        } else {
            others.push(mv);
        }
    }
    captures.extend(others);
    captures.truncate(limit);
    captures
}

/// A move is an evacuation if it moves a side-to-move piece off a square
/// that was hanging in `before`, landing somewhere that is not itself
/// hanging in the resulting position.
fn evacuates_hanging_piece(before: &Board, mv: ChessMove) -> bool {
    let hanging = position::hanging_squares(before);
    if !hanging.contains(&mv.get_source()) {
        return false;
    }
    let after = before.make_move_new(mv);
    let us = before.side_to_move();
    let them = !us;
    let attackers = position::attackers_of(&after, mv.get_dest(), them).popcnt();
    let defenders = position::attackers_of(&after, mv.get_dest(), us).popcnt();
    attackers <= defenders
}

/// Run the blunder check for candidate move `mv` in position `board`
/// (side to move is the mover, `S` in spec terms). `phase` and
/// `tactical_density` are the caller's already-computed analysis of
/// `board` itself (position P), not of the position after `mv`.
pub fn blunder_check(board: &Board, mv: ChessMove, phase: Phase, tactical_density: u32) -> BlunderInfo {
    let side = board.side_to_move();
    let baseline = position::material_balance(board, side);
    let after = board.make_move_new(mv);

    if after.status() == BoardStatus::Checkmate {
        return BlunderInfo {
            threshold: i32::MAX,
            worst_drop: i32::MIN,
            worst_reply_uci: String::new(),
            queen_sac: false,
        };
    }

    let gives_check = after.checkers().popcnt() > 0;

    let mut worst_drop = i32::MIN;
    let mut worst_reply = String::new();
    let mut queen_sac = false;

    let replies = forcing_first_replies(&after, FORCING_REPLY_CAP);
    for (i, reply) in replies.iter().enumerate() {
        let after_reply = after.make_move_new(*reply);
        let drop = baseline - position::material_balance(&after_reply, side);
        if drop > worst_drop {
            worst_drop = drop;
            worst_reply = format_uci(*reply);
        }
        if i == 0 {
            let queen_attacked = queen_is_attacked(&after, side);
            if queen_attacked && is_capture(&after, *reply) && drop >= 8 {
                queen_sac = true;
            }
        }
    }
    if worst_drop == i32::MIN {
        worst_drop = 0;
    }

    let mut threshold = base_threshold(phase, tactical_density);

    if baseline < -2 {
        threshold += 1;
    }
    if evacuates_hanging_piece(board, mv) {
        threshold += 1;
    }
    if board.piece_on(mv.get_source()) == Some(chess::Piece::Queen) {
        threshold += 1;
    }
    if gives_check {
        threshold += 2;
    }

    BlunderInfo {
        threshold,
        worst_drop,
        worst_reply_uci: worst_reply,
        queen_sac,
    }
}

fn queen_is_attacked(board: &Board, color: Color) -> bool {
    let queens = board.pieces(chess::Piece::Queen) & board.color_combined(color);
    queens
        .into_iter()
        .any(|sq| position::attackers_of(board, sq, !color).popcnt() > 0)
}

/// Evacuation bonus applied during safe-fallback ranking (spec §4.3: +0.5,
/// represented here in material-tenths so the ranking stays integral).
const EVACUATION_BONUS_TENTHS: i32 = 5;

fn ranked_score_tenths(board: &Board, mv: ChessMove) -> i32 {
    let side = board.side_to_move();
    let baseline = position::material_balance(board, side);
    let after = board.make_move_new(mv);
    let replies = forcing_first_replies(&after, FALLBACK_REPLY_CAP);
    let mut worst_drop = 0;
    for reply in &replies {
        let after_reply = after.make_move_new(*reply);
        let drop = baseline - position::material_balance(&after_reply, side);
        worst_drop = worst_drop.max(drop);
    }
    let bonus = if evacuates_hanging_piece(board, mv) {
        EVACUATION_BONUS_TENTHS
    } else {
        0
    };
    -(worst_drop * 10 - bonus)
}

/// Select the best-scoring legal move that is not in `vetoed`. Falls back
/// to the first legal move if every move is vetoed (the game must make
/// progress; spec §4.3/§4.6 ForceFallback).
pub fn safe_fallback(board: &Board, vetoed: &[String]) -> Option<ChessMove> {
    let candidates: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|mv| !vetoed.iter().any(|v| v == &format_uci(*mv)))
        .collect();

    let pool = if candidates.is_empty() {
        MoveGen::new_legal(board).collect::<Vec<_>>()
    } else {
        candidates
    };

    pool.into_iter()
        .max_by_key(|mv| ranked_score_tenths(board, *mv))
}

/// Top `k` UCI strings by the same ranking, for SAFE_SUGGESTIONS prompt
/// hints (spec §4.4).
pub fn safe_candidates(board: &Board, vetoed: &[String], k: usize) -> Vec<String> {
    let mut ranked: Vec<(ChessMove, i32)> = MoveGen::new_legal(board)
        .filter(|mv| !vetoed.iter().any(|v| v == &format_uci(*mv)))
        .map(|mv| (mv, ranked_score_tenths(board, mv)))
        .collect();
    ranked.sort_by_key(|(_, score)| std::cmp::Reverse(*score));
    ranked.into_iter().take(k).map(|(mv, _)| format_uci(mv)).collect()
}
