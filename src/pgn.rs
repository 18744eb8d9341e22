//! PGN export (SPEC_FULL §B): a pure function over committed game state,
//! no file I/O. Grounded on `get_pgn_history(include_headers, max_moves)`
//! in the original Python source.

use crate::game::{GameResult, GameState};

/// Headers for the standard seven-tag roster plus `PlyCount`.
pub struct PgnHeaders<'a> {
    pub event: &'a str,
    pub site: &'a str,
    pub date: &'a str,
    pub round: &'a str,
    pub white: &'a str,
    pub black: &'a str,
}

fn result_tag(result: Option<(GameResult, crate::game::Termination)>) -> &'static str {
    match result.map(|(r, _)| r) {
        Some(GameResult::WhiteWins) => "1-0",
        Some(GameResult::BlackWins) => "0-1",
        Some(GameResult::Draw) => "1/2-1/2",
        Some(GameResult::Error) | None => "*",
    }
}

/// Movetext in the standard `1. e4 e5 2. Nf3 ...` form, built from the
/// committed SAN history. If `max_moves` is `Some(n)`, only the last `n`
/// plies are included (tail-truncation, matching the original's
/// `max_moves` parameter).
pub fn movetext(san_history: &[String], max_moves: Option<usize>) -> String {
    let start_ply = match max_moves {
        Some(n) => san_history.len().saturating_sub(n),
        None => 0,
    };
    let mut out = String::new();
    for (ply_idx, san) in san_history.iter().enumerate().skip(start_ply) {
        if ply_idx % 2 == 0 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("{}. ", ply_idx / 2 + 1));
        } else {
            out.push(' ');
        }
        out.push_str(san);
    }
    out
}

/// Builds a complete PGN document for `state`. When `max_moves` is set,
/// the movetext is truncated to its tail but headers are still emitted in
/// full (the document stays parseable, just abbreviated).
pub fn export(state: &GameState, headers: &PgnHeaders, max_moves: Option<usize>) -> String {
    let san_history = state.san_history();
    let result = result_tag(state.result());

    let mut doc = String::new();
    doc.push_str(&format!("[Event \"{}\"]\n", headers.event));
    doc.push_str(&format!("[Site \"{}\"]\n", headers.site));
    doc.push_str(&format!("[Date \"{}\"]\n", headers.date));
    doc.push_str(&format!("[Round \"{}\"]\n", headers.round));
    doc.push_str(&format!("[White \"{}\"]\n", headers.white));
    doc.push_str(&format!("[Black \"{}\"]\n", headers.black));
    doc.push_str(&format!("[Result \"{result}\"]\n"));
    doc.push_str(&format!("[PlyCount \"{}\"]\n", san_history.len()));
    doc.push('\n');
    doc.push_str(&movetext(san_history, max_moves));
    if !san_history.is_empty() {
        doc.push(' ');
    }
    doc.push_str(result);
    doc.push('\n');
    doc
}
