//! Move Parser (spec §4.2): extracts a move token from free-form model
//! text, then resolves it against the current position.

use crate::notation::{parse_san, parse_uci};
use chess::{Board, ChessMove, MoveGen};
use std::sync::OnceLock;

fn bare_square_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[a-h][1-8]$").unwrap())
}

fn move_line_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"(?i)^\s*MOVE:\s*(.+?)\s*$").unwrap())
}

fn uci_shape_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[a-h][1-8][a-h][1-8][nbrqNBRQ]?$").unwrap())
}

/// Outcome of a successful parse: the normalized token plus the move it
/// resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMove {
    pub token: String,
    pub chess_move: ChessMove,
}

/// Find the JSON object `{"move": "..."}` anywhere in `text`, case
/// insensitively on the key.
fn extract_json_move(text: &str) -> Option<String> {
    for (idx, _) in text.match_indices('{') {
        let rest = &text[idx..];
        let end = find_matching_brace(rest)?;
        let candidate = &rest[..=end];
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if let Some(obj) = value.as_object() {
                for (k, v) in obj {
                    if k.eq_ignore_ascii_case("move") {
                        if let Some(s) = v.as_str() {
                            return Some(s.to_string());
                        }
                    }
                }
            }
        }
    }
    None
}

fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The last `MOVE:` line in the text, tolerating models that restate
/// intermediate moves before settling on a final answer.
fn extract_last_move_line(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| move_line_re().captures(line))
        .last()
        .map(|caps| caps[1].to_string())
}

/// Strip backticks, asterisks, brackets and trailing punctuation.
fn strip_wrappers(token: &str) -> String {
    token
        .trim()
        .trim_matches(|c: char| "`*[](){}".contains(c))
        .trim_end_matches(['.', ',', ';', ':'])
        .to_string()
}

fn is_bare_square(token: &str) -> bool {
    bare_square_re().is_match(token)
}

/// Tertiary fallback: scan the whole response for a token that resolves
/// to a legal move, preferring SAN tokens containing `+`/`#`, then the
/// longest token, over a legal UCI token.
fn scan_for_legal_token(board: &Board, text: &str) -> Option<ParsedMove> {
    let mut san_candidates: Vec<String> = Vec::new();
    let mut uci_candidates: Vec<String> = Vec::new();

    for raw in text.split(|c: char| c.is_whitespace()) {
        let cleaned = strip_wrappers(raw);
        if cleaned.is_empty() {
            continue;
        }
        if uci_shape_re().is_match(&cleaned) && parse_uci(board, &cleaned).is_some() {
            uci_candidates.push(cleaned.clone());
        }
        if parse_san(board, &cleaned).is_some() {
            san_candidates.push(cleaned);
        }
    }

    san_candidates.sort_by_key(|t| {
        let forcing = t.ends_with('+') || t.ends_with('#');
        (std::cmp::Reverse(forcing), std::cmp::Reverse(t.len()))
    });

    if let Some(token) = san_candidates.into_iter().next() {
        let mv = parse_san(board, &token)?;
        return Some(ParsedMove { token, chess_move: mv });
    }
    if let Some(token) = uci_candidates.into_iter().next() {
        let mv = parse_uci(board, &token)?;
        return Some(ParsedMove { token, chess_move: mv });
    }
    None
}

/// Resolve a single extracted token against `board`: SAN first (handles
/// `O-O`, `+`, `#`, `=Q`), then UCI shape, then SAN again with
/// capitalization variants (models sometimes lowercase piece letters).
fn resolve_token(board: &Board, token: &str) -> Option<ChessMove> {
    if let Some(mv) = parse_san(board, token) {
        return Some(mv);
    }
    if uci_shape_re().is_match(token) {
        if let Some(mv) = parse_uci(board, token) {
            return Some(mv);
        }
    }
    let upper_first = uppercase_first_letter(token);
    if upper_first != token {
        if let Some(mv) = parse_san(board, &upper_first) {
            return Some(mv);
        }
    }
    None
}

fn uppercase_first_letter(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Outcome of parsing one model response, distinguishing "no move token at
/// all" from "a token was present but didn't resolve to a legal move" —
/// the Decision Loop treats these as `ParseError` vs `IllegalMove`
/// respectively (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(ParsedMove),
    /// A token was extracted (from JSON or a MOVE: line) but it did not
    /// resolve to a legal move in the current position.
    UnresolvedToken(String),
    NoMove,
}

/// Full cascade, reporting *why* it failed when it does (spec §4.6's
/// Validate step needs to know whether a token existed at all).
pub fn parse_model_response_detailed(board: &Board, response: &str) -> ParseOutcome {
    if let Some(token) = extract_json_move(response) {
        let cleaned = strip_wrappers(&token);
        if !is_bare_square(&cleaned) {
            if let Some(mv) = resolve_token(board, &cleaned) {
                return ParseOutcome::Parsed(ParsedMove { token: cleaned, chess_move: mv });
            }
            return ParseOutcome::UnresolvedToken(cleaned);
        }
    }

    if let Some(token) = extract_last_move_line(response) {
        let cleaned = strip_wrappers(&token);
        if !is_bare_square(&cleaned) {
            if let Some(mv) = resolve_token(board, &cleaned) {
                return ParseOutcome::Parsed(ParsedMove { token: cleaned, chess_move: mv });
            }
            return ParseOutcome::UnresolvedToken(cleaned);
        }
    }

    match scan_for_legal_token(board, response) {
        Some(parsed) => ParseOutcome::Parsed(parsed),
        None => ParseOutcome::NoMove,
    }
}

/// Parse a raw model response against `board`, following the extraction
/// precedence and parsing precedence of spec §4.2. Returns `None` (with
/// the caller expected to fall back to a human-readable reason) if no
/// strategy recovers a legal move.
pub fn parse_model_response(board: &Board, response: &str) -> Option<ParsedMove> {
    if let Some(token) = extract_json_move(response) {
        let cleaned = strip_wrappers(&token);
        if !is_bare_square(&cleaned) {
            if let Some(mv) = resolve_token(board, &cleaned) {
                return Some(ParsedMove { token: cleaned, chess_move: mv });
            }
        }
    }

    if let Some(token) = extract_last_move_line(response) {
        let cleaned = strip_wrappers(&token);
        if !is_bare_square(&cleaned) {
            if let Some(mv) = resolve_token(board, &cleaned) {
                return Some(ParsedMove { token: cleaned, chess_move: mv });
            }
        }
    }

    scan_for_legal_token(board, response)
}

/// Candidate SAN/UCI tokens in `text` that match a `CANDIDATES:` line,
/// cross-referenced against legality — telemetry only (spec §B), never
/// required for acceptance.
pub fn candidate_token_telemetry(board: &Board, text: &str) -> Vec<String> {
    let Some(line) = text
        .lines()
        .find(|l| l.trim_start().to_ascii_uppercase().starts_with("CANDIDATES:"))
    else {
        return Vec::new();
    };
    let body = line.splitn(2, ':').nth(1).unwrap_or("");
    let legal: Vec<ChessMove> = MoveGen::new_legal(board).collect();
    body.split(|c: char| c == ',' || c.is_whitespace())
        .map(strip_wrappers)
        .filter(|t| !t.is_empty())
        .filter(|t| {
            legal.iter().any(|mv| {
                parse_san(board, t) == Some(*mv) || parse_uci(board, t) == Some(*mv)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Board;

    #[test]
    fn parses_san_move_line() {
        let board = Board::default();
        let parsed = parse_model_response(&board, "REASONING: developing.\nMOVE: e4").unwrap();
        assert_eq!(parsed.token, "e4");
    }

    #[test]
    fn parses_json_move_case_insensitive_key() {
        let board = Board::default();
        let parsed = parse_model_response(&board, r#"{"Move": "Nf3"}"#).unwrap();
        assert_eq!(parsed.token, "Nf3");
    }

    #[test]
    fn uses_last_move_line_not_first() {
        let board = Board::default();
        let parsed =
            parse_model_response(&board, "MOVE: e4\nactually wait\nMOVE: d4").unwrap();
        assert_eq!(parsed.token, "d4");
    }

    #[test]
    fn bare_square_alone_is_not_a_move() {
        // A response whose *only* candidate is a bare square must fail:
        // "e4" here reads as a destination square, not SAN, with no MOVE:
        // line and no piece letter to disambiguate it.
        let board = Board::default();
        let result = parse_model_response(&board, "I'll go to e4 next turn, just e4.");
        assert!(result.is_none());
    }

    #[test]
    fn tertiary_scan_recovers_missing_contract() {
        let board = Board::default();
        let parsed =
            parse_model_response(&board, "I will play Nf3 to develop.").unwrap();
        assert_eq!(parsed.token, "Nf3");
    }

    #[test]
    fn detailed_parse_distinguishes_illegal_token_from_no_move() {
        use std::str::FromStr;
        // After 1. e4, it's Black to move; e2e3 names a White pawn that
        // has already left e2 (spec §8 scenario 2).
        let board =
            Board::from_str("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
                .unwrap();
        let illegal = parse_model_response_detailed(&board, "MOVE: e2e3");
        assert_eq!(illegal, ParseOutcome::UnresolvedToken("e2e3".to_string()));

        let board = Board::default();
        let nothing = parse_model_response_detailed(&board, "I'm not sure what to play.");
        assert_eq!(nothing, ParseOutcome::NoMove);

        let ok = parse_model_response_detailed(&board, "MOVE: e4");
        assert!(matches!(ok, ParseOutcome::Parsed(_)));
    }

    #[test]
    fn candidates_line_is_cross_referenced_for_telemetry() {
        let board = Board::default();
        let text = "MOVE: e4\nCANDIDATES: e4, Nf3, e9z";
        let hits = candidate_token_telemetry(&board, text);
        assert!(hits.contains(&"e4".to_string()));
        assert!(hits.contains(&"Nf3".to_string()));
        assert!(!hits.contains(&"e9z".to_string()));
    }
}
