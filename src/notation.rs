//! SAN and UCI encode/decode for [`chess::ChessMove`].
//!
//! The `chess` crate gives us move generation, FEN and a UCI-shaped
//! `Display` for `ChessMove`, but no SAN. This module fills that gap the way
//! other consumers of this crate do it (see e.g. a hand-rolled SAN parser
//! grounded on `MoveGen::new_legal` + destination/disambiguation matching),
//! and adds the formatting half spec.md §3 also requires.

use chess::{Board, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use std::str::FromStr;

/// UCI encoding: `e2e4`, `e7e8q`.
pub fn format_uci(mv: ChessMove) -> String {
    let mut s = format!("{}{}", mv.get_source(), mv.get_dest());
    if let Some(promo) = mv.get_promotion() {
        s.push(promotion_char(promo));
    }
    s
}

fn promotion_char(p: Piece) -> char {
    match p {
        Piece::Queen => 'q',
        Piece::Rook => 'r',
        Piece::Bishop => 'b',
        Piece::Knight => 'n',
        Piece::Pawn | Piece::King => unreachable!("pawns/kings are never promotion targets"),
    }
}

fn parse_promotion_char(c: char) -> Option<Piece> {
    match c.to_ascii_lowercase() {
        'q' => Some(Piece::Queen),
        'r' => Some(Piece::Rook),
        'b' => Some(Piece::Bishop),
        'n' => Some(Piece::Knight),
        _ => None,
    }
}

/// Parse a UCI token (`e2e4`, `e7e8q`) against the given position. Returns
/// `None` if the shape doesn't match or the move isn't legal there.
pub fn parse_uci(board: &Board, token: &str) -> Option<ChessMove> {
    let t = token.trim();
    if t.len() < 4 || t.len() > 5 {
        return None;
    }
    let from = Square::from_str(&t[0..2]).ok()?;
    let to = Square::from_str(&t[2..4]).ok()?;
    let promo = if t.len() == 5 {
        Some(parse_promotion_char(t.chars().nth(4)?)?)
    } else {
        None
    };
    let candidate = ChessMove::new(from, to, promo);
    MoveGen::new_legal(board).find(|m| *m == candidate)
}

/// True if `mv` captures a piece (including en passant) when played on `board`.
pub fn is_capture(board: &Board, mv: ChessMove) -> bool {
    let to = mv.get_dest();
    let us = board.side_to_move();
    let them = !us;
    if board.color_on(to) == Some(them) {
        return true;
    }
    if let Some(ep_sq) = board.en_passant() {
        if to == ep_sq {
            if let Some(piece) = board.piece_on(mv.get_source()) {
                if piece == Piece::Pawn
                    && mv.get_source().get_file() != to.get_file()
                    && board.piece_on(to).is_none()
                {
                    return true;
                }
            }
        }
    }
    false
}

fn piece_letter(p: Piece) -> &'static str {
    match p {
        Piece::Pawn => "",
        Piece::Knight => "N",
        Piece::Bishop => "B",
        Piece::Rook => "R",
        Piece::Queen => "Q",
        Piece::King => "K",
    }
}

fn is_castle(board: &Board, mv: ChessMove) -> Option<&'static str> {
    let piece = board.piece_on(mv.get_source())?;
    if piece != Piece::King {
        return None;
    }
    let from_file = mv.get_source().get_file().to_index() as i8;
    let to_file = mv.get_dest().get_file().to_index() as i8;
    if mv.get_source().get_rank() != mv.get_dest().get_rank() {
        return None;
    }
    match to_file - from_file {
        2 => Some("O-O"),
        -2 => Some("O-O-O"),
        _ => None,
    }
}

/// Format `mv` as SAN in the context of `board` (the position *before* the
/// move is played), including check/mate suffixes and disambiguation.
pub fn format_san(board: &Board, mv: ChessMove) -> String {
    let after = board.make_move_new(mv);
    let suffix = if after.status() == chess::BoardStatus::Checkmate {
        "#"
    } else if after.checkers().popcnt() > 0 {
        "+"
    } else {
        ""
    };

    if let Some(castle) = is_castle(board, mv) {
        return format!("{castle}{suffix}");
    }

    let piece = board
        .piece_on(mv.get_source())
        .expect("SAN formatting requires a piece on the move's source square");
    let capture = is_capture(board, mv);
    let dest = mv.get_dest().to_string();

    if piece == Piece::Pawn {
        let mut body = if capture {
            let file = file_char(mv.get_source().get_file());
            format!("{file}x{dest}")
        } else {
            dest
        };
        if let Some(promo) = mv.get_promotion() {
            body.push('=');
            body.push(promo_letter(promo));
        }
        return format!("{body}{suffix}");
    }

    let disambig = disambiguation(board, mv, piece);
    let x = if capture { "x" } else { "" };
    format!("{}{}{}{}{}", piece_letter(piece), disambig, x, dest, suffix)
}

fn file_char(f: File) -> char {
    (b'a' + f.to_index() as u8) as char
}

fn promo_letter(p: Piece) -> char {
    match p {
        Piece::Queen => 'Q',
        Piece::Rook => 'R',
        Piece::Bishop => 'B',
        Piece::Knight => 'N',
        _ => unreachable!(),
    }
}

/// Minimal disambiguation: file, then rank, then full square, following the
/// usual SAN rule of using the least amount of information that resolves
/// ambiguity among same-piece-same-destination legal moves.
fn disambiguation(board: &Board, mv: ChessMove, piece: Piece) -> String {
    let others: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|m| {
            *m != mv
                && m.get_dest() == mv.get_dest()
                && board.piece_on(m.get_source()) == Some(piece)
        })
        .collect();
    if others.is_empty() {
        return String::new();
    }
    let same_file = others
        .iter()
        .any(|m| m.get_source().get_file() == mv.get_source().get_file());
    let same_rank = others
        .iter()
        .any(|m| m.get_source().get_rank() == mv.get_source().get_rank());
    if !same_file {
        file_char(mv.get_source().get_file()).to_string()
    } else if !same_rank {
        rank_char(mv.get_source().get_rank()).to_string()
    } else {
        mv.get_source().to_string()
    }
}

fn rank_char(r: Rank) -> char {
    (b'1' + r.to_index() as u8) as char
}

fn parse_castle(board: &Board, queenside: bool) -> Option<ChessMove> {
    let side = board.side_to_move();
    let rank = if side == Color::White {
        Rank::First
    } else {
        Rank::Eighth
    };
    let king_from = Square::make_square(rank, File::E);
    let king_to = Square::make_square(rank, if queenside { File::C } else { File::G });
    let candidate = ChessMove::new(king_from, king_to, None);
    MoveGen::new_legal(board).find(|m| *m == candidate)
}

/// Parse a SAN token against `board`. Tolerant of `+`/`#` suffixes, `x`
/// capture markers and both `=Q`/`Q`-suffix promotion spellings.
pub fn parse_san(board: &Board, token: &str) -> Option<ChessMove> {
    let s = token.trim();
    let upper = s.to_ascii_uppercase();
    if upper == "O-O" || s == "0-0" {
        return parse_castle(board, false);
    }
    if upper == "O-O-O" || s == "0-0-0" {
        return parse_castle(board, true);
    }

    let s = s.trim_end_matches(['+', '#']);

    let (body, promo) = if let Some(pos) = s.find('=') {
        (&s[..pos], parse_promotion_char(s[pos + 1..].chars().next()?))
    } else if s.len() >= 2 {
        let last = s.chars().last()?;
        let second_last = s.chars().nth(s.len() - 2)?;
        if second_last.is_ascii_digit() {
            if let Some(p) = parse_promotion_char(last) {
                (&s[..s.len() - 1], Some(p))
            } else {
                (s, None)
            }
        } else {
            (s, None)
        }
    } else {
        (s, None)
    };

    let body = body.replace(['x', 'X'], "");
    if body.len() < 2 {
        return None;
    }
    let dest_str = &body[body.len() - 2..];
    let dest = Square::from_str(&dest_str.to_lowercase()).ok()?;

    let piece_type = if body.len() > 2 {
        parse_piece_char(body.chars().next()?)
    } else {
        None
    };
    let expected_piece = piece_type.unwrap_or(Piece::Pawn);

    let disambig = if body.len() > 3 {
        Some(&body[1..body.len() - 2])
    } else {
        None
    };

    let mut matches: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(expected_piece)
                && m.get_promotion() == promo
        })
        .collect();

    if let Some(d) = disambig {
        matches.retain(|m| matches_disambiguation(*m, d));
    }

    if matches.len() == 1 {
        Some(matches[0])
    } else {
        None
    }
}

fn matches_disambiguation(mv: ChessMove, disambig: &str) -> bool {
    if disambig.len() == 1 {
        let ch = disambig.chars().next().unwrap();
        if ch.is_ascii_alphabetic() {
            return file_char(mv.get_source().get_file()) == ch.to_ascii_lowercase();
        }
        if ch.is_ascii_digit() {
            return rank_char(mv.get_source().get_rank()) == ch;
        }
        false
    } else if disambig.len() == 2 {
        Square::from_str(&disambig.to_lowercase())
            .map(|sq| mv.get_source() == sq)
            .unwrap_or(false)
    } else {
        false
    }
}

fn parse_piece_char(c: char) -> Option<Piece> {
    match c.to_ascii_uppercase() {
        'K' => Some(Piece::King),
        'Q' => Some(Piece::Queen),
        'R' => Some(Piece::Rook),
        'B' => Some(Piece::Bishop),
        'N' => Some(Piece::Knight),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Board;

    #[test]
    fn round_trips_opening_pawn_push() {
        let board = Board::default();
        let mv = MoveGen::new_legal(&board)
            .find(|m| format_uci(*m) == "e2e4")
            .unwrap();
        assert_eq!(format_san(&board, mv), "e4");
        assert_eq!(parse_san(&board, "e4"), Some(mv));
        assert_eq!(parse_uci(&board, "e2e4"), Some(mv));
    }

    #[test]
    fn formats_knight_development_and_disambiguates() {
        let board =
            Board::from_str("r1bqkbnr/pppppppp/2n5/8/8/2N5/PPPPPPPP/R1BQKBNR w KQkq - 2 2")
                .unwrap();
        let mv = MoveGen::new_legal(&board)
            .find(|m| format_uci(*m) == "g1f3")
            .unwrap();
        assert_eq!(format_san(&board, mv), "Nf3");
        assert_eq!(parse_san(&board, "Nf3"), Some(mv));
        assert_eq!(parse_san(&board, "Ngf3"), Some(mv));
    }

    #[test]
    fn castling_round_trips() {
        let board =
            Board::from_str("r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 6 6")
                .unwrap();
        let mv = parse_san(&board, "O-O").unwrap();
        assert_eq!(format_san(&board, mv), "O-O");
    }

    #[test]
    fn rejects_illegal_san_token() {
        let board = Board::default();
        assert_eq!(parse_san(&board, "Qh5"), None);
        assert_eq!(parse_uci(&board, "e2e5"), None);
    }
}
