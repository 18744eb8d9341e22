//! Position Analyzer (spec §4.1): threats, material, phase, tactical density.

use chess::{get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks};
use chess::{BitBoard, Board, Color, MoveGen, Piece, Square};
use std::str::FromStr;

/// Game phase, tuned by the classifier in [`classify_phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Opening,
    Middlegame,
    Endgame,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Opening => "opening",
            Phase::Middlegame => "middlegame",
            Phase::Endgame => "endgame",
        };
        f.write_str(s)
    }
}

/// Statistics accompanying a [`Phase`] classification (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct PhaseInfo {
    pub fullmove_number: u32,
    pub piece_count: u32,
    pub total_material: i32,
    pub material_balance: i32,
    pub queens_on_board: u32,
    pub major_pieces: u32,
    pub minor_pieces: u32,
    pub castling_available: bool,
    pub developed_minor_pieces: u32,
}

/// Full analysis of a position from the perspective of the side to move.
#[derive(Debug, Clone)]
pub struct PositionAnalysis {
    pub material_balance: i32,
    pub hanging_squares: Vec<Square>,
    pub threats_text: String,
    pub tactical_density: u32,
    pub phase: Phase,
    pub phase_info: PhaseInfo,
    pub center_control: CenterControl,
    pub king_safety: KingSafety,
    pub piece_activity: PieceActivity,
}

/// Attackers-per-center-square summary (ambient extra, spec.md §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterControl {
    pub white: u32,
    pub black: u32,
}

/// Non-prompted extra stats (SPEC_FULL §B).
#[derive(Debug, Clone, Copy, Default)]
pub struct KingSafety {
    pub side_to_move_king_attackers: u32,
    pub opponent_king_attackers: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PieceActivity {
    pub side_to_move_mobility: u32,
    pub opponent_mobility: u32,
}

pub fn piece_value(p: Piece) -> i32 {
    match p {
        Piece::Pawn => 1,
        Piece::Knight => 3,
        Piece::Bishop => 3,
        Piece::Rook => 5,
        Piece::Queen => 9,
        Piece::King => 0,
    }
}

/// Material balance from `perspective`'s point of view (kings excluded).
pub fn material_balance(board: &Board, perspective: Color) -> i32 {
    let mut score = 0;
    for piece in [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
    ] {
        let white = (board.pieces(piece) & board.color_combined(Color::White)).popcnt() as i32;
        let black = (board.pieces(piece) & board.color_combined(Color::Black)).popcnt() as i32;
        let signed = if perspective == Color::White {
            white - black
        } else {
            black - white
        };
        score += signed * piece_value(piece);
    }
    score
}

/// Squares from which a piece of `color` attacks `square`, via the
/// crate's directional attack tables (the usual bitboard "attacks-to"
/// trick: flip the attacker color for pawns since their attack pattern is
/// not symmetric; every other piece's pattern already is).
pub fn attackers_of(board: &Board, square: Square, color: Color) -> BitBoard {
    let occupied = *board.combined();
    let pawns = get_pawn_attacks(square, !color, occupied) & board.pieces(Piece::Pawn);
    let knights = get_knight_moves(square) & board.pieces(Piece::Knight);
    let kings = get_king_moves(square) & board.pieces(Piece::King);
    let diagonal =
        get_bishop_moves(square, occupied) & (board.pieces(Piece::Bishop) | board.pieces(Piece::Queen));
    let straight =
        chess::get_rook_moves(square, occupied) & (board.pieces(Piece::Rook) | board.pieces(Piece::Queen));
    (pawns | knights | kings | diagonal | straight) & board.color_combined(color)
}

/// Squares holding a side-to-move piece attacked more times than defended.
pub fn hanging_squares(board: &Board) -> Vec<Square> {
    let us = board.side_to_move();
    let them = !us;
    let mut out = Vec::new();
    for sq in chess::ALL_SQUARES {
        if board.color_on(sq) != Some(us) {
            continue;
        }
        let attackers = attackers_of(board, sq, them).popcnt();
        let defenders = attackers_of(board, sq, us).popcnt();
        if attackers > defenders {
            out.push(sq);
        }
    }
    out
}

/// `chess::Board` has no `king_square` accessor; isolate the king bit and
/// read it off, the way other consumers of this crate do.
fn king_square(board: &Board, color: Color) -> Square {
    (board.pieces(Piece::King) & board.color_combined(color)).to_square()
}

fn checking_pieces_text(board: &Board) -> Vec<String> {
    if board.checkers().popcnt() == 0 {
        return Vec::new();
    }
    let king_sq = king_square(board, board.side_to_move());
    attackers_of(board, king_sq, !board.side_to_move())
        .map(|sq| {
            let piece = board.piece_on(sq).expect("checker square must hold a piece");
            format!("{:?} on {}", piece, sq)
        })
        .collect()
}

fn protected_attacks_text(board: &Board) -> Vec<String> {
    let us = board.side_to_move();
    let them = !us;
    let mut out = Vec::new();
    for sq in chess::ALL_SQUARES {
        if board.color_on(sq) != Some(them) {
            continue;
        }
        let our_attackers = attackers_of(board, sq, us).popcnt();
        if our_attackers == 0 {
            continue;
        }
        let their_defenders = attackers_of(board, sq, them).popcnt();
        if our_attackers > their_defenders {
            let piece = board.piece_on(sq).unwrap();
            out.push(format!("Attack on {:?} at {} may win material", piece, sq));
        }
    }
    out
}

/// Human-readable threats summary (spec §4.1: checkers, hanging pieces,
/// candidate wins).
pub fn threats_text(board: &Board) -> String {
    let mut lines = Vec::new();
    if board.checkers().popcnt() > 0 {
        lines.push(format!(
            "You are in check from {}.",
            checking_pieces_text(board).join(", ")
        ));
    }
    let hanging: Vec<String> = hanging_squares(board)
        .into_iter()
        .map(|sq| {
            let piece = board.piece_on(sq).unwrap();
            let them = !board.side_to_move();
            let a = attackers_of(board, sq, them).popcnt();
            let d = attackers_of(board, sq, board.side_to_move()).popcnt();
            format!("{:?} on {} (attacked {}, defended {})", piece, sq, a, d)
        })
        .collect();
    if !hanging.is_empty() {
        lines.push(format!("Hanging pieces: {}.", hanging.join(", ")));
    }
    let traps = protected_attacks_text(board);
    if !traps.is_empty() {
        lines.push(format!("Potential traps: {}.", traps.join(", ")));
    }
    if lines.is_empty() {
        "No immediate threats.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Legal captures plus legal checking moves: a coarse sharpness proxy.
pub fn tactical_density(board: &Board) -> u32 {
    let mut captures = 0u32;
    let mut checks = 0u32;
    for mv in MoveGen::new_legal(board).take(50) {
        if crate::notation::is_capture(board, mv) {
            captures += 1;
        }
        if board.make_move_new(mv).checkers().popcnt() > 0 {
            checks += 1;
        }
    }
    captures + checks
}

const STARTING_KNIGHT_SQUARES: [Square; 4] =
    [Square::B1, Square::G1, Square::B8, Square::G8];
const STARTING_BISHOP_SQUARES: [Square; 4] =
    [Square::C1, Square::F1, Square::C8, Square::F8];

fn developed_minor_pieces(board: &Board) -> u32 {
    let mut developed = 0;
    for sq in STARTING_KNIGHT_SQUARES.into_iter().chain(STARTING_BISHOP_SQUARES) {
        match board.piece_on(sq) {
            Some(Piece::Knight) | Some(Piece::Bishop) => {}
            _ => developed += 1,
        }
    }
    developed
}

/// Castling rights aren't exposed as a typed query; read them off the FEN's
/// castling field (the 3rd space-separated segment) instead.
fn has_any_castle_rights(board: &Board) -> bool {
    board
        .to_string()
        .split_whitespace()
        .nth(2)
        .map(|field| field != "-")
        .unwrap_or(false)
}

/// Deterministic phase classifier (spec §4.1, priority order).
pub fn classify_phase(board: &Board) -> (Phase, PhaseInfo) {
    let mut piece_count = 0u32;
    let mut white_material = 0i32;
    let mut black_material = 0i32;
    let mut queens = 0u32;
    let mut majors = 0u32;
    let mut minors = 0u32;
    for sq in chess::ALL_SQUARES {
        if let Some(piece) = board.piece_on(sq) {
            piece_count += 1;
            let color = board.color_on(sq).unwrap();
            let val = piece_value(piece);
            if color == Color::White {
                white_material += val;
            } else {
                black_material += val;
            }
            match piece {
                Piece::Queen => queens += 1,
                Piece::Rook => majors += 1,
                Piece::Bishop | Piece::Knight => minors += 1,
                _ => {}
            }
        }
    }
    majors += queens;
    let total_material = white_material + black_material;
    let fullmove_number = fullmove_number(board);

    let info = PhaseInfo {
        fullmove_number,
        piece_count,
        total_material,
        material_balance: white_material - black_material,
        queens_on_board: queens,
        major_pieces: majors,
        minor_pieces: minors,
        castling_available: has_any_castle_rights(board),
        developed_minor_pieces: developed_minor_pieces(board),
    };

    if piece_count <= 10 || total_material <= 20 || (queens == 0 && majors <= 2) {
        return (Phase::Endgame, info);
    }
    if fullmove_number <= 12
        && (info.developed_minor_pieces <= 4 || info.castling_available)
        && piece_count >= 28
    {
        return (Phase::Opening, info);
    }
    (Phase::Middlegame, info)
}

/// `chess::Board` doesn't expose the fullmove counter directly; it's the
/// fifth space-separated FEN field.
pub fn fullmove_number(board: &Board) -> u32 {
    board
        .to_string()
        .split_whitespace()
        .last()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

/// Halfmove clock (fifty-move rule), read from FEN field 5.
pub fn halfmove_clock(board: &Board) -> u32 {
    board
        .to_string()
        .split_whitespace()
        .nth(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

const CENTER_SQUARES: [Square; 4] = [Square::D4, Square::D5, Square::E4, Square::E5];

pub fn center_control(board: &Board) -> CenterControl {
    let mut white = 0;
    let mut black = 0;
    for sq in CENTER_SQUARES {
        white += attackers_of(board, sq, Color::White).popcnt();
        black += attackers_of(board, sq, Color::Black).popcnt();
    }
    CenterControl { white, black }
}

pub fn king_safety(board: &Board) -> KingSafety {
    let us = board.side_to_move();
    let them = !us;
    let our_king = king_square(board, us);
    let their_king = king_square(board, them);
    KingSafety {
        side_to_move_king_attackers: attackers_of(board, our_king, them).popcnt(),
        opponent_king_attackers: attackers_of(board, their_king, us).popcnt(),
    }
}

/// There is no null-move constructor on `Board`; flipping whose turn it is
/// to read off the opponent's mobility means editing the side-to-move field
/// of the FEN directly and dropping the en passant square, which would no
/// longer be capturable after a hypothetical null move anyway.
fn side_flipped(board: &Board) -> Option<Board> {
    let fen = board.to_string();
    let mut fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    fields[1] = if fields[1] == "w" { "b" } else { "w" };
    fields[3] = "-";
    Board::from_str(&fields.join(" ")).ok()
}

pub fn piece_activity(board: &Board) -> PieceActivity {
    let us_mobility = MoveGen::new_legal(board).len() as u32;
    let them_mobility = side_flipped(board)
        .map(|flipped| MoveGen::new_legal(&flipped).len() as u32)
        .unwrap_or(0);
    PieceActivity {
        side_to_move_mobility: us_mobility,
        opponent_mobility: them_mobility,
    }
}

/// Full analysis bundle for the side to move in `board`.
pub fn analyze(board: &Board) -> PositionAnalysis {
    let (phase, phase_info) = classify_phase(board);
    PositionAnalysis {
        material_balance: material_balance(board, board.side_to_move()),
        hanging_squares: hanging_squares(board),
        threats_text: threats_text(board),
        tactical_density: tactical_density(board),
        phase,
        phase_info,
        center_control: center_control(board),
        king_safety: king_safety(board),
        piece_activity: piece_activity(board),
    }
}

/// A single opening-book pattern: a UCI move prefix and its name.
pub struct OpeningPattern {
    pub moves: &'static [&'static str],
    pub name: &'static str,
}

/// Static table, longest-prefix-first so specific variations beat their
/// parent openings (spec §4.1). Transliterated from the original Python
/// source's pattern table.
pub static OPENING_TABLE: &[OpeningPattern] = &[
    OpeningPattern { moves: &["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"], name: "Ruy Lopez" },
    OpeningPattern { moves: &["e2e4", "e7e5", "g1f3", "b8c6", "d2d4"], name: "Scotch Game" },
    OpeningPattern { moves: &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4"], name: "Italian Game" },
    OpeningPattern { moves: &["d2d4", "g8f6", "c2c4", "e7e6", "b1c3", "f8b4"], name: "Nimzo-Indian Defense" },
    OpeningPattern { moves: &["d2d4", "g8f6", "c2c4", "g7g6", "b1c3", "d7d5"], name: "Grunfeld Defense" },
    OpeningPattern { moves: &["e2e4", "e7e5", "g1f3", "g8f6"], name: "Petroff Defense" },
    OpeningPattern { moves: &["d2d4", "g8f6", "c2c4", "g7g6"], name: "King's Indian Defense" },
    OpeningPattern { moves: &["d2d4", "g8f6", "c2c4", "c7c5"], name: "Benoni Defense" },
    OpeningPattern { moves: &["e2e4", "e7e5", "b1c3"], name: "Vienna Game" },
    OpeningPattern { moves: &["e2e4", "e7e5", "d1h5"], name: "Scholar's Mate Attempt" },
    OpeningPattern { moves: &["d2d4", "d7d5", "c2c4"], name: "Queen's Gambit" },
    OpeningPattern { moves: &["d2d4", "f7f5"], name: "Dutch Defense" },
    OpeningPattern { moves: &["e2e4", "e7e5"], name: "King's Pawn Game" },
    OpeningPattern { moves: &["e2e4", "c7c5"], name: "Sicilian Defense" },
    OpeningPattern { moves: &["e2e4", "e7e6"], name: "French Defense" },
    OpeningPattern { moves: &["e2e4", "c7c6"], name: "Caro-Kann Defense" },
    OpeningPattern { moves: &["e2e4", "g8f6"], name: "Alekhine Defense" },
    OpeningPattern { moves: &["e2e4", "d7d6"], name: "Pirc Defense" },
    OpeningPattern { moves: &["e2e4", "d7d5"], name: "Scandinavian Defense" },
    OpeningPattern { moves: &["d2d4", "g8f6"], name: "Indian Defenses (General)" },
    OpeningPattern { moves: &["d2d4", "d7d5"], name: "Queen's Pawn Game" },
    OpeningPattern { moves: &["c2c4"], name: "English Opening" },
    OpeningPattern { moves: &["g1f3"], name: "Reti Opening" },
    OpeningPattern { moves: &["f2f4"], name: "Bird's Opening" },
    OpeningPattern { moves: &["b2b4"], name: "Polish Opening (Sokolsky)" },
    OpeningPattern { moves: &["g2g4"], name: "Grob's Attack" },
];

/// Match `move_history` (UCI strings, in play order) against [`OPENING_TABLE`].
/// Falls back to "Variant of <name>" on a same-length set-equality match, to
/// absorb transpositions.
pub fn recognize_opening(move_history: &[String]) -> String {
    if move_history.is_empty() {
        return "Opening".to_string();
    }
    for pattern in OPENING_TABLE {
        let n = pattern.moves.len();
        if move_history.len() < n {
            continue;
        }
        let prefix = &move_history[..n];
        if prefix.iter().map(String::as_str).eq(pattern.moves.iter().copied()) {
            return pattern.name.to_string();
        }
        let prefix_set: std::collections::HashSet<&str> =
            prefix.iter().map(String::as_str).collect();
        let pattern_set: std::collections::HashSet<&str> = pattern.moves.iter().copied().collect();
        if prefix_set == pattern_set {
            return format!("Variant of {}", pattern.name);
        }
    }
    "Unknown Opening or Custom Position".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Board;

    #[test]
    fn starting_position_is_opening_and_balanced() {
        let board = Board::default();
        let (phase, info) = classify_phase(&board);
        assert_eq!(phase, Phase::Opening);
        assert_eq!(info.material_balance, 0);
        assert_eq!(material_balance(&board, Color::White), 0);
    }

    #[test]
    fn kq_vs_k_is_endgame() {
        let board = Board::from_str("4k3/8/8/8/8/8/4Q3/4K3 w - - 0 1").unwrap();
        let (phase, _) = classify_phase(&board);
        assert_eq!(phase, Phase::Endgame);
    }

    #[test]
    fn recognizes_ruy_lopez() {
        let history: Vec<String> = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(recognize_opening(&history), "Ruy Lopez");
    }

    #[test]
    fn detects_hanging_queen() {
        // White queen on e2, undefended, attacked by a black rook on e8.
        let board = Board::from_str("4r1k1/8/8/8/8/8/4Q3/4K3 w - - 0 1").unwrap();
        let hanging = hanging_squares(&board);
        assert_eq!(hanging, vec![Square::E2]);
    }
}
