//! Chess rules adapter over the `chess` crate.
//!
//! Everything here answers questions about standard chess only: legal
//! destinations, applying a move, terminal states and SAN rendering. The
//! Dicey-Chess-specific restrictions live in [`crate::game::variant`]. The one
//! deliberate rules-engine override is [`force_side_to_move`], which the
//! variant needs to let one player move several times in a row.

use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square, ALL_SQUARES};

use crate::game::error::GameError;
use crate::game::{Move, MoveRecord};

/// All squares a piece on `from` may legally move to under standard chess
/// rules, check-safety included.
pub fn legal_destinations(board: &Board, from: Square) -> Vec<Square> {
    let mut dests: Vec<Square> = MoveGen::new_legal(board)
        .filter(|m| m.get_source() == from)
        .map(|m| m.get_dest())
        .collect();
    dests.dedup(); // promotions enumerate one move per piece choice
    dests
}

/// Applies `mv` to `board`, producing the new position and a committed move
/// record with SAN notation. Fails with [`GameError::IllegalMove`] if the move
/// is not legal in the position.
pub fn apply(board: &Board, mv: Move) -> Result<(Board, MoveRecord), GameError> {
    let chess_move = mv.to_chess_move();
    if !board.legal(chess_move) {
        return Err(GameError::IllegalMove(chess_move.to_string()));
    }
    let record = MoveRecord {
        mv,
        san: san(board, chess_move),
        color: board.side_to_move(),
    };
    Ok((board.make_move_new(chess_move), record))
}

pub fn is_checkmate(board: &Board) -> bool {
    board.status() == BoardStatus::Checkmate
}

/// Stalemate or a dead position (insufficient material). Dicey Chess has one
/// further draw condition of its own, checked by the state machine.
pub fn is_stalemate_or_draw(board: &Board) -> bool {
    board.status() == BoardStatus::Stalemate || has_insufficient_material(board)
}

pub fn in_check(board: &Board) -> bool {
    board.checkers().popcnt() > 0
}

/// Rewrites whose turn it is without a move being played. Piece placement and
/// castling rights are untouched; the en-passant target is dropped because it
/// only had meaning for the side that just lost the move.
///
/// The state machine guarantees it never asks for a swap that leaves the
/// non-moving side in check (mid-turn checks are rejected and a 0-roll in
/// check forces a re-roll), so a rejection here means the caller broke that
/// contract.
pub fn force_side_to_move(board: &Board, color: Color) -> Result<Board, GameError> {
    if board.side_to_move() == color {
        return Ok(*board);
    }
    let fen = board.to_string();
    let mut fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(GameError::InvalidPosition(fen));
    }
    fields[1] = match color {
        Color::White => "w",
        Color::Black => "b",
    };
    fields[3] = "-";
    let swapped = fields.join(" ");
    Board::from_str(&swapped).map_err(|e| GameError::InvalidPosition(format!("{}: {}", swapped, e)))
}

/// Renders `mv` in standard algebraic notation for the given position,
/// including disambiguation, castling, capture marks, promotion and
/// check/checkmate suffixes.
pub fn san(board: &Board, mv: ChessMove) -> String {
    let from = mv.get_source();
    let to = mv.get_dest();
    let piece = board.piece_on(from).unwrap_or(Piece::Pawn);

    let mut out = String::new();
    let castled = piece == Piece::King
        && (from.get_file().to_index() as i32 - to.get_file().to_index() as i32).abs() == 2;
    if castled {
        out.push_str(if to.get_file() == File::G { "O-O" } else { "O-O-O" });
    } else {
        let captures = board.piece_on(to).is_some()
            || (piece == Piece::Pawn && from.get_file() != to.get_file());
        if piece == Piece::Pawn {
            if captures {
                out.push(file_char(from.get_file()));
            }
        } else {
            out.push(piece_san_letter(piece));
            out.push_str(&disambiguation(board, mv, piece));
        }
        if captures {
            out.push('x');
        }
        out.push(file_char(to.get_file()));
        out.push(rank_char(to.get_rank()));
        if let Some(promotion) = mv.get_promotion() {
            out.push('=');
            out.push(piece_san_letter(promotion));
        }
    }

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        out.push('#');
    } else if in_check(&after) {
        out.push('+');
    }
    out
}

/// Finds the legal move whose SAN rendering matches `text` (check suffixes
/// ignored). Used to reconstruct saved games, whose move history is stored as
/// comma-joined SAN.
pub fn find_move_by_san(board: &Board, text: &str) -> Option<ChessMove> {
    let wanted = strip_san_suffix(text);
    MoveGen::new_legal(board).find(|&m| strip_san_suffix(&san(board, m)) == wanted)
}

pub fn strip_san_suffix(text: &str) -> &str {
    text.trim_end_matches(['+', '#', '!', '?'])
}

fn piece_san_letter(piece: Piece) -> char {
    match piece {
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
        Piece::Pawn => 'P',
    }
}

fn file_char(file: File) -> char {
    (b'a' + file.to_index() as u8) as char
}

fn rank_char(rank: Rank) -> char {
    (b'1' + rank.to_index() as u8) as char
}

/// SAN disambiguation: file first, then rank, then both, considering only
/// legal sibling moves of the same piece type to the same destination.
fn disambiguation(board: &Board, mv: ChessMove, piece: Piece) -> String {
    let from = mv.get_source();
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == mv.get_dest()
                && m.get_source() != from
                && board.piece_on(m.get_source()) == Some(piece)
        })
        .map(|m| m.get_source())
        .collect();
    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|sq| sq.get_file() != from.get_file()) {
        return file_char(from.get_file()).to_string();
    }
    if rivals.iter().all(|sq| sq.get_rank() != from.get_rank()) {
        return rank_char(from.get_rank()).to_string();
    }
    format!("{}{}", file_char(from.get_file()), rank_char(from.get_rank()))
}

/// True when neither side can possibly deliver mate (bare kings, a lone minor
/// piece, or same-colored single bishops).
pub fn has_insufficient_material(board: &Board) -> bool {
    let mut minors: Vec<(Color, Piece, Square)> = Vec::new();
    for square in ALL_SQUARES {
        match board.piece_on(square) {
            None | Some(Piece::King) => {}
            Some(piece @ (Piece::Bishop | Piece::Knight)) => {
                let color = match board.color_on(square) {
                    Some(c) => c,
                    None => continue,
                };
                minors.push((color, piece, square));
            }
            // any pawn, rook or queen is mating material
            Some(_) => return false,
        }
    }
    match minors.as_slice() {
        [] | [_] => true,
        [(c1, Piece::Bishop, sq1), (c2, Piece::Bishop, sq2)] if c1 != c2 => {
            square_shade(*sq1) == square_shade(*sq2)
        }
        _ => false,
    }
}

fn square_shade(sq: Square) -> usize {
    (sq.get_rank().to_index() + sq.get_file().to_index()) % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        Board::from_str(fen).unwrap()
    }

    fn cm(from: &str, to: &str) -> ChessMove {
        ChessMove::new(
            Square::from_str(from).unwrap(),
            Square::from_str(to).unwrap(),
            None,
        )
    }

    #[test]
    fn san_for_quiet_pawn_and_knight_moves() {
        let b = Board::default();
        assert_eq!(san(&b, cm("e2", "e4")), "e4");
        assert_eq!(san(&b, cm("g1", "f3")), "Nf3");
    }

    #[test]
    fn san_marks_pawn_captures_with_file() {
        let b = board("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2");
        assert_eq!(san(&b, cm("e4", "d5")), "exd5");
    }

    #[test]
    fn san_for_castling() {
        let b = board("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPPBPPP/RNBQK2R w KQkq - 4 4");
        assert_eq!(san(&b, cm("e1", "g1")), "O-O");
    }

    #[test]
    fn san_disambiguates_by_file() {
        // two rooks on an open first rank can both reach b1
        let b = board("4k3/8/8/8/8/8/3K4/R6R w - - 0 1");
        let mv = ChessMove::new(Square::A1, Square::B1, None);
        assert_eq!(san(&b, mv), "Rab1");
    }

    #[test]
    fn san_promotion_with_check_suffix() {
        let b = board("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        let mv = ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen));
        // queen lands on a8 and checks e8 along the rank
        assert_eq!(san(&b, mv), "a8=Q+");
    }

    #[test]
    fn find_move_by_san_roundtrips() {
        let b = Board::default();
        for m in MoveGen::new_legal(&b) {
            let text = san(&b, m);
            assert_eq!(find_move_by_san(&b, &text), Some(m), "san {}", text);
        }
    }

    #[test]
    fn force_side_to_move_keeps_placement() {
        let b = Board::default();
        let swapped = force_side_to_move(&b, Color::Black).unwrap();
        assert_eq!(swapped.side_to_move(), Color::Black);
        for sq in ALL_SQUARES {
            assert_eq!(b.piece_on(sq), swapped.piece_on(sq));
        }
        // no-op when the side already matches
        let same = force_side_to_move(&b, Color::White).unwrap();
        assert_eq!(same, b);
    }

    #[test]
    fn apply_rejects_illegal_moves() {
        let b = Board::default();
        assert!(matches!(
            apply(&b, Move::new(Square::E2, Square::E5, None).unwrap()),
            Err(GameError::IllegalMove(_))
        ));
    }

    #[test]
    fn insufficient_material_cases() {
        assert!(has_insufficient_material(&board("4k3/8/8/8/8/8/8/4K3 w - - 0 1")));
        assert!(has_insufficient_material(&board(
            "4k3/8/8/8/8/8/8/2B1K3 w - - 0 1"
        )));
        // opposite-colored bishops can still mate
        assert!(!has_insufficient_material(&board(
            "2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1"
        )));
        assert!(!has_insufficient_material(&board(
            "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"
        )));
    }
}
