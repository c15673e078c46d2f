//! Dicey Chess restrictions layered on top of the standard rules.
//!
//! Two rules distinguish the variant from standard chess. Kings are never
//! captured or mated mid-sequence: a move may only give check if it is the
//! last move of the mover's turn, and no move may land on a king square.
//! Promotions mid-turn are forced to a queen so the prompt never interrupts a
//! multi-move sequence.

use chess::{Board, ChessMove, Color, MoveGen, Piece, Rank, Square};

use crate::game::rules;

/// True if moving `from` → `to` is allowed right now. `is_last` says whether
/// this would be the final move of the current turn; only then may the move
/// give check.
pub fn is_valid_move(board: &Board, from: Square, to: Square, is_last: bool) -> bool {
    if board.piece_on(to) == Some(Piece::King) {
        return false;
    }
    // promotions enumerate one legal move per piece; prefer the queen since
    // that is what a mid-turn promotion is forced to
    let candidate = MoveGen::new_legal(board)
        .filter(|m| m.get_source() == from && m.get_dest() == to)
        .max_by_key(|m| m.get_promotion() == Some(Piece::Queen));
    match candidate {
        Some(m) => is_last || !gives_check(board, m),
        None => false,
    }
}

pub fn gives_check(board: &Board, mv: ChessMove) -> bool {
    rules::in_check(&board.make_move_new(mv))
}

/// The variant-legal move set: standard legal moves minus king captures and,
/// mid-turn, minus checking moves and non-queen promotions.
pub fn legal_moves(board: &Board, is_last: bool) -> Vec<ChessMove> {
    MoveGen::new_legal(board)
        .filter(|m| board.piece_on(m.get_dest()) != Some(Piece::King))
        .filter(|m| is_last || !gives_check(board, *m))
        .filter(|m| is_last || !matches!(m.get_promotion(), Some(p) if p != Piece::Queen))
        .collect()
}

/// Whether `from` → `to` would promote a pawn of `color`.
pub fn is_promotion_move(board: &Board, from: Square, to: Square, color: Color) -> bool {
    let last_rank = match color {
        Color::White => Rank::Eighth,
        Color::Black => Rank::First,
    };
    to.get_rank() == last_rank
        && board.piece_on(from) == Some(Piece::Pawn)
        && board.color_on(from) == Some(color)
}

/// The promotion pieces the mover may pick from. The full set is only offered
/// on the last move of the turn; earlier promotions are forced to a queen.
pub fn possible_promotions(is_last: bool) -> Vec<Piece> {
    if is_last {
        vec![Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight]
    } else {
        vec![Piece::Queen]
    }
}

/// Comma-joined SAN of the variant-legal move set, used as the `searchmoves`
/// allowlist sent to the remote engine. `None` when no move is allowed.
pub fn san_allowlist(board: &Board, is_last: bool) -> Option<String> {
    let moves = legal_moves(board, is_last);
    if moves.is_empty() {
        return None;
    }
    Some(
        moves
            .iter()
            .map(|m| rules::san(board, *m))
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn board(fen: &str) -> Board {
        Board::from_str(fen).unwrap()
    }

    #[test]
    fn checking_moves_rejected_unless_last() {
        // the white queen checks the black king on e8 by sliding to the e-file
        let b = board("4k3/8/8/8/7Q/8/8/4K3 w - - 0 1");
        let from = Square::H4;
        let to = Square::E4;
        assert!(gives_check(&b, ChessMove::new(from, to, None)));
        assert!(!is_valid_move(&b, from, to, false));
        assert!(is_valid_move(&b, from, to, true));
    }

    #[test]
    fn king_square_is_never_a_destination() {
        let b = board("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        // rejected before the move generator is even consulted
        assert!(!is_valid_move(&b, Square::A1, Square::E8, true));
        let moves = legal_moves(&b, true);
        assert!(moves
            .iter()
            .all(|m| b.piece_on(m.get_dest()) != Some(Piece::King)));
    }

    #[test]
    fn mid_turn_promotions_offer_only_queen() {
        assert_eq!(possible_promotions(false), vec![Piece::Queen]);
        assert_eq!(possible_promotions(true).len(), 4);
    }

    #[test]
    fn san_allowlist_is_comma_joined() {
        let b = Board::default();
        let list = san_allowlist(&b, true).unwrap();
        assert_eq!(list.split(',').count(), 20);
        assert!(list.split(',').any(|m| m == "e4"));
        assert!(list.split(',').any(|m| m == "Nf3"));
    }

    #[test]
    fn promotion_move_detection() {
        let b = board("8/P6k/8/8/8/8/8/4K3 w - - 0 1");
        assert!(is_promotion_move(&b, Square::A7, Square::A8, Color::White));
        assert!(!is_promotion_move(&b, Square::E1, Square::E2, Color::White));
    }

    #[test]
    fn mid_turn_move_set_excludes_non_queen_promotions() {
        let b = board("8/P6k/8/8/8/8/8/4K3 w - - 0 1");
        let mid = legal_moves(&b, false);
        assert!(mid
            .iter()
            .all(|m| !matches!(m.get_promotion(), Some(p) if p != Piece::Queen)));
        let last = legal_moves(&b, true);
        assert!(last.iter().any(|m| m.get_promotion() == Some(Piece::Rook)));
    }
}
