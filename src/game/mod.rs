use std::str::FromStr;

use chess::{ChessMove, Color, Piece, Square};

use crate::game::error::GameError;

pub mod ai;
pub mod error;
pub mod replay;
pub mod rules;
pub mod session;
pub mod variant;

/// A tagged move value: source, destination and an optional promotion piece,
/// validated at construction. This replaces the loose `{from, to, promotion}`
/// objects that float around the wire protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

impl Move {
    pub fn new(from: Square, to: Square, promotion: Option<Piece>) -> Result<Self, GameError> {
        if let Some(piece) = promotion {
            if !matches!(
                piece,
                Piece::Queen | Piece::Rook | Piece::Bishop | Piece::Knight
            ) {
                return Err(GameError::MalformedMove(format!(
                    "cannot promote to {:?}",
                    piece
                )));
            }
        }
        Ok(Self {
            from,
            to,
            promotion,
        })
    }

    pub fn from_chess_move(mv: ChessMove) -> Self {
        Self {
            from: mv.get_source(),
            to: mv.get_dest(),
            promotion: mv.get_promotion(),
        }
    }

    /// Parses the `{from, to, promotion?}` shape used by the engine protocols.
    pub fn from_wire(from: &str, to: &str, promotion: Option<&str>) -> Result<Self, GameError> {
        let from = Square::from_str(from)
            .map_err(|_| GameError::MalformedMove(format!("bad square {:?}", from)))?;
        let to = Square::from_str(to)
            .map_err(|_| GameError::MalformedMove(format!("bad square {:?}", to)))?;
        let promotion = match promotion {
            None | Some("") => None,
            Some(s) => Some(
                piece_from_str(s)
                    .ok_or_else(|| GameError::MalformedMove(format!("bad piece {:?}", s)))?,
            ),
        };
        Self::new(from, to, promotion)
    }

    pub fn to_chess_move(self) -> ChessMove {
        ChessMove::new(self.from, self.to, self.promotion)
    }
}

/// A committed move: the move itself, its SAN rendering and the color that
/// played it. Records are grouped per turn and never mutated after the turn
/// closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub mv: Move,
    pub san: String,
    pub color: Color,
}

pub fn color_to_string(color: Color) -> String {
    match color {
        Color::White => "white".to_string(),
        Color::Black => "black".to_string(),
    }
}

pub fn piece_from_str(s: &str) -> Option<Piece> {
    match s {
        "p" | "P" => Some(Piece::Pawn),
        "n" | "N" => Some(Piece::Knight),
        "b" | "B" => Some(Piece::Bishop),
        "r" | "R" => Some(Piece::Rook),
        "q" | "Q" => Some(Piece::Queen),
        "k" | "K" => Some(Piece::King),
        _ => None,
    }
}

pub fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}
