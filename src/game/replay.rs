//! Step-through replay of a finished game.
//!
//! The engine keeps the flattened move list with each record's mover color
//! and derives any position by replaying from the initial board, forcing the
//! side to move whenever consecutive records belong to the same player. The
//! cursor counts applied moves, so `cursor == 0` shows the initial position.

use chess::{Board, Color};
use log::warn;

use crate::game::error::StorageError;
use crate::game::{rules, Move, MoveRecord};
use crate::models::saved_game::SavedGame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

impl StepDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(StepDirection::Forward),
            "backward" => Some(StepDirection::Backward),
            _ => None,
        }
    }
}

pub struct ReplayEngine {
    initial: Board,
    moves: Vec<MoveRecord>,
    cursor: usize,
    board: Board,
}

impl ReplayEngine {
    pub fn from_history(initial: Board, history: &[Vec<MoveRecord>]) -> Self {
        let moves: Vec<MoveRecord> = history.iter().flatten().cloned().collect();
        Self {
            initial,
            moves,
            cursor: 0,
            board: initial,
        }
    }

    pub fn from_session(session: &crate::game::session::GameSession) -> Self {
        Self::from_history(*session.initial_board(), session.turn_history())
    }

    /// Rebuilds the move list of a saved game from its comma-joined SAN and
    /// dice-roll histories. Histories that do not reproduce a playable game
    /// are reported as corrupt so the caller can discard the record.
    pub fn from_saved_game(saved: &SavedGame) -> Result<Self, StorageError> {
        let initial = Board::default();
        let rolls: Vec<u8> = if saved.dice_roll_history.is_empty() {
            Vec::new()
        } else {
            saved
                .dice_roll_history
                .split(',')
                .map(|s| {
                    s.trim()
                        .parse::<u8>()
                        .map_err(|_| StorageError::Corrupt(format!("bad dice roll {:?}", s)))
                })
                .collect::<Result<_, _>>()?
        };
        let sans: Vec<&str> = if saved.move_history.is_empty() {
            Vec::new()
        } else {
            saved.move_history.split(',').map(str::trim).collect()
        };

        let mut board = initial;
        let mut color = Color::White;
        let mut moves = Vec::with_capacity(sans.len());
        let mut idx = 0;
        'rolls: for roll in rolls {
            for _ in 0..roll {
                if idx == sans.len() {
                    break 'rolls;
                }
                if board.side_to_move() != color {
                    board = rules::force_side_to_move(&board, color)
                        .map_err(|e| StorageError::Corrupt(e.to_string()))?;
                }
                let san = sans[idx];
                let chess_move = rules::find_move_by_san(&board, san)
                    .ok_or_else(|| StorageError::Corrupt(format!("unplayable move {:?}", san)))?;
                moves.push(MoveRecord {
                    mv: Move::from_chess_move(chess_move),
                    san: san.to_string(),
                    color,
                });
                board = board.make_move_new(chess_move);
                idx += 1;
            }
            color = !color;
        }
        if idx != sans.len() {
            return Err(StorageError::Corrupt(
                "move history does not match dice rolls".to_string(),
            ));
        }
        Ok(Self {
            initial,
            moves,
            cursor: 0,
            board: initial,
        })
    }

    /// Moves the cursor one step. Forward returns the move just applied,
    /// backward the move just undone; `None` means the cursor was already at
    /// the corresponding end and nothing changed.
    pub fn step(&mut self, direction: StepDirection) -> Option<&MoveRecord> {
        match direction {
            StepDirection::Forward => {
                if self.cursor == self.moves.len() {
                    return None;
                }
                self.cursor += 1;
                self.board = self.position_at(self.cursor);
                Some(&self.moves[self.cursor - 1])
            }
            StepDirection::Backward => {
                if self.cursor == 0 {
                    return None;
                }
                self.cursor -= 1;
                self.board = self.position_at(self.cursor);
                Some(&self.moves[self.cursor])
            }
        }
    }

    /// The position after the first `count` moves.
    fn position_at(&self, count: usize) -> Board {
        let mut board = self.initial;
        for record in &self.moves[..count] {
            if board.side_to_move() != record.color {
                match rules::force_side_to_move(&board, record.color) {
                    Ok(next) => board = next,
                    Err(e) => {
                        warn!("replay desync: {}", e);
                        return board;
                    }
                }
            }
            board = board.make_move_new(record.mv.to_chess_move());
        }
        board
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
