//! The turn/move state machine for one Dicey Chess game.
//!
//! A turn is: roll the dice, then play `|d1 - d2|` moves. The session owns the
//! board, the per-turn move history and the dice history, and enforces the
//! phase order roll → select source → select destination → (promotion choice)
//! → commit, one pending move at a time.
//!
//! Mid-turn the rules engine's notion of "side to move" is forced back to the
//! mover after every commit, while `turn` keeps naming the player who owns the
//! current dice roll.

use std::time::{SystemTime, UNIX_EPOCH};

use chess::{Board, Color, Piece, Square};
use log::error;
use rand::Rng;
use uuid::Uuid;

use crate::game::error::GameError;
use crate::game::{color_to_string, rules, variant, Move, MoveRecord};
use crate::models::saved_game::SavedGame;
use crate::models::settings::{GameMode, GameSettings};

/// Identity token for async results. Rotated whenever the session is replaced,
/// so a move computed for an abandoned game can be recognized and discarded.
pub type GameToken = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRoll,
    AwaitingSelection,
    AwaitingDestination,
    AwaitingPromotionChoice,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOutcome {
    /// The roll granted this many moves (1..=5).
    MovesGranted(u8),
    /// A double was rolled: zero moves, the turn passes.
    TurnForfeited,
    /// A double was rolled while the mover is in check; roll again.
    RerollRequired,
    /// The roll granted moves but the mover has none to play; the game ends
    /// in a draw.
    NoPlayableMove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// A piece of the mover's color was picked (or re-picked) as the source.
    FromSelected(Square),
    /// Source and destination are set; the move is ready to commit.
    MoveReady,
    /// The move promotes on the last move of the turn; the mover must pick a
    /// piece before the move can commit.
    PromotionChoiceRequired(Vec<Piece>),
    /// The destination violates the rules; selection state is unchanged.
    Rejected,
    /// The click had no meaning in the current state and was ignored.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    MoveCommitted { moves_remaining: u8 },
    TurnComplete,
    GameOver(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

impl Outcome {
    pub fn code(self) -> u8 {
        match self {
            Outcome::WhiteWins => 0,
            Outcome::BlackWins => 1,
            Outcome::Draw => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Outcome::WhiteWins),
            1 => Some(Outcome::BlackWins),
            2 => Some(Outcome::Draw),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Outcome::WhiteWins => "White wins!",
            Outcome::BlackWins => "Black wins!",
            Outcome::Draw => "Draw!",
        }
    }

    fn winner(color: Color) -> Self {
        match color {
            Color::White => Outcome::WhiteWins,
            Color::Black => Outcome::BlackWins,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingPromotion {
    AwaitingChoice,
    Chosen(Piece),
}

pub struct GameSession {
    settings: GameSettings,
    board: Board,
    initial: Board,
    turn: Color,
    dice_roll: i32,
    moves_remaining: i32,
    pending_from: Option<Square>,
    pending_to: Option<Square>,
    pending_promotion: Option<PendingPromotion>,
    game_over: bool,
    outcome: Option<Outcome>,
    /// Committed moves grouped per turn; the last group is the open turn.
    history: Vec<Vec<MoveRecord>>,
    dice_history: Vec<u8>,
    started_at: u64,
    token: GameToken,
}

impl GameSession {
    pub fn new(settings: GameSettings) -> Self {
        Self::with_position(settings, Board::default())
    }

    pub fn with_position(settings: GameSettings, board: Board) -> Self {
        Self {
            settings,
            board,
            initial: board,
            turn: board.side_to_move(),
            dice_roll: -1,
            moves_remaining: -1,
            pending_from: None,
            pending_to: None,
            pending_promotion: None,
            game_over: false,
            outcome: None,
            history: vec![Vec::new()],
            dice_history: Vec::new(),
            started_at: unix_now(),
            token: Uuid::new_v4(),
        }
    }

    /// Rolls two d6 and applies the difference as the move allowance.
    pub fn roll_dice<R: Rng>(&mut self, rng: &mut R) -> Result<RollOutcome, GameError> {
        let d1 = rng.gen_range(1..=6u8);
        let d2 = rng.gen_range(1..=6u8);
        self.apply_roll(d1, d2)
    }

    /// Applies a concrete dice pair. A difference of zero forfeits the turn,
    /// unless the mover is in check, in which case the roll does not count and
    /// must be repeated.
    pub fn apply_roll(&mut self, d1: u8, d2: u8) -> Result<RollOutcome, GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }
        if self.dice_roll != -1 {
            return Err(GameError::TurnInProgress);
        }
        let roll = d1.abs_diff(d2);
        if roll == 0 {
            if rules::in_check(&self.board) {
                return Ok(RollOutcome::RerollRequired);
            }
            self.dice_history.push(0);
            self.close_turn()?;
            return Ok(RollOutcome::TurnForfeited);
        }
        self.dice_roll = roll as i32;
        self.moves_remaining = roll as i32;
        self.dice_history.push(roll);
        // owed moves with none to play is a draw, same as mid-turn
        if variant::legal_moves(&self.board, roll == 1).is_empty() {
            self.finish(Outcome::Draw);
            return Ok(RollOutcome::NoPlayableMove);
        }
        Ok(RollOutcome::MovesGranted(roll))
    }

    /// Handles a square selection. The first own-piece click picks the source
    /// (and may be re-picked); the next click names the destination.
    pub fn select_square(&mut self, sq: Square) -> Result<SelectionOutcome, GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }
        if self.dice_roll == -1 {
            return Err(GameError::NoActiveTurn);
        }
        // one move in flight at a time
        if self.pending_to.is_some() {
            return Ok(SelectionOutcome::Ignored);
        }
        if self.board.color_on(sq) == Some(self.turn) {
            self.pending_from = Some(sq);
            return Ok(SelectionOutcome::FromSelected(sq));
        }
        let from = match self.pending_from {
            Some(from) => from,
            None => return Ok(SelectionOutcome::Ignored),
        };
        let is_last = self.is_last_move_of_turn();
        if !variant::is_valid_move(&self.board, from, sq, is_last) {
            return Ok(SelectionOutcome::Rejected);
        }
        if variant::is_promotion_move(&self.board, from, sq, self.turn) {
            self.pending_to = Some(sq);
            if is_last {
                self.pending_promotion = Some(PendingPromotion::AwaitingChoice);
                return Ok(SelectionOutcome::PromotionChoiceRequired(
                    variant::possible_promotions(true),
                ));
            }
            self.pending_promotion = Some(PendingPromotion::Chosen(Piece::Queen));
            return Ok(SelectionOutcome::MoveReady);
        }
        self.pending_to = Some(sq);
        Ok(SelectionOutcome::MoveReady)
    }

    /// Resolves an outstanding promotion prompt.
    pub fn choose_promotion(&mut self, piece: Piece) -> Result<(), GameError> {
        match self.pending_promotion {
            Some(PendingPromotion::AwaitingChoice) => {}
            _ => return Err(GameError::NoPromotionPending),
        }
        if !variant::possible_promotions(true).contains(&piece) {
            return Err(GameError::DisallowedPromotion(piece));
        }
        self.pending_promotion = Some(PendingPromotion::Chosen(piece));
        Ok(())
    }

    /// Injects a move computed elsewhere (the AI provider). The token must
    /// match the session the move was computed for.
    pub fn apply_external_move(&mut self, token: GameToken, mv: Move) -> Result<(), GameError> {
        if token != self.token {
            return Err(GameError::StaleResult(token));
        }
        if self.game_over {
            return Err(GameError::GameOver);
        }
        if self.dice_roll == -1 {
            return Err(GameError::NoActiveTurn);
        }
        self.pending_from = Some(mv.from);
        self.pending_to = Some(mv.to);
        self.pending_promotion = mv.promotion.map(PendingPromotion::Chosen);
        Ok(())
    }

    /// Commits the pending move: applies it to the board, records it, and
    /// advances or closes the turn.
    pub fn commit_pending(&mut self) -> Result<CommitOutcome, GameError> {
        let (from, to) = match (self.pending_from, self.pending_to) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(GameError::NoPendingMove),
        };
        let promotion = match self.pending_promotion {
            Some(PendingPromotion::AwaitingChoice) => {
                return Err(GameError::PromotionChoiceOutstanding)
            }
            Some(PendingPromotion::Chosen(piece)) => Some(piece),
            None => None,
        };
        let mv = Move::new(from, to, promotion)?;
        let (next, record) = match rules::apply(&self.board, mv) {
            Ok(applied) => applied,
            Err(e) => {
                error!("refusing to commit: {}", e);
                self.clear_pending();
                return Err(e);
            }
        };
        self.board = next;
        self.clear_pending();
        if let Some(turn_moves) = self.history.last_mut() {
            turn_moves.push(record);
        }
        self.moves_remaining -= 1;

        if self.moves_remaining == 0 {
            // only now does the opponent get the move, so mate and stalemate
            // are judged here and not after the earlier moves of the turn
            if rules::is_checkmate(&self.board) {
                let outcome = Outcome::winner(self.turn);
                self.finish(outcome);
                return Ok(CommitOutcome::GameOver(outcome));
            }
            if rules::is_stalemate_or_draw(&self.board) {
                self.finish(Outcome::Draw);
                return Ok(CommitOutcome::GameOver(Outcome::Draw));
            }
            self.close_turn()?;
            return Ok(CommitOutcome::TurnComplete);
        }
        // a dead position cannot be revived by the remaining moves
        if rules::has_insufficient_material(&self.board) {
            self.finish(Outcome::Draw);
            return Ok(CommitOutcome::GameOver(Outcome::Draw));
        }
        // more moves owed: hand the board back to the mover
        self.board = rules::force_side_to_move(&self.board, self.turn)?;
        if variant::legal_moves(&self.board, self.moves_remaining == 1).is_empty() {
            // the mover still owes moves but has none to play
            self.finish(Outcome::Draw);
            return Ok(CommitOutcome::GameOver(Outcome::Draw));
        }
        Ok(CommitOutcome::MoveCommitted {
            moves_remaining: self.moves_remaining as u8,
        })
    }

    fn close_turn(&mut self) -> Result<(), GameError> {
        self.dice_roll = -1;
        self.moves_remaining = -1;
        self.history.push(Vec::new());
        self.board = rules::force_side_to_move(&self.board, !self.turn)?;
        self.turn = self.board.side_to_move();
        Ok(())
    }

    fn finish(&mut self, outcome: Outcome) {
        self.game_over = true;
        self.outcome = Some(outcome);
        self.dice_roll = -1;
        self.moves_remaining = -1;
    }

    fn clear_pending(&mut self) {
        self.pending_from = None;
        self.pending_to = None;
        self.pending_promotion = None;
    }

    pub fn phase(&self) -> Phase {
        if self.game_over {
            Phase::GameOver
        } else if self.dice_roll == -1 {
            Phase::AwaitingRoll
        } else if matches!(self.pending_promotion, Some(PendingPromotion::AwaitingChoice)) {
            Phase::AwaitingPromotionChoice
        } else if self.pending_from.is_some() {
            Phase::AwaitingDestination
        } else {
            Phase::AwaitingSelection
        }
    }

    pub fn token(&self) -> GameToken {
        self.token
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn initial_board(&self) -> &Board {
        &self.initial
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn turn_name(&self) -> String {
        color_to_string(self.turn)
    }

    pub fn dice_roll(&self) -> i32 {
        self.dice_roll
    }

    pub fn moves_remaining(&self) -> i32 {
        self.moves_remaining
    }

    pub fn is_last_move_of_turn(&self) -> bool {
        self.moves_remaining == 1
    }

    pub fn has_pending_move(&self) -> bool {
        self.pending_to.is_some()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// True when it is the machine's move in a single-player game.
    pub fn is_ai_turn(&self) -> bool {
        self.settings.mode == GameMode::SinglePlayer
            && self.turn != self.settings.user_color
            && !self.game_over
    }

    pub fn turn_history(&self) -> &[Vec<MoveRecord>] {
        &self.history
    }

    pub fn dice_history(&self) -> &[u8] {
        &self.dice_history
    }

    pub fn flat_san_history(&self) -> Vec<String> {
        self.history
            .iter()
            .flatten()
            .map(|r| r.san.clone())
            .collect()
    }

    pub fn last_move_record(&self) -> Option<&MoveRecord> {
        self.history.iter().rev().find_map(|turn| turn.last())
    }

    /// Snapshot for persistence. Only finished games are saved.
    pub fn to_saved_game(&self, now: u64) -> Option<SavedGame> {
        let outcome = self.outcome?;
        Some(SavedGame {
            at: now,
            user_id: self.settings.user_id,
            duration: now.saturating_sub(self.started_at),
            opponent: self.settings.opponent.clone(),
            outcome: outcome.code(),
            move_history: self.flat_san_history().join(","),
            dice_roll_history: self
                .dice_history
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(","),
            user_plays_white: self.settings.user_color == Color::White,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
