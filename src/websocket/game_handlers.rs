use std::str::FromStr;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use actix::{ActorFutureExt, AsyncContext};
use actix_web_actors::ws;
use chess::Square;
use log::{debug, info, warn};

use crate::game::ai::AiMoveProvider;
use crate::game::error::{GameError, StorageError};
use crate::game::replay::{ReplayEngine, StepDirection};
use crate::game::session::{CommitOutcome, GameSession, Phase, RollOutcome, SelectionOutcome};
use crate::game::{piece_from_str, piece_letter, rules, variant, MoveRecord};
use crate::models::messages::{ClientMessage, LastMove, ServerMessage};
use crate::models::settings::GameSettings;
use crate::websocket::handler::DiceySocket;

fn status_name(phase: Phase) -> &'static str {
    match phase {
        Phase::AwaitingRoll => "awaiting_roll",
        Phase::AwaitingSelection => "awaiting_selection",
        Phase::AwaitingDestination => "awaiting_destination",
        Phase::AwaitingPromotionChoice => "awaiting_promotion",
        Phase::GameOver => "game_over",
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn last_move_of(record: &MoveRecord) -> LastMove {
    LastMove {
        from: record.mv.from.to_string(),
        to: record.mv.to.to_string(),
        san: record.san.clone(),
    }
}

impl DiceySocket {
    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(s) => ctx.text(s),
            Err(e) => warn!("Error serializing message: {}", e),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, text: &str) {
        self.send(
            ctx,
            &ServerMessage {
                message_type: "error".to_string(),
                error: Some(text.to_string()),
                ..Default::default()
            },
        );
    }

    /// Snapshot of the live session for the client.
    fn state_message(&self, message_type: &str) -> ServerMessage {
        let session = &self.session;
        ServerMessage {
            message_type: message_type.to_string(),
            fen: Some(session.board().to_string()),
            turn: Some(session.turn_name()),
            dice_roll: (session.dice_roll() != -1).then(|| session.dice_roll()),
            moves_remaining: (session.moves_remaining() != -1)
                .then(|| session.moves_remaining()),
            game_status: Some(status_name(session.phase()).to_string()),
            outcome: session.outcome().map(|o| o.describe().to_string()),
            ..Default::default()
        }
    }

    pub fn cancel_timers(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(handle) = self.commit_timer.take() {
            ctx.cancel_future(handle);
        }
        if let Some(handle) = self.ai_timer.take() {
            ctx.cancel_future(handle);
        }
    }

    pub fn handle_new_game(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        // Timers and async results of the previous game must not leak into
        // the new one; the fresh session also rotates the game token.
        self.cancel_timers(ctx);
        self.replay = None;
        let settings = GameSettings::from_message(&msg);
        info!(
            "Starting a new game on connection {}: {:?} as {:?}",
            self.id, settings.mode, settings.user_color
        );
        self.session = GameSession::new(settings);
        self.send(ctx, &self.state_message("game_started"));
        self.maybe_schedule_ai(ctx);
    }

    pub fn handle_roll(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.replay.is_some() {
            self.send_error(ctx, "A replay is in progress");
            return;
        }
        if self.session.is_ai_turn() {
            self.send_error(ctx, "It is not your turn");
            return;
        }
        match self.session.roll_dice(&mut rand::thread_rng()) {
            Ok(RollOutcome::MovesGranted(_)) => {
                self.send(ctx, &self.state_message("dice_rolled"));
            }
            Ok(RollOutcome::NoPlayableMove) => {
                // the roll left the mover without a playable move
                self.send(ctx, &self.state_message("game_over"));
                self.replay = Some(ReplayEngine::from_session(&self.session));
            }
            Ok(RollOutcome::TurnForfeited) => {
                self.send(ctx, &self.state_message("turn_forfeited"));
                self.maybe_schedule_ai(ctx);
            }
            Ok(RollOutcome::RerollRequired) => {
                self.send(
                    ctx,
                    &ServerMessage {
                        message_type: "reroll_required".to_string(),
                        notice: Some(
                            "Doubles while in check do not count. Roll again!".to_string(),
                        ),
                        ..Default::default()
                    },
                );
            }
            Err(e) => self.send_error(ctx, &e.to_string()),
        }
    }

    pub fn handle_select(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        if self.replay.is_some() {
            self.send_error(ctx, "A replay is in progress");
            return;
        }
        if self.session.is_ai_turn() {
            self.send_error(ctx, "It is not your turn");
            return;
        }
        let square = match msg.square.as_deref().map(Square::from_str) {
            Some(Ok(square)) => square,
            _ => {
                self.send_error(ctx, "Missing or invalid square");
                return;
            }
        };
        match self.session.select_square(square) {
            Ok(SelectionOutcome::FromSelected(from)) => {
                // destinations the variant allows right now, for highlighting
                let is_last = self.session.is_last_move_of_turn();
                let board = self.session.board();
                let destinations: Vec<String> = rules::legal_destinations(board, from)
                    .into_iter()
                    .filter(|&to| variant::is_valid_move(board, from, to, is_last))
                    .map(|sq| sq.to_string())
                    .collect();
                self.send(
                    ctx,
                    &ServerMessage {
                        message_type: "square_selected".to_string(),
                        available_moves: Some(destinations),
                        ..Default::default()
                    },
                );
            }
            Ok(SelectionOutcome::MoveReady) => {
                self.send(ctx, &self.state_message("move_pending"));
                self.schedule_commit(ctx);
            }
            Ok(SelectionOutcome::PromotionChoiceRequired(pieces)) => {
                self.send(
                    ctx,
                    &ServerMessage {
                        message_type: "promotion_choice".to_string(),
                        promotions: Some(
                            pieces.iter().map(|p| piece_letter(*p).to_string()).collect(),
                        ),
                        ..Default::default()
                    },
                );
            }
            Ok(SelectionOutcome::Rejected) => {
                self.send_error(ctx, "That move is not allowed");
            }
            Ok(SelectionOutcome::Ignored) => {}
            Err(GameError::NoActiveTurn) => {
                self.send_error(ctx, "Roll the dice first!");
            }
            Err(e) => self.send_error(ctx, &e.to_string()),
        }
    }

    pub fn handle_promote(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        if self.replay.is_some() {
            self.send_error(ctx, "A replay is in progress");
            return;
        }
        let piece = match msg.promotion.as_deref().and_then(piece_from_str) {
            Some(piece) => piece,
            None => {
                self.send_error(ctx, "Missing or invalid promotion piece");
                return;
            }
        };
        match self.session.choose_promotion(piece) {
            Ok(()) => self.schedule_commit(ctx),
            Err(e) => self.send_error(ctx, &e.to_string()),
        }
    }

    /// Commits the pending move after the configured pause, so the board
    /// animation has time to play. Rescheduling cancels the previous timer.
    fn schedule_commit(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(handle) = self.commit_timer.take() {
            ctx.cancel_future(handle);
        }
        let delay = Duration::from_millis(self.app_state.config.make_move_delay_ms);
        self.commit_timer = Some(ctx.run_later(delay, |act, ctx| {
            act.commit_timer = None;
            act.commit_now(ctx);
        }));
    }

    fn commit_now(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        match self.session.commit_pending() {
            Ok(CommitOutcome::MoveCommitted { .. }) => {
                let mut message = self.state_message("move_made");
                message.last_move = self.session.last_move_record().map(last_move_of);
                self.send(ctx, &message);
                self.maybe_schedule_ai(ctx);
            }
            Ok(CommitOutcome::TurnComplete) => {
                let mut message = self.state_message("turn_complete");
                message.last_move = self.session.last_move_record().map(last_move_of);
                self.send(ctx, &message);
                self.maybe_schedule_ai(ctx);
            }
            Ok(CommitOutcome::GameOver(_)) => {
                let mut message = self.state_message("game_over");
                message.last_move = self.session.last_move_record().map(last_move_of);
                self.send(ctx, &message);
                // the finished game can be stepped through right away
                self.replay = Some(ReplayEngine::from_session(&self.session));
            }
            Err(e) => self.send_error(ctx, &e.to_string()),
        }
    }

    /// Kicks the AI when it is its move: first a delayed dice roll, then the
    /// move search.
    fn maybe_schedule_ai(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.replay.is_some() || !self.session.is_ai_turn() || self.session.has_pending_move()
        {
            return;
        }
        if self.session.dice_roll() == -1 {
            if let Some(handle) = self.ai_timer.take() {
                ctx.cancel_future(handle);
            }
            let delay = Duration::from_millis(self.app_state.config.ai_move_delay_ms);
            self.ai_timer = Some(ctx.run_later(delay, |act, ctx| {
                act.ai_timer = None;
                act.ai_roll(ctx);
            }));
        } else {
            self.trigger_ai_move(ctx);
        }
    }

    fn ai_roll(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        loop {
            match self.session.roll_dice(&mut rand::thread_rng()) {
                Ok(RollOutcome::RerollRequired) => continue,
                Ok(RollOutcome::TurnForfeited) => {
                    self.send(ctx, &self.state_message("turn_forfeited"));
                    return;
                }
                Ok(RollOutcome::MovesGranted(_)) => {
                    self.send(ctx, &self.state_message("dice_rolled"));
                    self.trigger_ai_move(ctx);
                    return;
                }
                Ok(RollOutcome::NoPlayableMove) => {
                    self.send(ctx, &self.state_message("game_over"));
                    self.replay = Some(ReplayEngine::from_session(&self.session));
                    return;
                }
                Err(e) => {
                    warn!("AI dice roll failed: {}", e);
                    return;
                }
            }
        }
    }

    fn trigger_ai_move(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let provider = self
            .ai
            .get_or_insert_with(|| AiMoveProvider::new(&self.app_state.config))
            .clone();
        let strength = self.session.settings().ai_strength;
        let token = self.session.token();
        let board = *self.session.board();
        let is_last = self.session.is_last_move_of_turn();

        let fut = async move { provider.get_move(strength, board, is_last).await };
        ctx.spawn(
            actix::fut::wrap_future::<_, Self>(fut).map(move |outcome, act, ctx| {
                if let Some(notice) = outcome.notice {
                    act.send(
                        ctx,
                        &ServerMessage {
                            message_type: "notice".to_string(),
                            notice: Some(notice),
                            ..Default::default()
                        },
                    );
                }
                let mv = match outcome.mv {
                    Some(mv) => mv,
                    None => {
                        warn!("AI produced no move");
                        return;
                    }
                };
                match act.session.apply_external_move(token, mv) {
                    Ok(()) => act.schedule_commit(ctx),
                    Err(GameError::StaleResult(_)) => {
                        debug!("Discarding an AI move for a replaced game");
                    }
                    Err(e) => warn!("AI move rejected: {}", e),
                }
            }),
        );
    }

    pub fn handle_save(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let saved = match self.session.to_saved_game(unix_now()) {
            Some(saved) => saved,
            None => {
                self.send_error(ctx, "Only finished games can be saved");
                return;
            }
        };
        match self.app_state.storage.save(&saved) {
            Ok(receipt) => {
                let notice = if !receipt.local_only {
                    None
                } else if saved.user_id == 0 {
                    Some("Saved locally. Sign in to keep games with your account.".to_string())
                } else {
                    Some("The game server could not be reached; saved locally.".to_string())
                };
                self.send(
                    ctx,
                    &ServerMessage {
                        message_type: "game_saved".to_string(),
                        notice,
                        ..Default::default()
                    },
                );
            }
            Err(e) => {
                warn!("Saving game failed: {}", e);
                self.send_error(ctx, "Saving the game failed");
            }
        }
    }

    pub fn handle_list_games(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let user_id = self.session.settings().user_id;
        match self.app_state.storage.list(user_id) {
            Ok(games) => {
                let notice = games
                    .is_empty()
                    .then(|| "No saved games found.".to_string());
                self.send(
                    ctx,
                    &ServerMessage {
                        message_type: "saved_games".to_string(),
                        saved_games: Some(games),
                        notice,
                        ..Default::default()
                    },
                );
            }
            Err(e) => {
                warn!("Listing saved games failed: {}", e);
                self.send_error(ctx, "Listing saved games failed");
            }
        }
    }

    pub fn handle_load_game(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let at = match msg.at {
            Some(at) => at,
            None => {
                self.send_error(ctx, "Missing saved-game timestamp");
                return;
            }
        };
        let user_id = self.session.settings().user_id;
        let saved = match self.app_state.storage.list(user_id) {
            Ok(games) => games.into_iter().find(|g| g.at == at),
            Err(e) => {
                warn!("Loading game failed: {}", e);
                self.send_error(ctx, "Loading the game failed");
                return;
            }
        };
        let saved = match saved {
            Some(saved) => saved,
            None => {
                self.send_error(ctx, "No such saved game");
                return;
            }
        };
        match ReplayEngine::from_saved_game(&saved) {
            Ok(replay) => {
                // abandon the live game; any in-flight AI result goes stale
                self.cancel_timers(ctx);
                self.session = GameSession::new(self.session.settings().clone());
                let fen = replay.board().to_string();
                self.replay = Some(replay);
                self.send(
                    ctx,
                    &ServerMessage {
                        message_type: "game_loaded".to_string(),
                        fen: Some(fen),
                        ..Default::default()
                    },
                );
            }
            Err(StorageError::Corrupt(reason)) => {
                warn!("Deleting a corrupt saved game ({}): {}", at, reason);
                if let Err(e) = self.app_state.storage.delete(user_id, at) {
                    warn!("Deleting the corrupt record failed too: {}", e);
                }
                self.send_error(
                    ctx,
                    "Loading game failed! The game was not saved properly and will be deleted.",
                );
            }
            Err(e) => {
                warn!("Loading game failed: {}", e);
                self.send_error(ctx, "Loading the game failed");
            }
        }
    }

    pub fn handle_delete_game(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let at = match msg.at {
            Some(at) => at,
            None => {
                self.send_error(ctx, "Missing saved-game timestamp");
                return;
            }
        };
        match self
            .app_state
            .storage
            .delete(self.session.settings().user_id, at)
        {
            Ok(()) => self.send(
                ctx,
                &ServerMessage {
                    message_type: "game_deleted".to_string(),
                    ..Default::default()
                },
            ),
            Err(e) => {
                warn!("Deleting saved game {} failed: {}", at, e);
                self.send_error(ctx, "Deleting the saved game failed");
            }
        }
    }

    pub fn handle_replay_step(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let direction = match msg.direction.as_deref().and_then(StepDirection::parse) {
            Some(direction) => direction,
            None => {
                self.send_error(ctx, "Missing or invalid replay direction");
                return;
            }
        };
        let replay = match self.replay.as_mut() {
            Some(replay) => replay,
            None => {
                self.send_error(ctx, "No replay in progress");
                return;
            }
        };
        let stepped = replay.step(direction).map(last_move_of);
        let message = match stepped {
            Some(last_move) => ServerMessage {
                message_type: "replay_step".to_string(),
                fen: Some(replay.board().to_string()),
                last_move: Some(last_move),
                ..Default::default()
            },
            None => ServerMessage {
                message_type: "replay_boundary".to_string(),
                fen: Some(replay.board().to_string()),
                ..Default::default()
            },
        };
        self.send(ctx, &message);
    }
}
