use actix::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use uuid::Uuid;

use crate::game::ai::AiMoveProvider;
use crate::game::replay::ReplayEngine;
use crate::game::session::GameSession;
use crate::models::app_state::AppState;
use crate::models::messages::ClientMessage;
use crate::models::settings::GameSettings;

/// WebSocket handler for one Dicey Chess session. Every connection owns its
/// own game; there is no cross-connection game state.
pub struct DiceySocket {
    pub id: String,
    pub app_state: web::Data<AppState>,
    pub session: GameSession,
    /// Set while a finished or loaded game is being stepped through.
    pub replay: Option<ReplayEngine>,
    /// Created lazily on the first AI turn and kept for the connection, so a
    /// failed engine self-test stays in effect across new games.
    pub ai: Option<AiMoveProvider>,
    pub commit_timer: Option<SpawnHandle>,
    pub ai_timer: Option<SpawnHandle>,
}

impl Actor for DiceySocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        let mut connections = self
            .app_state
            .connections
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        connections.insert(self.id.clone());
        info!("WebSocket connection started: {}", self.id);
        info!("Total active connections: {}", connections.len());
    }

    fn stopping(&mut self, ctx: &mut Self::Context) -> Running {
        self.cancel_timers(ctx);
        let mut connections = self
            .app_state
            .connections
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        connections.remove(&self.id);
        info!("WebSocket connection closed: {}", self.id);
        info!("Total active connections: {}", connections.len());
        Running::Stop
    }
}

// WebSocket message handler
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for DiceySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                // Do nothing for pong messages
            }
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(text.as_ref()) {
                    Ok(client_msg) => {
                        self.handle_message(client_msg, ctx);
                    }
                    Err(e) => {
                        warn!("Error parsing client message: {}", e);
                        ctx.text(format!("{{\"error\": \"Invalid message format: {}\"}}", e));
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
                ctx.text("{\"error\": \"Binary messages are not supported\"}");
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl DiceySocket {
    pub fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.action.as_str() {
            "new_game" => self.handle_new_game(msg, ctx),
            "roll" => self.handle_roll(ctx),
            "select" => self.handle_select(msg, ctx),
            "promote" => self.handle_promote(msg, ctx),
            "save" => self.handle_save(ctx),
            "list_games" => self.handle_list_games(ctx),
            "load_game" => self.handle_load_game(msg, ctx),
            "delete_game" => self.handle_delete_game(msg, ctx),
            "replay_step" => self.handle_replay_step(msg, ctx),
            _ => {
                warn!("Unknown action: {}", msg.action);
                ctx.text("{\"error\": \"Unknown action\"}");
            }
        }
    }
}

/// WebSocket connection handler
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = Uuid::new_v4().to_string();
    info!("New WebSocket connection request: {}", id);

    let socket = DiceySocket {
        id,
        app_state,
        session: GameSession::new(GameSettings::default()),
        replay: None,
        ai: None,
        commit_timer: None,
        ai_timer: None,
    };
    ws::start(socket, &req, stream)
}
