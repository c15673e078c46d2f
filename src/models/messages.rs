use serde::{Deserialize, Serialize};

use crate::models::saved_game::SavedGame;

/// Message sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientMessage {
    pub action: String,
    pub square: Option<String>,
    pub promotion: Option<String>,
    pub mode: Option<String>,
    pub color: Option<String>,
    pub ai_strength: Option<String>,
    pub opponent: Option<String>,
    pub user_id: Option<i64>,
    pub at: Option<u64>,
    pub direction: Option<String>,
}

/// Message sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ServerMessage {
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dice_roll: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moves_remaining: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_moves: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<LastMove>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_games: Option<Vec<SavedGame>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Last move information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub san: String,
}
