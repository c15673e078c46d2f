use chess::Color;
use rand::Rng;

use crate::models::messages::ClientMessage;

/// How the two sides are controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// One human against the AI provider.
    SinglePlayer,
    /// Two humans sharing the board.
    TwoPlayer,
    /// Accepted for forward compatibility; currently plays like a shared
    /// two-player board.
    OnlineFriend,
}

impl GameMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(GameMode::SinglePlayer),
            "two_player" => Some(GameMode::TwoPlayer),
            "online_friend" => Some(GameMode::OnlineFriend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiStrength {
    /// Uniformly random legal moves.
    Random,
    /// Remote engine search.
    Search,
}

impl AiStrength {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "random" => Some(AiStrength::Random),
            "search" => Some(AiStrength::Search),
            _ => None,
        }
    }
}

/// Per-game settings taken from the `new_game` message.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub mode: GameMode,
    pub user_color: Color,
    pub ai_strength: AiStrength,
    pub opponent: String,
    pub user_id: i64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            mode: GameMode::SinglePlayer,
            user_color: Color::White,
            ai_strength: AiStrength::Random,
            opponent: "AI".to_string(),
            user_id: 0,
        }
    }
}

impl GameSettings {
    /// Builds settings from a `new_game` message, falling back to defaults
    /// for anything missing or unrecognized. A color of `"random"` (or none)
    /// assigns the user a side by coin flip.
    pub fn from_message(msg: &ClientMessage) -> Self {
        let defaults = Self::default();
        let mode = msg
            .mode
            .as_deref()
            .and_then(GameMode::parse)
            .unwrap_or(defaults.mode);
        let user_color = match msg.color.as_deref() {
            Some("white") => Color::White,
            Some("black") => Color::Black,
            _ => {
                if rand::thread_rng().gen_bool(0.5) {
                    Color::White
                } else {
                    Color::Black
                }
            }
        };
        let ai_strength = msg
            .ai_strength
            .as_deref()
            .and_then(AiStrength::parse)
            .unwrap_or(defaults.ai_strength);
        let opponent = match mode {
            GameMode::SinglePlayer => "AI".to_string(),
            _ => msg
                .opponent
                .clone()
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| "Friend".to_string()),
        };
        Self {
            mode,
            user_color,
            ai_strength,
            opponent,
            user_id: msg.user_id.unwrap_or(defaults.user_id),
        }
    }
}
