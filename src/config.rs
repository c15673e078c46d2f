//! Server configuration from environment variables.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Search engine endpoint; an HTTP URL, or a WebSocket URL when
    /// `engine_uses_socket` is set.
    pub engine_url: String,
    pub engine_uses_socket: bool,
    /// Optional proxy prefix tried when the engine refuses direct requests.
    pub cors_proxy_url: Option<String>,
    pub data_dir: PathBuf,
    /// Pause between a move being decided and it appearing on the board.
    pub make_move_delay_ms: u64,
    /// Base of the randomized "thinking" pause before an AI move.
    pub ai_move_delay_ms: u64,
    pub max_thinking_time_ms: u32,
    pub search_depth: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("DICEY_BIND_ADDR", "127.0.0.1:8080"),
            engine_url: env_or("DICEY_ENGINE_URL", "https://chess-api.com/v1"),
            engine_uses_socket: env::var("DICEY_ENGINE_SOCKET")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_proxy_url: env::var("DICEY_CORS_PROXY").ok().filter(|v| !v.is_empty()),
            data_dir: PathBuf::from(env_or("DICEY_DATA_DIR", "./data")),
            make_move_delay_ms: env_num("DICEY_MAKE_MOVE_DELAY_MS", 500),
            ai_move_delay_ms: env_num("DICEY_AI_MOVE_DELAY_MS", 250),
            max_thinking_time_ms: env_num("DICEY_MAX_THINKING_TIME_MS", 100),
            search_depth: env_num("DICEY_SEARCH_DEPTH", 18),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            engine_url: "https://chess-api.com/v1".to_string(),
            engine_uses_socket: false,
            cors_proxy_url: None,
            data_dir: PathBuf::from("./data"),
            make_move_delay_ms: 500,
            ai_move_delay_ms: 250,
            max_thinking_time_ms: 100,
            search_depth: 18,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
