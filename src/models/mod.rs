pub mod app_state;
pub mod messages;
pub mod saved_game;
pub mod settings;

// Re-export important types
pub use app_state::AppState;
pub use messages::*;
pub use saved_game::SavedGame;
pub use settings::*;
