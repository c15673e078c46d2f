use chess::Piece;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the rules adapter and the turn/move state machine.
///
/// `IllegalMove` is a contract violation: pre-validation in the variant layer
/// is supposed to make it unreachable, so callers log it and abort the move
/// attempt without touching turn state. `StaleResult` marks an async result
/// that arrived after the game it belonged to was replaced; it is discarded
/// silently.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("illegal move {0}")]
    IllegalMove(String),
    #[error("malformed move: {0}")]
    MalformedMove(String),
    #[error("no pending move to commit")]
    NoPendingMove,
    #[error("no promotion choice is pending")]
    NoPromotionPending,
    #[error("a promotion choice is still outstanding")]
    PromotionChoiceOutstanding,
    #[error("{0:?} is not an allowed promotion piece")]
    DisallowedPromotion(Piece),
    #[error("the game is already over")]
    GameOver,
    #[error("the dice have not been rolled yet")]
    NoActiveTurn,
    #[error("the dice were already rolled this turn")]
    TurnInProgress,
    #[error("stale async result for game {0}")]
    StaleResult(Uuid),
    #[error("position rejected by the rules engine: {0}")]
    InvalidPosition(String),
}

/// Failures while talking to the remote move-search service. None of these
/// escape the AI provider: each call falls back to a random move, and a failed
/// connectivity self-test disables search mode for the rest of the session.
#[derive(Debug, Error)]
pub enum AiServiceError {
    #[error("engine is busy with a previous request")]
    Busy,
    #[error("engine request failed: {0}")]
    Request(String),
    #[error("engine returned an unusable reply: {0}")]
    InvalidReply(String),
    #[error("engine reply timed out")]
    TimedOut,
}

/// Saved-game storage failures. A failing primary store falls back to the
/// local store; corrupt records are reported so the caller can delete them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt saved-game data: {0}")]
    Corrupt(String),
    #[error("no saved game at timestamp {0}")]
    NotFound(u64),
}
