//! Engine error taxonomy.
//!
//! Structural errors (unknown move/player/stat, bad configuration) indicate
//! programmer error and are never swallowed by the engine itself. Handler
//! failures abort the move transactionally; whether they propagate or are
//! tolerated is the caller's choice (`can_fail` in the harness).

use thiserror::Error;

use crate::core::UserId;

/// Errors produced by move execution, configuration, and the harness.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Move name not present in the game definition.
    #[error("unknown move `{0}`")]
    UnknownMove(String),

    /// User id not registered in the match.
    #[error("unknown player `{0}`")]
    UnknownPlayer(UserId),

    /// `can_do` rejected the move. Recoverable under `can_fail`.
    #[error("move not allowed for `{user_id}`")]
    IllegalMove { user_id: UserId },

    /// A stat key was logged without being declared in the game config.
    #[error("stat `{key}` was not declared in the game configuration")]
    UndeclaredStat { key: String },

    /// A game handler failed mid-move. No state mutation is observable.
    #[error("handler failed: {0}")]
    Handler(String),

    /// The game configuration itself is unusable (e.g. an exclusive player
    /// setting with fewer options than players).
    #[error("invalid game configuration: {0}")]
    InvalidConfig(String),

    /// Persisted snapshot schema mismatch. Never auto-migrated.
    #[error("persisted match uses schema version {found}, expected {expected}")]
    StaleVersion { found: u32, expected: u32 },

    /// The same bot kept moving without a turn change; the game almost
    /// certainly forgot to end its turn.
    #[error("bot `{user_id}` made {moves} consecutive moves without a turn change")]
    InfiniteBotLoop { user_id: UserId, moves: u32 },

    /// A move was submitted to a match that has already ended.
    #[error("match has already ended")]
    MatchEnded,

    /// Board state could not be serialized for diffing or persistence.
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A patch did not apply cleanly to the given state tree.
    #[error("patch does not apply: {0}")]
    PatchMismatch(String),
}

impl EngineError {
    /// Shorthand for a handler-level failure.
    pub fn handler(msg: impl Into<String>) -> Self {
        EngineError::Handler(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::UnknownMove("jump".to_string());
        assert_eq!(format!("{}", err), "unknown move `jump`");

        let err = EngineError::StaleVersion {
            found: 1,
            expected: 3,
        };
        assert_eq!(
            format!("{}", err),
            "persisted match uses schema version 1, expected 3"
        );
    }

    #[test]
    fn test_handler_shorthand() {
        let err = EngineError::handler("deck was empty");
        assert!(matches!(err, EngineError::Handler(msg) if msg == "deck was empty"));
    }
}
