use thiserror::Error;

use crate::types::{FiefdomId, Timestamp};

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint {checkpoint} is in the future (now = {now})")]
    FutureCheckpoint { checkpoint: Timestamp, now: Timestamp },

    #[error("Action '{kind}' registered twice")]
    DuplicateAction { kind: String },

    #[error("Fiefdom {id} not found")]
    FiefdomNotFound { id: FiefdomId },

    #[error("Fiefdom {fiefdom_id} has wall generation {generation} with no wall configuration")]
    InvalidWallGeneration { fiefdom_id: FiefdomId, generation: i64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GameError {
    /// Stable machine-readable code used when the error is folded into an
    /// `ActionResult`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Serialization(_) | Self::Other(_) => "storage_error",
            Self::FutureCheckpoint { .. }      => "future_checkpoint",
            Self::DuplicateAction { .. }       => "duplicate_action",
            Self::FiefdomNotFound { .. }       => "fiefdom_not_found",
            Self::InvalidWallGeneration { .. } => "invalid_wall_generation",
            Self::Config(_)                    => "invalid_config",
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
