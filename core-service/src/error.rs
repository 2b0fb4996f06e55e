use core_playback::PlayerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Player(#[from] PlayerError),
}

impl ServiceError {
    pub(crate) fn player_not_found(player_id: i64) -> Self {
        tracing::debug!(player_id, "Unknown player id");
        ServiceError::Player(PlayerError::InvalidState("player not found".to_string()))
    }

    /// Code half of the `(code, message)` pair reported to the application.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InitializationFailed(_) | ServiceError::Config(_) => {
                core_playback::error::CODE_OPERATION_FAILED
            }
            ServiceError::Player(e) => e.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ServiceError::Player(e) => e.message(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
