//! # Player Error Types
//!
//! Errors returned by player commands. Each variant maps to the short code
//! the embedding application receives alongside the message.

use bridge_traits::error::BridgeError;
use core_drm::DrmError;
use core_runtime::config::BackendKind;
use thiserror::Error;

pub const CODE_OPERATION_FAILED: &str = "Operation failed";
pub const CODE_INVALID_STATE: &str = "Invalid State";
pub const CODE_INVALID_OPERATION: &str = "Invalid Operation";
pub const CODE_DRM: &str = "Drm error";
pub const CODE_BRIDGE: &str = "Bridge error";
pub const CODE_INTERRUPTED: &str = "Interrupted error";

/// Error code used for native failures of `backend`.
pub fn backend_error_code(backend: BackendKind) -> &'static str {
    match backend {
        BackendKind::MediaPlayer => "Media Player error",
        BackendKind::PlusPlayer => "PlusPlayer error",
    }
}

/// Errors that can occur while creating or commanding a player.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    // ========================================================================
    // Creation Errors
    // ========================================================================
    /// Native library or handle setup failed.
    #[error("{message}")]
    Creation { backend: BackendKind, message: String },

    /// `create` was called on an instance that already owns a handle.
    #[error("Media player has already been created")]
    AlreadyCreated,

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// The command is not legal in the current state.
    #[error("{0}")]
    InvalidState(String),

    /// The backend does not offer this capability.
    #[error("{0}")]
    Unsupported(String),

    /// A seek was requested while another is still outstanding.
    #[error("Seek is already in progress")]
    ConcurrentSeek,

    /// The native runtime rejected a command.
    #[error("{message}")]
    Playback { backend: BackendKind, message: String },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    #[error(transparent)]
    Drm(#[from] DrmError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl PlayerError {
    pub fn creation(backend: BackendKind, message: impl Into<String>) -> Self {
        PlayerError::Creation {
            backend,
            message: message.into(),
        }
    }

    pub fn playback(backend: BackendKind, message: impl Into<String>) -> Self {
        PlayerError::Playback {
            backend,
            message: message.into(),
        }
    }

    /// Short code delivered to the application with [`message`](Self::message).
    pub fn code(&self) -> &'static str {
        match self {
            PlayerError::Creation { backend, .. } | PlayerError::Playback { backend, .. } => {
                backend_error_code(*backend)
            }
            PlayerError::AlreadyCreated => CODE_OPERATION_FAILED,
            PlayerError::InvalidState(_) => CODE_INVALID_STATE,
            PlayerError::Unsupported(_) | PlayerError::ConcurrentSeek => CODE_INVALID_OPERATION,
            PlayerError::Drm(_) => CODE_DRM,
            PlayerError::Bridge(_) => CODE_BRIDGE,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns `true` if the player cannot be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlayerError::Creation { .. } | PlayerError::Playback { .. } | PlayerError::Drm(_)
        )
    }

    /// Returns `true` if retrying later, in another state, may succeed.
    pub fn is_state_error(&self) -> bool {
        matches!(self, PlayerError::InvalidState(_) | PlayerError::ConcurrentSeek)
    }
}

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, PlayerError>;
