//! # DRM Session Errors

use bridge_traits::error::BridgeError;
use core_native::error::NativeError;
use thiserror::Error;

/// Errors raised by the DRM session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrmError {
    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The DRM manager runtime could not be opened.
    #[error("DRM runtime unavailable: {0}")]
    RuntimeUnavailable(NativeError),

    /// `DMGRCreateDRMSession` or its setup failed.
    #[error("Failed to create DRM session: {0}")]
    SessionCreation(NativeError),

    /// An operation needed a session that does not exist.
    #[error("DRM session is not created")]
    NoSession,

    /// Manifest or `Initialize` was rejected.
    #[error("Failed to initialize DRM session: {0}")]
    Initialization(NativeError),

    /// Any other native call on an existing session.
    #[error("DRM call failed: {0}")]
    Native(#[from] NativeError),

    // ========================================================================
    // License Errors
    // ========================================================================
    /// A challenge arrived with neither a license server nor a callback set.
    #[error("No license response source configured")]
    NoResponseSource,

    /// The license server or challenge callback failed.
    #[error("License acquisition failed: {0}")]
    License(BridgeError),

    /// The response source answered with zero bytes.
    #[error("License response is empty")]
    EmptyLicense,

    /// The deferred key install could not be queued on the host loop.
    #[error("Cannot schedule key installation: {0}")]
    Scheduling(BridgeError),
}

impl DrmError {
    /// Whether the failure happened while answering a challenge, as opposed
    /// to session setup.
    pub fn is_license_error(&self) -> bool {
        matches!(
            self,
            DrmError::NoResponseSource | DrmError::License(_) | DrmError::EmptyLicense | DrmError::Scheduling(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DrmError>;
