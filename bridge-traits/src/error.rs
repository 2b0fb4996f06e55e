use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Message port closed: {0}")]
    PortClosed(String),

    #[error("No reply to {method} within {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Call to {0} was cancelled")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
