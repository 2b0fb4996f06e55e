//! Cross-Context Message Ports
//!
//! The embedding application runs in a separate execution context (an
//! isolate) that native callback threads cannot call into. The only way in is
//! to post a message to one of its inbound ports.

use bytes::Bytes;

use crate::error::Result;

/// Identifier of the bridge-owned port that receives replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyPortId(pub i64);

/// Message posted to the remote context.
///
/// The message owns its payload. Once handed to [`MessagePort::post`] the
/// transport is responsible for it; dropping the message after delivery is
/// the release hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMessage {
    /// Port the remote side must answer on
    pub reply_port: ReplyPortId,
    /// Correlation id of the waiting call
    pub call_id: u64,
    /// Remote method to invoke (e.g. "onLicenseChallenge")
    pub method: String,
    /// Raw request bytes
    pub payload: Bytes,
}

/// Outbound message port
///
/// # Example
///
/// ```ignore
/// use bridge_traits::port::{MessagePort, PortMessage};
///
/// struct DartPort(i64);
///
/// impl MessagePort for DartPort {
///     fn post(&self, message: PortMessage) -> bridge_traits::error::Result<()> {
///         // Dart_PostCObject(self.0, ...) with a finalizer owning `message`
///         Ok(())
///     }
/// }
/// ```
pub trait MessagePort: Send + Sync {
    /// Post a message without waiting for delivery.
    ///
    /// Fails with `BridgeError::PortClosed` when the target is invalid.
    fn post(&self, message: PortMessage) -> Result<()>;

    /// Human-readable port description used in logs
    fn describe(&self) -> String {
        "message-port".to_string()
    }
}
