//! # Player Event Channel
//!
//! Per-player event stream exposed to the embedding application.
//!
//! ## Overview
//!
//! Each player instance owns one [`EventChannel`] named after its id
//! (`tizen/video_player/video_events_<id>`). The application attaches at most
//! one [`EventSink`] to it; attaching another replaces the first, which is
//! dropped without notice.
//!
//! ```text
//! native callback ──> backend ──> EventChannel ──> EventSink (success / error)
//! ```
//!
//! Normal notifications are [`PlayerEvent`] values. Serialized, they are
//! maps with an `event` discriminant:
//!
//! | event             | fields                      |
//! |-------------------|-----------------------------|
//! | `initialized`     | `duration`, `width`, `height` |
//! | `bufferingStart`  |                             |
//! | `bufferingUpdate` | `value`                     |
//! | `bufferingEnd`    |                             |
//! | `subtitleUpdate`  | `duration`, `text`          |
//! | `completed`       |                             |
//!
//! Failures never travel as events; they use the sink's separate error
//! signal carrying `(code, message)`.
//!
//! ## Async consumers
//!
//! [`ChannelSink`] adapts the channel to a `tokio::sync::mpsc` receiver:
//!
//! ```ignore
//! let (sink, mut rx) = ChannelSink::new();
//! channel.listen(Arc::new(sink));
//! while let Some(message) = rx.recv().await {
//!     println!("{message:?}");
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Notification delivered on a player's event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Preparation finished; reported once per player.
    Initialized {
        duration: i32,
        width: i32,
        height: i32,
    },
    BufferingStart,
    BufferingUpdate {
        value: i32,
    },
    BufferingEnd,
    SubtitleUpdate {
        duration: i64,
        text: String,
    },
    /// Playback reached the end of the stream.
    Completed,
}

impl PlayerEvent {
    /// Value of the `event` discriminant
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Initialized { .. } => "initialized",
            PlayerEvent::BufferingStart => "bufferingStart",
            PlayerEvent::BufferingUpdate { .. } => "bufferingUpdate",
            PlayerEvent::BufferingEnd => "bufferingEnd",
            PlayerEvent::SubtitleUpdate { .. } => "subtitleUpdate",
            PlayerEvent::Completed => "completed",
        }
    }

    /// Map payload as delivered to the application.
    pub fn to_payload(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Internal(format!(
                "event {} serialized to a non-map value: {}",
                self.name(),
                other
            ))),
        }
    }
}

/// Subscriber attached to an [`EventChannel`].
///
/// Called from native callback threads; implementations must not call back
/// into the player.
pub trait EventSink: Send + Sync {
    /// Deliver a normal notification
    fn success(&self, event: &PlayerEvent);

    /// Deliver a failure signal
    fn error(&self, code: &str, message: &str);
}

/// Per-player event channel holding at most one subscriber.
pub struct EventChannel {
    name: String,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl EventChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach `sink`, replacing any previous subscriber.
    ///
    /// Returns `true` when a previous subscriber was dropped.
    pub fn listen(&self, sink: Arc<dyn EventSink>) -> bool {
        let replaced = self.sink.lock().replace(sink).is_some();
        tracing::debug!(channel = %self.name, replaced, "Event subscriber attached");
        replaced
    }

    /// Detach the current subscriber, if any.
    pub fn cancel(&self) -> bool {
        let removed = self.sink.lock().take().is_some();
        tracing::debug!(channel = %self.name, removed, "Event subscriber detached");
        removed
    }

    pub fn has_listener(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Deliver `event`; returns `false` when nobody is listening.
    pub fn send(&self, event: PlayerEvent) -> bool {
        let Some(sink) = self.current() else {
            tracing::trace!(channel = %self.name, event = event.name(), "Dropped event without subscriber");
            return false;
        };
        sink.success(&event);
        true
    }

    /// Deliver a failure signal; returns `false` when nobody is listening.
    pub fn send_error(&self, code: &str, message: &str) -> bool {
        let Some(sink) = self.current() else {
            tracing::warn!(channel = %self.name, code, message, "Dropped error without subscriber");
            return false;
        };
        sink.error(code, message);
        true
    }

    // Cloned out so delivery never runs under the lock.
    fn current(&self) -> Option<Arc<dyn EventSink>> {
        self.sink.lock().clone()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("has_listener", &self.has_listener())
            .finish()
    }
}

/// Item produced by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Event(PlayerEvent),
    Error { code: String, message: String },
}

/// [`EventSink`] forwarding into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ChannelMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn success(&self, event: &PlayerEvent) {
        if self.tx.send(ChannelMessage::Event(event.clone())).is_err() {
            tracing::debug!(event = event.name(), "Event receiver dropped");
        }
    }

    fn error(&self, code: &str, message: &str) {
        let message = ChannelMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        };
        if self.tx.send(message).is_err() {
            tracing::debug!(code, "Event receiver dropped");
        }
    }
}
