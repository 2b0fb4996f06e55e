//! State and event plumbing shared by both backends.

use std::sync::Arc;

use bridge_traits::error::BridgeError;
use bridge_traits::port::MessagePort;
use bytes::Bytes;
use core_bridge::{CallBridge, CallOptions, CallScope};
use core_drm::ChallengeCallback;
use core_native::types::VideoSize;
use core_runtime::config::BackendKind;
use core_runtime::events::{EventChannel, EventSink, PlayerEvent};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::buffering::BufferingTracker;
use crate::context::PlayerContext;
use crate::error::{backend_error_code, PlayerError, Result};
use crate::player::SeekCompletion;

type SendPort = Arc<Mutex<Option<Arc<dyn MessagePort>>>>;

#[derive(Debug, Default)]
struct Flags {
    initialized: bool,
    interrupted: bool,
}

/// Per-instance bookkeeping independent of the native engine.
pub(crate) struct PlayerCore {
    player_id: i64,
    backend: BackendKind,
    context: Arc<PlayerContext>,
    scope: CallScope,
    channel: Mutex<Option<Arc<EventChannel>>>,
    flags: Mutex<Flags>,
    buffering: Mutex<BufferingTracker>,
    pending_seek: Mutex<Option<SeekCompletion>>,
    send_port: SendPort,
}

impl PlayerCore {
    pub(crate) fn new(player_id: i64, backend: BackendKind, context: Arc<PlayerContext>) -> Self {
        let scope = context.call_bridge.new_scope();
        Self {
            player_id,
            backend,
            context,
            scope,
            channel: Mutex::new(None),
            flags: Mutex::new(Flags::default()),
            buffering: Mutex::new(BufferingTracker::new()),
            pending_seek: Mutex::new(None),
            send_port: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn player_id(&self) -> i64 {
        self.player_id
    }

    pub(crate) fn backend(&self) -> BackendKind {
        self.backend
    }

    pub(crate) fn context(&self) -> &Arc<PlayerContext> {
        &self.context
    }

    pub(crate) fn error_code(&self) -> &'static str {
        backend_error_code(self.backend)
    }

    pub(crate) fn playback_error(&self, message: impl Into<String>) -> PlayerError {
        PlayerError::playback(self.backend, message)
    }

    pub(crate) fn creation_error(&self, message: impl Into<String>) -> PlayerError {
        PlayerError::creation(self.backend, message)
    }

    fn display_name(&self) -> &'static str {
        match self.backend {
            BackendKind::MediaPlayer => "Media player",
            BackendKind::PlusPlayer => "PlusPlayer",
        }
    }

    pub(crate) fn not_created(&self) -> PlayerError {
        PlayerError::InvalidState(format!("{} is not created", self.display_name()))
    }

    pub(crate) fn not_ready(&self) -> PlayerError {
        PlayerError::InvalidState(format!("{} is not ready", self.display_name()))
    }

    // ------------------------------------------------------------------------
    // Event channel
    // ------------------------------------------------------------------------

    pub(crate) fn open_channel(&self) {
        let name = self.context.config.event_channel_name(self.player_id);
        debug!(player_id = self.player_id, channel = %name, "Event channel opened");
        *self.channel.lock() = Some(Arc::new(EventChannel::new(name)));
    }

    fn channel(&self) -> Option<Arc<EventChannel>> {
        self.channel.lock().clone()
    }

    pub(crate) fn attach(&self, sink: Arc<dyn EventSink>) -> Result<()> {
        let channel = self.channel().ok_or_else(|| self.not_created())?;
        channel.listen(sink);
        Ok(())
    }

    pub(crate) fn detach(&self) {
        if let Some(channel) = self.channel() {
            channel.cancel();
        }
    }

    fn has_listener(&self) -> bool {
        self.channel().is_some_and(|c| c.has_listener())
    }

    pub(crate) fn send(&self, event: PlayerEvent) {
        if let Some(channel) = self.channel() {
            channel.send(event);
        }
    }

    pub(crate) fn send_error(&self, code: &str, message: &str) {
        match self.channel() {
            Some(channel) => {
                channel.send_error(code, message);
            }
            None => warn!(player_id = self.player_id, code, message, "Error before event channel exists"),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle flags
    // ------------------------------------------------------------------------

    pub(crate) fn is_initialized(&self) -> bool {
        self.flags.lock().initialized
    }

    pub(crate) fn mark_interrupted(&self) {
        self.flags.lock().interrupted = true;
    }

    /// Whether an initialized event may be gathered and sent now.
    pub(crate) fn should_initialize(&self) -> bool {
        let flags = self.flags.lock();
        !flags.initialized && !flags.interrupted && self.has_listener()
    }

    /// Record initialization and emit the event exactly once.
    pub(crate) fn finish_initialized(&self, duration: i32, size: VideoSize) {
        {
            let mut flags = self.flags.lock();
            if flags.initialized || flags.interrupted {
                return;
            }
            flags.initialized = true;
        }
        info!(
            player_id = self.player_id,
            duration,
            width = size.width,
            height = size.height,
            "Player initialized"
        );
        self.send(PlayerEvent::Initialized {
            duration,
            width: size.width,
            height: size.height,
        });
    }

    // ------------------------------------------------------------------------
    // Callback helpers
    // ------------------------------------------------------------------------

    pub(crate) fn on_buffering(&self, percent: i32) {
        let event = self.buffering.lock().on_percent(percent);
        debug!(player_id = self.player_id, percent, event = event.name(), "Buffering");
        self.send(event);
    }

    pub(crate) fn on_subtitle(&self, duration: u64, text: String) {
        self.send(PlayerEvent::SubtitleUpdate {
            duration: i64::try_from(duration).unwrap_or(i64::MAX),
            text,
        });
    }

    /// Reject positions outside `0..=duration`. A missing or zero duration
    /// (live content) only bounds the position from below.
    pub(crate) fn check_seek_position(position_ms: i64, duration_ms: Option<i64>) -> Result<()> {
        let below_end = duration_ms.filter(|d| *d > 0).map_or(true, |d| position_ms <= d);
        if position_ms >= 0 && below_end {
            Ok(())
        } else {
            Err(PlayerError::InvalidState(format!("Seek position {position_ms} is out of range")))
        }
    }

    pub(crate) fn begin_seek(&self, on_complete: SeekCompletion) -> Result<()> {
        let mut pending = self.pending_seek.lock();
        if pending.is_some() {
            return Err(PlayerError::ConcurrentSeek);
        }
        *pending = Some(on_complete);
        Ok(())
    }

    /// Drop the completion of a seek the runtime refused.
    pub(crate) fn abort_seek(&self) {
        self.pending_seek.lock().take();
    }

    pub(crate) fn complete_seek(&self) {
        let completion = self.pending_seek.lock().take();
        match completion {
            Some(on_complete) => on_complete(),
            None => debug!(player_id = self.player_id, "Seek completed with no waiter"),
        }
    }

    // ------------------------------------------------------------------------
    // Cross-context calls
    // ------------------------------------------------------------------------

    pub(crate) fn register_send_port(&self, port: Arc<dyn MessagePort>) {
        debug!(player_id = self.player_id, port = %port.describe(), "Send port registered");
        *self.send_port.lock() = Some(port);
    }

    pub(crate) fn challenge_callback(&self) -> Arc<dyn ChallengeCallback> {
        Arc::new(BridgeChallenge {
            bridge: Arc::clone(&self.context.call_bridge),
            port: Arc::clone(&self.send_port),
            method: self.context.config.challenge_method.clone(),
            options: CallOptions::default()
                .with_timeout(self.context.config.challenge_timeout)
                .in_scope(self.scope),
        })
    }

    /// Release native threads blocked on the application for this player.
    pub(crate) fn cancel_calls(&self) {
        let cancelled = self.context.call_bridge.cancel_scope(self.scope);
        if cancelled > 0 {
            info!(player_id = self.player_id, cancelled, "Cancelled pending license requests");
        }
    }

    pub(crate) fn reset(&self) {
        self.buffering.lock().reset();
        self.pending_seek.lock().take();
    }
}

impl Drop for PlayerCore {
    fn drop(&mut self) {
        // No native callback can reach a dropped player, so its scope no
        // longer needs to refuse calls.
        self.context.call_bridge.forget_scope(self.scope);
    }
}

/// Forwards license challenges to the application through the call bridge.
struct BridgeChallenge {
    bridge: Arc<CallBridge>,
    port: SendPort,
    method: String,
    options: CallOptions,
}

impl ChallengeCallback for BridgeChallenge {
    fn respond(&self, challenge: &[u8]) -> std::result::Result<Bytes, BridgeError> {
        let port = self
            .port
            .lock()
            .clone()
            .ok_or_else(|| BridgeError::NotAvailable("send port is not registered".to_string()))?;
        self.bridge.invoke(
            port.as_ref(),
            &self.method,
            Bytes::copy_from_slice(challenge),
            self.options,
        )
    }
}
