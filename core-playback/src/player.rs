//! Backend-independent player contract.

use std::sync::Arc;

use bridge_traits::license::DrmType;
use bridge_traits::port::MessagePort;
use bridge_traits::window::Geometry;
use core_native::types::VideoSize;
use core_runtime::config::BackendKind;
use core_runtime::events::EventSink;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Invoked once when the native runtime reports that a seek finished.
pub type SeekCompletion = Box<dyn FnOnce() + Send + 'static>;

/// Parameters of [`VideoPlayer::create`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub uri: String,
    #[serde(default)]
    pub drm_type: DrmType,
    /// When set and non-empty, challenges go straight to this server instead
    /// of the application.
    #[serde(default)]
    pub license_server_url: Option<String>,
}

impl CreateRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_drm(mut self, drm_type: DrmType, license_server_url: Option<String>) -> Self {
        self.drm_type = drm_type;
        self.license_server_url = license_server_url;
        self
    }

    /// License server URL, if one was given and is non-empty.
    pub fn license_server(&self) -> Option<&str> {
        self.license_server_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// One video player instance bound to a native backend.
///
/// Commands are expected to be serialized per instance by the caller;
/// native callbacks may run concurrently with them.
pub trait VideoPlayer: Send + Sync {
    fn player_id(&self) -> i64;

    fn backend(&self) -> BackendKind;

    /// Create the native player, configure DRM and display, and start
    /// asynchronous preparation. Returns the player id.
    fn create(&self, request: &CreateRequest) -> Result<i64>;

    /// Release every native resource. Safe to call repeatedly.
    fn dispose(&self);

    /// No-op unless the player is ready or paused.
    fn play(&self) -> Result<()>;

    /// No-op unless the player is playing.
    fn pause(&self) -> Result<()>;

    fn set_looping(&self, looping: bool) -> Result<()>;

    /// `volume` in `[0.0, 1.0]`.
    fn set_volume(&self, volume: f64) -> Result<()>;

    fn set_playback_speed(&self, speed: f64) -> Result<()>;

    /// Start a seek; `on_complete` runs when the native runtime finishes it.
    fn seek_to(&self, position_ms: i64, on_complete: SeekCompletion) -> Result<()>;

    /// Playback position in milliseconds.
    fn position(&self) -> Result<i64>;

    /// Media duration in milliseconds.
    fn duration(&self) -> Result<i64>;

    /// Video dimensions, swapped for 90/270 degree display rotation.
    fn video_size(&self) -> Result<VideoSize>;

    fn set_display_roi(&self, roi: Geometry) -> Result<()>;

    /// Whether the native state is exactly Ready.
    fn is_ready(&self) -> bool;

    /// Port used to reach the application for license challenges.
    fn register_send_port(&self, port: Arc<dyn MessagePort>);

    /// Attach the event subscriber, replacing any previous one.
    fn listen(&self, sink: Arc<dyn EventSink>) -> Result<()>;

    fn cancel_listen(&self);
}
