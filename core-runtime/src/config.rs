//! # Player Configuration
//!
//! Settings shared by every player instance created by the plugin: which
//! native backend to drive, where its libraries live, and how long a native
//! callback thread may wait on the application for a license response.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{BackendKind, PlayerConfig};
//! use std::time::Duration;
//!
//! let config = PlayerConfig::default()
//!     .with_backend(BackendKind::PlusPlayer)
//!     .with_challenge_timeout(Duration::from_secs(10));
//! config.validate()?;
//! ```
//!
//! The struct is `serde`-friendly so embedders can ship it as JSON; every
//! field falls back to its default when omitted.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest wait a native thread may spend on a cross-context reply.
pub const MAX_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Native playback engine driven by the player instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Platform media player C API (`libcapi-media-player`)
    #[default]
    MediaPlayer,
    /// Versioned streaming player wrapper (`libplus_player_wrapper_*`)
    PlusPlayer,
}

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Backend selected for every player created with this configuration.
    ///
    /// Default: [`BackendKind::MediaPlayer`].
    #[serde(default)]
    pub backend: BackendKind,

    /// Upper bound on how long a native callback thread waits for the
    /// application to answer a license challenge.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_challenge_timeout")]
    pub challenge_timeout: Duration,

    /// Remote method invoked with the raw challenge bytes.
    ///
    /// Default: `"onLicenseChallenge"`.
    #[serde(default = "default_challenge_method")]
    pub challenge_method: String,

    /// Prefix of the per-player event channel name; the player id is appended.
    ///
    /// Default: `"tizen/video_player/video_events_"`.
    #[serde(default = "default_event_channel_prefix")]
    pub event_channel_prefix: String,

    /// Overrides the application resource directory used to locate the
    /// streaming backend wrapper libraries.
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,

    /// Shared object providing the media player C API.
    ///
    /// Default: `"libcapi-media-player.so.0"`.
    #[serde(default = "default_media_player_library")]
    pub media_player_library: String,

    /// Shared object providing the DRM manager runtime.
    ///
    /// Default: `"libdrmmanager.so.0"`.
    #[serde(default = "default_drm_library")]
    pub drm_library: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            challenge_timeout: default_challenge_timeout(),
            challenge_method: default_challenge_method(),
            event_channel_prefix: default_event_channel_prefix(),
            resource_dir: None,
            media_player_library: default_media_player_library(),
            drm_library: default_drm_library(),
        }
    }
}

impl PlayerConfig {
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }

    pub fn with_challenge_method(mut self, method: impl Into<String>) -> Self {
        self.challenge_method = method.into();
        self
    }

    pub fn with_event_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_channel_prefix = prefix.into();
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    pub fn with_media_player_library(mut self, name: impl Into<String>) -> Self {
        self.media_player_library = name.into();
        self
    }

    pub fn with_drm_library(mut self, name: impl Into<String>) -> Self {
        self.drm_library = name.into();
        self
    }

    /// Event channel name for `player_id`.
    pub fn event_channel_name(&self, player_id: i64) -> String {
        format!("{}{}", self.event_channel_prefix, player_id)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.challenge_timeout.is_zero() {
            return Err(Error::Config(
                "challenge_timeout must be greater than zero".to_string(),
            ));
        }

        if self.challenge_timeout > MAX_CHALLENGE_TIMEOUT {
            return Err(Error::Config(format!(
                "challenge_timeout exceeds maximum of {} seconds",
                MAX_CHALLENGE_TIMEOUT.as_secs()
            )));
        }

        if self.challenge_method.trim().is_empty() {
            return Err(Error::Config(
                "challenge_method cannot be empty".to_string(),
            ));
        }

        if self.event_channel_prefix.is_empty() {
            return Err(Error::Config(
                "event_channel_prefix cannot be empty".to_string(),
            ));
        }

        if self.media_player_library.is_empty() || self.drm_library.is_empty() {
            return Err(Error::Config(
                "native library names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_challenge_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_challenge_method() -> String {
    "onLicenseChallenge".to_string()
}

fn default_event_channel_prefix() -> String {
    "tizen/video_player/video_events_".to_string()
}

fn default_media_player_library() -> String {
    "libcapi-media-player.so.0".to_string()
}

fn default_drm_library() -> String {
    "libdrmmanager.so.0".to_string()
}
