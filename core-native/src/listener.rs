//! Callback receivers for native runtime notifications.
//!
//! The API wrappers register `extern "C"` trampolines with the native
//! libraries and dispatch into these traits. Methods run on native threads,
//! sometimes while the runtime holds internal locks, so implementations
//! must return quickly and must not re-enter the same native object.

use crate::types::{SessionRef, TrackType};

/// Receiver for player callbacks.
pub trait PlayerListener: Send + Sync {
    /// Asynchronous preparation finished.
    fn on_prepared(&self, ok: bool);

    /// Buffering progress in percent.
    fn on_buffering(&self, percent: i32);

    fn on_seek_completed(&self);

    /// End of stream reached.
    fn on_completed(&self);

    /// Runtime error; `message` is present when the runtime supplies one.
    fn on_error(&self, code: i32, message: Option<String>);

    fn on_subtitle_updated(&self, duration: u64, text: String);

    /// Playback interrupted by the platform (resource conflict, call, etc).
    fn on_interrupted(&self, _code: i32) {}

    /// Security initialization finished for this player.
    ///
    /// Return `true` when the DRM session accepted it.
    fn on_drm_init_complete(&self, _drm_handle: &mut i32, _pssh: &[u8]) -> bool {
        false
    }

    /// Initialization data for one elementary stream.
    fn on_drm_init_data(&self, _drm_handle: &mut i32, _pssh: &[u8], _track: TrackType) {}

    /// New protection system data extracted from the stream.
    ///
    /// Returns the DRM status code handed back to the runtime.
    fn on_drm_update_pssh(&self, _data: &[u8]) -> i32 {
        0
    }
}

/// Receiver for DRM session callbacks.
pub trait DrmEventListener: Send + Sync {
    /// License challenge emitted by the session.
    ///
    /// Return `true` when a response was obtained and its installation has
    /// been arranged.
    fn on_challenge(&self, session: SessionRef, message: &[u8]) -> bool;

    /// Asynchronous runtime error.
    fn on_error(&self, code: i64, message: &str);
}
