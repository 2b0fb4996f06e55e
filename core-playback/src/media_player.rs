//! Direct backend on the platform media player C API.

use std::sync::{Arc, Weak};

use bridge_traits::port::MessagePort;
use bridge_traits::window::Geometry;
use core_drm::{DrmError, DrmSessionManager};
use core_native::error::NativeError;
use core_native::listener::PlayerListener;
use core_native::media_player::MediaPlayerApi;
use core_native::types::{DisplayMode, DisplayRotation, MediaPlayerState, PlayerHandle, VideoSize};
use core_runtime::config::BackendKind;
use core_runtime::events::{EventSink, PlayerEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::common::PlayerCore;
use crate::context::PlayerContext;
use crate::error::{PlayerError, Result, CODE_INTERRUPTED};
use crate::player::{CreateRequest, SeekCompletion, VideoPlayer};
use crate::state::{legality, Command, Legality};

const INTERRUPTED_MESSAGE: &str = "Media player has been interrupted.";

#[derive(Clone)]
struct Native {
    api: Arc<dyn MediaPlayerApi>,
    handle: PlayerHandle,
}

struct Shared {
    core: PlayerCore,
    native: Mutex<Option<Native>>,
    drm: Mutex<Option<Arc<DrmSessionManager>>>,
}

/// Player driving `libcapi-media-player`.
///
/// Supports every command of [`VideoPlayer`]. Reaching the end of the stream
/// pauses the player, and a platform interruption is terminal.
pub struct MediaPlayer {
    shared: Arc<Shared>,
}

impl MediaPlayer {
    pub fn new(player_id: i64, context: Arc<PlayerContext>) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: PlayerCore::new(player_id, BackendKind::MediaPlayer, context),
                native: Mutex::new(None),
                drm: Mutex::new(None),
            }),
        }
    }
}

impl Shared {
    fn native(&self) -> Option<Native> {
        self.native.lock().clone()
    }

    fn require_native(&self) -> Result<Native> {
        self.native().ok_or_else(|| self.core.not_created())
    }

    fn drm(&self) -> Option<Arc<DrmSessionManager>> {
        self.drm.lock().clone()
    }

    /// Prefer the runtime's own description of a status code.
    fn describe(&self, api: &dyn MediaPlayerApi, err: &NativeError) -> String {
        match err.code() {
            Some(code) => api.error_message(code),
            None => err.to_string(),
        }
    }

    fn playback_error(&self, native: &Native, err: NativeError) -> PlayerError {
        self.core.playback_error(self.describe(native.api.as_ref(), &err))
    }

    /// Whether `command` should reach the runtime in the current state.
    fn allowed(&self, native: &Native, command: Command) -> Result<bool> {
        match native.api.state(native.handle) {
            Ok(state) => match legality(command, state) {
                Legality::Proceed => Ok(true),
                Legality::Skip => {
                    debug!(player_id = self.core.player_id(), %state, ?command, "Command skipped");
                    Ok(false)
                }
                Legality::Reject => Err(self.core.not_ready()),
            },
            Err(e) if matches!(command, Command::Play | Command::Pause) => {
                warn!(error = %e, ?command, "State query failed, issuing command anyway");
                Ok(true)
            }
            Err(e) => Err(self.playback_error(native, e)),
        }
    }

    fn create(self: &Arc<Self>, request: &CreateRequest) -> Result<()> {
        let context = Arc::clone(self.core.context());
        info!(uri = %redact_url(&request.uri), drm = ?request.drm_type, "Creating media player");
        let api = context
            .loader
            .open_media_player()
            .map_err(|e| self.core.creation_error(e.to_string()))?;
        api.ensure_mandatory()
            .map_err(|e| self.core.creation_error(e.to_string()))?;

        let handle = api
            .create()
            .map_err(|e| self.core.creation_error(self.describe(api.as_ref(), &e)))?;
        let native = Native {
            api: Arc::clone(&api),
            handle,
        };
        *self.native.lock() = Some(native.clone());

        let receiver = Arc::new(Receiver {
            shared: Arc::downgrade(self),
        });
        api.bind_listener(handle, receiver)
            .map_err(|e| self.core.creation_error(e.to_string()))?;

        if request.drm_type.is_protected() {
            self.setup_drm(&native, request)?;
        }
        self.setup_display(&native, &context)?;

        let step = |result: std::result::Result<(), NativeError>| {
            result.map_err(|e| self.core.creation_error(self.describe(api.as_ref(), &e)))
        };
        step(api.set_display_roi_area(handle, Geometry::new(0, 0, 1, 1)))?;
        step(api.set_uri(handle, &request.uri))?;
        step(api.set_display_visible(handle, true))?;
        step(api.set_event_callbacks(handle))?;
        step(api.prepare_async(handle))?;

        self.core.open_channel();
        Ok(())
    }

    fn setup_drm(&self, native: &Native, request: &CreateRequest) -> Result<()> {
        let context = self.core.context();
        let drm = Arc::new(DrmSessionManager::new(
            Arc::clone(&context.loader),
            Arc::clone(&context.idle_scheduler),
            context.license_transport.clone(),
        ));
        *self.drm.lock() = Some(Arc::clone(&drm));

        drm.create_session(request.drm_type, false)?;
        let drm_handle = drm.drm_handle()?;
        native
            .api
            .set_drm_handle(native.handle, drm_handle)
            .map_err(DrmError::from)?;
        native
            .api
            .set_drm_callbacks(native.handle)
            .map_err(DrmError::from)?;

        match request.license_server() {
            Some(url) => drm.set_challenge_with_license_server(&request.uri, url)?,
            None => drm.set_challenge_with_callback(&request.uri, self.core.challenge_callback())?,
        }
        info!(player_id = self.core.player_id(), drm_type = %request.drm_type, "DRM configured");
        Ok(())
    }

    fn setup_display(&self, native: &Native, context: &PlayerContext) -> Result<()> {
        let geometry = context
            .window
            .geometry()
            .map_err(|e| self.core.creation_error(e.to_string()))?;
        native
            .api
            .set_ecore_wl_display(native.handle, context.window.handle(), geometry)
            .map_err(|e| self.core.creation_error(self.describe(native.api.as_ref(), &e)))?;
        native
            .api
            .set_display_mode(native.handle, DisplayMode::DstRoi)
            .map_err(|e| self.core.creation_error(self.describe(native.api.as_ref(), &e)))?;
        Ok(())
    }

    /// Release native resources in dependency order: callbacks, player
    /// handle, library, DRM session.
    fn teardown(&self) {
        let native = self.native.lock().take();
        if let Some(Native { api, handle }) = native {
            api.release_listener(handle);
            if matches!(api.state(handle), Ok(state) if state > MediaPlayerState::Idle) {
                if let Err(e) = api.unprepare(handle) {
                    warn!(error = %e, "player_unprepare failed");
                }
            }
            if let Err(e) = api.destroy(handle) {
                warn!(error = %e, "player_destroy failed");
            }
        }
        if let Some(drm) = self.drm.lock().take() {
            drm.release();
        }
        self.core.reset();
    }

    fn rotated_size(&self, native: &Native) -> Result<VideoSize> {
        let size = native
            .api
            .video_size(native.handle)
            .map_err(|e| self.playback_error(native, e))?;
        let rotation = native.api.display_rotation(native.handle).unwrap_or_else(|e| {
            warn!(error = %e, "Display rotation unavailable");
            DisplayRotation::None
        });
        Ok(size.rotated(rotation))
    }

    fn is_ready(&self) -> bool {
        self.native()
            .is_some_and(|n| matches!(n.api.state(n.handle), Ok(MediaPlayerState::Ready)))
    }

    fn send_initialized(&self) {
        if !self.core.should_initialize() {
            return;
        }
        let Some(native) = self.native() else {
            return;
        };
        let duration = native.api.duration(native.handle).unwrap_or_else(|e| {
            warn!(error = %e, "Duration unavailable at initialization");
            0
        });
        let size = native.api.video_size(native.handle).unwrap_or_else(|e| {
            warn!(error = %e, "Video size unavailable at initialization");
            VideoSize::default()
        });
        let rotation = match native.api.display_rotation(native.handle) {
            Ok(rotation) => rotation,
            Err(e) => {
                self.core
                    .send_error(self.core.error_code(), &self.describe(native.api.as_ref(), &e));
                DisplayRotation::None
            }
        };
        self.core.finish_initialized(duration, size.rotated(rotation));
    }
}

impl VideoPlayer for MediaPlayer {
    fn player_id(&self) -> i64 {
        self.shared.core.player_id()
    }

    fn backend(&self) -> BackendKind {
        BackendKind::MediaPlayer
    }

    #[instrument(skip(self, request), fields(player_id = self.shared.core.player_id()))]
    fn create(&self, request: &CreateRequest) -> Result<i64> {
        if self.shared.native.lock().is_some() {
            return Err(PlayerError::AlreadyCreated);
        }
        match self.shared.create(request) {
            Ok(()) => {
                info!("Media player created");
                Ok(self.shared.core.player_id())
            }
            Err(e) => {
                error!(error = %e, "Media player creation failed");
                self.shared.teardown();
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(player_id = self.shared.core.player_id()))]
    fn dispose(&self) {
        self.shared.core.cancel_calls();
        self.shared.teardown();
        self.shared.core.detach();
        debug!("Media player disposed");
    }

    fn play(&self) -> Result<()> {
        let Some(native) = self.shared.native() else {
            return Ok(());
        };
        if !self.shared.allowed(&native, Command::Play)? {
            return Ok(());
        }
        native
            .api
            .start(native.handle)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn pause(&self) -> Result<()> {
        let Some(native) = self.shared.native() else {
            return Ok(());
        };
        if !self.shared.allowed(&native, Command::Pause)? {
            return Ok(());
        }
        native
            .api
            .pause(native.handle)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn set_looping(&self, looping: bool) -> Result<()> {
        let native = self.shared.require_native()?;
        native
            .api
            .set_looping(native.handle, looping)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn set_volume(&self, volume: f64) -> Result<()> {
        let native = self.shared.require_native()?;
        let volume = volume.clamp(0.0, 1.0) as f32;
        native
            .api
            .set_volume(native.handle, volume, volume)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn set_playback_speed(&self, speed: f64) -> Result<()> {
        let native = self.shared.require_native()?;
        self.shared.allowed(&native, Command::SetSpeed)?;
        native
            .api
            .set_playback_rate(native.handle, speed as f32)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn seek_to(&self, position_ms: i64, on_complete: SeekCompletion) -> Result<()> {
        let native = self.shared.require_native()?;
        self.shared.allowed(&native, Command::Seek)?;
        let duration = native.api.duration(native.handle).ok().map(i64::from);
        PlayerCore::check_seek_position(position_ms, duration)?;
        let position = i32::try_from(position_ms)
            .map_err(|_| PlayerError::InvalidState(format!("Seek position {position_ms} is out of range")))?;

        self.shared.core.begin_seek(on_complete)?;
        native.api.seek(native.handle, position).map_err(|e| {
            self.shared.core.abort_seek();
            self.shared.playback_error(&native, e)
        })
    }

    fn position(&self) -> Result<i64> {
        let native = self.shared.require_native()?;
        self.shared.allowed(&native, Command::Query)?;
        native
            .api
            .play_position(native.handle)
            .map(i64::from)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn duration(&self) -> Result<i64> {
        let native = self.shared.require_native()?;
        self.shared.allowed(&native, Command::Query)?;
        native
            .api
            .duration(native.handle)
            .map(i64::from)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn video_size(&self) -> Result<VideoSize> {
        let native = self.shared.require_native()?;
        self.shared.allowed(&native, Command::Query)?;
        self.shared.rotated_size(&native)
    }

    fn set_display_roi(&self, roi: Geometry) -> Result<()> {
        let native = self.shared.require_native()?;
        native
            .api
            .set_display_roi_area(native.handle, roi)
            .map_err(|e| self.shared.playback_error(&native, e))
    }

    fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    fn register_send_port(&self, port: Arc<dyn MessagePort>) {
        self.shared.core.register_send_port(port);
    }

    fn listen(&self, sink: Arc<dyn EventSink>) -> Result<()> {
        self.shared.core.attach(sink)?;
        if self.shared.is_ready() && !self.shared.core.is_initialized() {
            self.shared.send_initialized();
        }
        Ok(())
    }

    fn cancel_listen(&self) {
        self.shared.core.detach();
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Native callback receiver; holds the player weakly so a late callback
/// after disposal finds nothing to act on.
struct Receiver {
    shared: Weak<Shared>,
}

impl Receiver {
    fn with_shared(&self, f: impl FnOnce(&Shared)) {
        if let Some(shared) = self.shared.upgrade() {
            f(&shared);
        }
    }
}

impl PlayerListener for Receiver {
    fn on_prepared(&self, ok: bool) {
        self.with_shared(|shared| {
            if ok {
                shared.send_initialized();
            } else {
                shared
                    .core
                    .send_error(shared.core.error_code(), "Failed to prepare media player");
            }
        });
    }

    fn on_buffering(&self, percent: i32) {
        self.with_shared(|shared| shared.core.on_buffering(percent));
    }

    fn on_seek_completed(&self) {
        self.with_shared(|shared| shared.core.complete_seek());
    }

    fn on_completed(&self) {
        self.with_shared(|shared| {
            shared.core.send(PlayerEvent::Completed);
            if let Some(native) = shared.native() {
                if let Err(e) = native.api.pause(native.handle) {
                    warn!(error = %e, "Pause after completion failed");
                }
            }
        });
    }

    fn on_error(&self, code: i32, message: Option<String>) {
        self.with_shared(|shared| {
            let message = match (message, shared.native()) {
                (Some(message), _) => message,
                (None, Some(native)) => native.api.error_message(code),
                (None, None) => format!("error {code:#x}"),
            };
            error!(player_id = shared.core.player_id(), code, %message, "Media player error");
            shared.core.send_error(shared.core.error_code(), &message);
        });
    }

    fn on_subtitle_updated(&self, duration: u64, text: String) {
        self.with_shared(|shared| shared.core.on_subtitle(duration, text));
    }

    fn on_interrupted(&self, code: i32) {
        self.with_shared(|shared| {
            warn!(player_id = shared.core.player_id(), code, "Media player interrupted");
            shared.core.mark_interrupted();
            shared.core.send_error(CODE_INTERRUPTED, INTERRUPTED_MESSAGE);
        });
    }

    fn on_drm_init_complete(&self, drm_handle: &mut i32, pssh: &[u8]) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let (Some(drm), Some(native)) = (shared.drm(), shared.native()) else {
            return false;
        };
        drm.security_init_complete(drm_handle, pssh, Some(native.handle))
    }

    fn on_drm_update_pssh(&self, data: &[u8]) -> i32 {
        let Some(drm) = self.shared.upgrade().and_then(|shared| shared.drm()) else {
            return -1;
        };
        match drm.update_pssh_data(data) {
            Ok(()) => 0,
            Err(e) => {
                warn!(error = %e, "update_pssh_data failed");
                -1
            }
        }
    }
}
