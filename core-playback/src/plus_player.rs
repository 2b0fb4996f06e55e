//! Alternate streaming backend on the versioned plus player wrapper.

use std::sync::{Arc, Weak};

use bridge_traits::license::DrmType;
use bridge_traits::port::MessagePort;
use bridge_traits::window::Geometry;
use core_drm::{DrmError, DrmSessionManager};
use core_native::listener::PlayerListener;
use core_native::plus_player::PlusPlayerApi;
use core_native::types::{DisplayMode, DisplayRotation, PlayerHandle, PlusDrmType, PlusPlayerState, TrackType, VideoSize};
use core_native::NativeError;
use core_runtime::config::BackendKind;
use core_runtime::events::{EventSink, PlayerEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::common::PlayerCore;
use crate::context::PlayerContext;
use crate::error::{PlayerError, Result};
use crate::player::{CreateRequest, SeekCompletion, VideoPlayer};
use crate::state::{legality, Command, Legality};

fn plus_drm_type(drm_type: DrmType) -> PlusDrmType {
    match drm_type {
        DrmType::None => PlusDrmType::None,
        DrmType::PlayReady => PlusDrmType::Playready,
        DrmType::Widevine => PlusDrmType::WidevineCdm,
    }
}

#[derive(Clone)]
struct Native {
    api: Arc<dyn PlusPlayerApi>,
    handle: PlayerHandle,
}

struct Shared {
    core: PlayerCore,
    native: Mutex<Option<Native>>,
    drm: Mutex<Option<Arc<DrmSessionManager>>>,
}

/// Player driving `libplus_player_wrapper_*`.
///
/// Looping and volume are not available on this engine. Completion does not
/// pause the player.
pub struct PlusPlayer {
    shared: Arc<Shared>,
}

impl PlusPlayer {
    pub fn new(player_id: i64, context: Arc<PlayerContext>) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: PlayerCore::new(player_id, BackendKind::PlusPlayer, context),
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

    fn state(&self, native: &Native) -> std::result::Result<PlusPlayerState, NativeError> {
        native.api.state(native.handle)
    }

    fn allowed(&self, state: std::result::Result<PlusPlayerState, NativeError>, command: Command) -> Result<bool> {
        match state {
            Ok(state) => match legality(command, state) {
                Legality::Proceed => Ok(true),
                Legality::Skip => {
                    debug!(player_id = self.core.player_id(), state = state.as_str(), ?command, "Command skipped");
                    Ok(false)
                }
                Legality::Reject => Err(self.core.not_ready()),
            },
            Err(e) if matches!(command, Command::Play | Command::Pause) => {
                warn!(error = %e, ?command, "State query failed, issuing command anyway");
                Ok(true)
            }
            Err(e) => Err(self.core.playback_error(e.to_string())),
        }
    }

    fn create(self: &Arc<Self>, request: &CreateRequest) -> Result<()> {
        let context = Arc::clone(self.core.context());
        let creation = |message: String| self.core.creation_error(message);
        info!(uri = %redact_url(&request.uri), drm = ?request.drm_type, "Creating PlusPlayer");

        let version = context
            .system_info
            .platform_version()
            .map_err(|e| creation(e.to_string()))?;
        let resource_dir = context.resource_dir().map_err(|e| creation(e.to_string()))?;
        let api = context
            .loader
            .open_plus_player(&version, &resource_dir)
            .map_err(|e| creation(e.to_string()))?;
        api.ensure_mandatory().map_err(|e| creation(e.to_string()))?;

        let handle = api.create().map_err(|e| creation(e.to_string()))?;
        let native = Native {
            api: Arc::clone(&api),
            handle,
        };
        *self.native.lock() = Some(native.clone());

        api.open(handle, &request.uri)
            .map_err(|e| creation(format!("Failed to open {}: {e}", redact_url(&request.uri))))?;
        let app_id = context.system_info.app_id().map_err(|e| creation(e.to_string()))?;
        api.set_app_id(handle, &app_id).map_err(|e| creation(e.to_string()))?;

        let receiver = Arc::new(Receiver {
            shared: Arc::downgrade(self),
        });
        api.register_listener(handle, receiver)
            .map_err(|e| creation(e.to_string()))?;

        if request.drm_type.is_protected() {
            self.setup_drm(&native, request)?;
        }
        self.setup_display(&native, &context)?;

        api.set_display_roi(handle, Geometry::new(0, 0, 1, 1))
            .map_err(|e| creation(e.to_string()))?;
        api.prepare_async(handle).map_err(|e| creation(e.to_string()))?;

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

        drm.create_session(request.drm_type, true)?;
        let drm_handle = drm.drm_handle()?;
        native
            .api
            .set_drm(native.handle, plus_drm_type(request.drm_type), drm_handle)
            .map_err(DrmError::from)?;

        match request.license_server() {
            Some(url) => drm.set_challenge_with_license_server(&request.uri, url)?,
            None => drm.set_challenge_with_callback(&request.uri, self.core.challenge_callback())?,
        }
        info!(player_id = self.core.player_id(), drm_type = %request.drm_type, "DRM configured");
        Ok(())
    }

    fn setup_display(&self, native: &Native, context: &PlayerContext) -> Result<()> {
        let screen = context
            .system_info
            .screen_size()
            .map_err(|_| self.core.creation_error("Could not obtain the screen size"))?;
        let surface_id = native
            .api
            .surface_id(native.handle, context.window.handle())
            .map_err(|e| self.core.creation_error(e.to_string()))?;
        native
            .api
            .set_display(
                native.handle,
                surface_id,
                Geometry::new(0, 0, screen.width, screen.height),
            )
            .map_err(|e| self.core.creation_error(e.to_string()))?;
        native
            .api
            .set_display_mode(native.handle, DisplayMode::DstRoi)
            .map_err(|e| self.core.creation_error(e.to_string()))?;
        Ok(())
    }

    fn teardown(&self) {
        let native = self.native.lock().take();
        if let Some(Native { api, handle }) = native {
            api.unregister_listener(handle);
            if let Err(e) = api.destroy(handle) {
                warn!(error = %e, "DestroyPlayer failed");
            }
        }
        if let Some(drm) = self.drm.lock().take() {
            drm.release();
        }
        self.core.reset();
    }

    fn rotation(&self, native: &Native) -> DisplayRotation {
        native.api.display_rotation(native.handle).unwrap_or_else(|e| {
            warn!(error = %e, "Display rotation unavailable");
            DisplayRotation::None
        })
    }

    fn is_ready(&self) -> bool {
        self.native()
            .is_some_and(|n| matches!(self.state(&n), Ok(PlusPlayerState::Ready)))
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
                self.core.send_error(self.core.error_code(), &e.to_string());
                DisplayRotation::None
            }
        };
        let duration = i32::try_from(duration).unwrap_or(i32::MAX);
        self.core.finish_initialized(duration, size.rotated(rotation));
    }
}

impl VideoPlayer for PlusPlayer {
    fn player_id(&self) -> i64 {
        self.shared.core.player_id()
    }

    fn backend(&self) -> BackendKind {
        BackendKind::PlusPlayer
    }

    #[instrument(skip(self, request), fields(player_id = self.shared.core.player_id()))]
    fn create(&self, request: &CreateRequest) -> Result<i64> {
        if self.shared.native.lock().is_some() {
            return Err(PlayerError::AlreadyCreated);
        }
        match self.shared.create(request) {
            Ok(()) => {
                info!("PlusPlayer created");
                Ok(self.shared.core.player_id())
            }
            Err(e) => {
                error!(error = %e, "PlusPlayer creation failed");
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
        debug!("PlusPlayer disposed");
    }

    fn play(&self) -> Result<()> {
        let Some(native) = self.shared.native() else {
            return Ok(());
        };
        let state = self.shared.state(&native);
        let resume = matches!(state, Ok(PlusPlayerState::Paused));
        if !self.shared.allowed(state, Command::Play)? {
            return Ok(());
        }
        let result = if resume {
            native.api.resume(native.handle)
        } else {
            native.api.start(native.handle)
        };
        result.map_err(|e| self.shared.core.playback_error(e.to_string()))
    }

    fn pause(&self) -> Result<()> {
        let Some(native) = self.shared.native() else {
            return Ok(());
        };
        if !self.shared.allowed(self.shared.state(&native), Command::Pause)? {
            return Ok(());
        }
        native
            .api
            .pause(native.handle)
            .map_err(|e| self.shared.core.playback_error(e.to_string()))
    }

    fn set_looping(&self, _looping: bool) -> Result<()> {
        Err(PlayerError::Unsupported(
            "PlusPlayer doesn't support to set looping".to_string(),
        ))
    }

    fn set_volume(&self, _volume: f64) -> Result<()> {
        Err(PlayerError::Unsupported(
            "PlusPlayer doesn't support to set volume".to_string(),
        ))
    }

    fn set_playback_speed(&self, speed: f64) -> Result<()> {
        let native = self.shared.require_native()?;
        self.shared.allowed(self.shared.state(&native), Command::SetSpeed)?;
        native
            .api
            .set_playback_rate(native.handle, speed)
            .map_err(|e| self.shared.core.playback_error(e.to_string()))
    }

    fn seek_to(&self, position_ms: i64, on_complete: SeekCompletion) -> Result<()> {
        let native = self.shared.require_native()?;
        self.shared.allowed(self.shared.state(&native), Command::Seek)?;
        let duration = native.api.duration(native.handle).ok();
        PlayerCore::check_seek_position(position_ms, duration)?;
        let position = u64::try_from(position_ms)
            .map_err(|_| PlayerError::InvalidState(format!("Seek position {position_ms} is out of range")))?;

        self.shared.core.begin_seek(on_complete)?;
        native.api.seek(native.handle, position).map_err(|e| {
            self.shared.core.abort_seek();
            self.shared.core.playback_error(e.to_string())
        })
    }

    fn position(&self) -> Result<i64> {
        let native = self.shared.require_native()?;
        self.shared.allowed(self.shared.state(&native), Command::Query)?;
        native
            .api
            .playing_time(native.handle)
            .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX))
            .map_err(|e| self.shared.core.playback_error(e.to_string()))
    }

    fn duration(&self) -> Result<i64> {
        let native = self.shared.require_native()?;
        self.shared.allowed(self.shared.state(&native), Command::Query)?;
        native
            .api
            .duration(native.handle)
            .map_err(|e| self.shared.core.playback_error(e.to_string()))
    }

    fn video_size(&self) -> Result<VideoSize> {
        let native = self.shared.require_native()?;
        self.shared.allowed(self.shared.state(&native), Command::Query)?;
        let size = native
            .api
            .video_size(native.handle)
            .map_err(|e| self.shared.core.playback_error(e.to_string()))?;
        Ok(size.rotated(self.shared.rotation(&native)))
    }

    fn set_display_roi(&self, roi: Geometry) -> Result<()> {
        let native = self.shared.require_native()?;
        native
            .api
            .set_display_roi(native.handle, roi)
            .map_err(|e| self.shared.core.playback_error(e.to_string()))
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

impl Drop for PlusPlayer {
    fn drop(&mut self) {
        self.dispose();
    }
}

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
                    .send_error(shared.core.error_code(), "Failed to prepare PlusPlayer");
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
        self.with_shared(|shared| shared.core.send(PlayerEvent::Completed));
    }

    fn on_error(&self, code: i32, message: Option<String>) {
        self.with_shared(|shared| {
            let message = message.unwrap_or_default();
            error!(player_id = shared.core.player_id(), code, %message, "PlusPlayer error");
            shared.core.send_error(shared.core.error_code(), &message);
        });
    }

    fn on_subtitle_updated(&self, duration: u64, text: String) {
        self.with_shared(|shared| shared.core.on_subtitle(duration, text));
    }

    /// License acquired for this player.
    fn on_drm_init_complete(&self, drm_handle: &mut i32, pssh: &[u8]) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let (Some(drm), Some(native)) = (shared.drm(), shared.native()) else {
            return false;
        };
        drm.security_init_complete(drm_handle, pssh, Some(native.handle))
    }

    fn on_drm_init_data(&self, drm_handle: &mut i32, pssh: &[u8], track: TrackType) {
        self.with_shared(|shared| {
            let (Some(drm), Some(native)) = (shared.drm(), shared.native()) else {
                return;
            };
            if !drm.security_init_complete(drm_handle, pssh, None) {
                warn!(?track, "Security initialization rejected");
                return;
            }
            if let Err(e) = native.api.drm_license_acquired_done(native.handle, track) {
                warn!(error = %e, ?track, "DrmLicenseAcquiredDone failed");
            }
        });
    }

    fn on_drm_update_pssh(&self, data: &[u8]) -> i32 {
        if data.is_empty() {
            debug!("Empty DRM init data message ignored");
            return 0;
        }
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
