//! In-process stand-ins for the native libraries and host collaborators.
//!
//! Each fake records the native calls it receives by name so tests can
//! assert on order and count, and keeps the registered listener so tests
//! can play the role of the native callback thread.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::port::ReplyPortId;
use bridge_traits::scheduler::QueuedIdleScheduler;
use bridge_traits::system::{ScreenSize, SystemInfo};
use bridge_traits::window::{Geometry, NativeWindow, WindowHandle};
use bridge_traits::LicenseTransport;
use core_bridge::CallBridge;
use core_native::drm::DrmApi;
use core_native::listener::{DrmEventListener, PlayerListener};
use core_native::loader::NativeLoader;
use core_native::media_player::MediaPlayerApi;
use core_native::plus_player::PlusPlayerApi;
use core_native::types::{
    DisplayMode, DisplayRotation, DrmSessionHandle, MediaPlayerState, PlayerHandle, PlusDrmType, PlusPlayerState,
    SessionRef, TrackType, VideoSize,
};
use core_native::{NativeError, Result};
use core_playback::PlayerContext;
use core_runtime::config::PlayerConfig;
use core_runtime::events::{ChannelMessage, EventSink, PlayerEvent};
use parking_lot::Mutex;

pub const PLAYER_HANDLE: usize = 0xa11ce;
pub const WINDOW_HANDLE: usize = 0x1000;
pub const DRM_HANDLE: i32 = 77;

// ============================================================================
// Call log
// ============================================================================

#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
    failing: Mutex<Vec<&'static str>>,
}

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    /// Record `name` and fail it if it was marked failing.
    pub fn check(&self, name: &'static str) -> Result<()> {
        self.record(name);
        if self.failing.lock().contains(&name) {
            return Err(NativeError::CallFailed { call: name, code: -0x10 });
        }
        Ok(())
    }

    pub fn fail(&self, name: &'static str) {
        self.failing.lock().push(name);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c.as_str() == name)
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

fn handle() -> Result<PlayerHandle> {
    PlayerHandle::from_raw(PLAYER_HANDLE).ok_or(NativeError::NullHandle("create"))
}

// ============================================================================
// Media player
// ============================================================================

pub struct FakeMediaPlayer {
    pub log: CallLog,
    pub state: Mutex<MediaPlayerState>,
    pub size: Mutex<VideoSize>,
    /// `None` makes the rotation query fail.
    pub rotation: Mutex<Option<DisplayRotation>>,
    pub duration: Mutex<i32>,
    listener: Mutex<Option<Arc<dyn PlayerListener>>>,
}

impl Default for FakeMediaPlayer {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            state: Mutex::new(MediaPlayerState::Idle),
            size: Mutex::new(VideoSize::new(1920, 1080)),
            rotation: Mutex::new(Some(DisplayRotation::None)),
            duration: Mutex::new(60_000),
            listener: Mutex::new(None),
        }
    }
}

impl FakeMediaPlayer {
    pub fn set_state(&self, state: MediaPlayerState) {
        *self.state.lock() = state;
    }

    pub fn listener(&self) -> Arc<dyn PlayerListener> {
        self.listener.lock().clone().expect("listener bound")
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }
}

impl MediaPlayerApi for FakeMediaPlayer {
    fn ensure_mandatory(&self) -> Result<()> {
        self.log.check("ensure_mandatory")
    }

    fn create(&self) -> Result<PlayerHandle> {
        self.log.check("player_create")?;
        handle()
    }

    fn destroy(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("player_destroy")
    }

    fn bind_listener(&self, _player: PlayerHandle, listener: Arc<dyn PlayerListener>) -> Result<()> {
        self.log.check("bind_listener")?;
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn release_listener(&self, _player: PlayerHandle) {
        self.log.record("release_listener");
        self.listener.lock().take();
    }

    fn set_uri(&self, _player: PlayerHandle, uri: &str) -> Result<()> {
        self.log.record(format!("uri={uri}"));
        self.log.check("player_set_uri")
    }

    fn set_ecore_wl_display(&self, _player: PlayerHandle, window: WindowHandle, area: Geometry) -> Result<()> {
        self.log.record(format!(
            "display={:#x}@{}x{}",
            window.as_ptr() as usize,
            area.width,
            area.height
        ));
        self.log.check("player_set_ecore_wl_display")
    }

    fn set_display_mode(&self, _player: PlayerHandle, mode: DisplayMode) -> Result<()> {
        self.log.record(format!("mode={}", mode.as_raw()));
        self.log.check("player_set_display_mode")
    }

    fn set_display_roi_area(&self, _player: PlayerHandle, roi: Geometry) -> Result<()> {
        self.log.record(format!("roi={},{},{},{}", roi.x, roi.y, roi.width, roi.height));
        self.log.check("player_set_display_roi_area")
    }

    fn set_display_visible(&self, _player: PlayerHandle, visible: bool) -> Result<()> {
        self.log.record(format!("visible={visible}"));
        self.log.check("player_set_display_visible")
    }

    fn set_drm_handle(&self, _player: PlayerHandle, drm_handle: i32) -> Result<()> {
        self.log.record(format!("drm_handle={drm_handle}"));
        self.log.check("player_set_drm_handle")
    }

    fn set_drm_callbacks(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("set_drm_callbacks")
    }

    fn set_event_callbacks(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("set_event_callbacks")
    }

    fn prepare_async(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("player_prepare_async")
    }

    fn unprepare(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("player_unprepare")
    }

    fn start(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("player_start")?;
        self.set_state(MediaPlayerState::Playing);
        Ok(())
    }

    fn pause(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("player_pause")?;
        self.set_state(MediaPlayerState::Paused);
        Ok(())
    }

    fn state(&self, _player: PlayerHandle) -> Result<MediaPlayerState> {
        Ok(*self.state.lock())
    }

    fn set_looping(&self, _player: PlayerHandle, looping: bool) -> Result<()> {
        self.log.record(format!("looping={looping}"));
        self.log.check("player_set_looping")
    }

    fn set_volume(&self, _player: PlayerHandle, left: f32, right: f32) -> Result<()> {
        self.log.record(format!("volume={left},{right}"));
        self.log.check("player_set_volume")
    }

    fn set_playback_rate(&self, _player: PlayerHandle, rate: f32) -> Result<()> {
        self.log.record(format!("rate={rate}"));
        self.log.check("player_set_playback_rate")
    }

    fn seek(&self, _player: PlayerHandle, position_ms: i32) -> Result<()> {
        self.log.record(format!("seek={position_ms}"));
        self.log.check("player_set_play_position")
    }

    fn play_position(&self, _player: PlayerHandle) -> Result<i32> {
        Ok(1234)
    }

    fn duration(&self, _player: PlayerHandle) -> Result<i32> {
        Ok(*self.duration.lock())
    }

    fn video_size(&self, _player: PlayerHandle) -> Result<VideoSize> {
        Ok(*self.size.lock())
    }

    fn display_rotation(&self, _player: PlayerHandle) -> Result<DisplayRotation> {
        (*self.rotation.lock()).ok_or(NativeError::CallFailed {
            call: "player_get_display_rotation",
            code: -0x20,
        })
    }

    fn error_message(&self, code: i32) -> String {
        format!("media error {code:#x}")
    }
}

// ============================================================================
// Plus player
// ============================================================================

pub struct FakePlusPlayer {
    pub log: CallLog,
    pub state: Mutex<PlusPlayerState>,
    pub size: Mutex<VideoSize>,
    pub rotation: Mutex<Option<DisplayRotation>>,
    listener: Mutex<Option<Arc<dyn PlayerListener>>>,
}

impl Default for FakePlusPlayer {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            state: Mutex::new(PlusPlayerState::Idle),
            size: Mutex::new(VideoSize::new(3840, 2160)),
            rotation: Mutex::new(Some(DisplayRotation::None)),
            listener: Mutex::new(None),
        }
    }
}

impl FakePlusPlayer {
    pub fn set_state(&self, state: PlusPlayerState) {
        *self.state.lock() = state;
    }

    pub fn listener(&self) -> Arc<dyn PlayerListener> {
        self.listener.lock().clone().expect("listener registered")
    }
}

impl PlusPlayerApi for FakePlusPlayer {
    fn ensure_mandatory(&self) -> Result<()> {
        self.log.check("ensure_mandatory")
    }

    fn create(&self) -> Result<PlayerHandle> {
        self.log.check("CreatePlayer")?;
        handle()
    }

    fn destroy(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("DestroyPlayer")
    }

    fn open(&self, _player: PlayerHandle, uri: &str) -> Result<()> {
        self.log.record(format!("open={uri}"));
        self.log.check("Open")
    }

    fn set_app_id(&self, _player: PlayerHandle, app_id: &str) -> Result<()> {
        self.log.record(format!("app_id={app_id}"));
        Ok(())
    }

    fn register_listener(&self, _player: PlayerHandle, listener: Arc<dyn PlayerListener>) -> Result<()> {
        self.log.check("RegisterListener")?;
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn unregister_listener(&self, _player: PlayerHandle) {
        self.log.record("UnregisterListener");
        self.listener.lock().take();
    }

    fn set_drm(&self, _player: PlayerHandle, drm_type: PlusDrmType, drm_handle: i32) -> Result<()> {
        self.log.record(format!("set_drm={},{drm_handle}", drm_type.as_raw()));
        self.log.check("SetDrm")
    }

    fn drm_license_acquired_done(&self, _player: PlayerHandle, track: TrackType) -> Result<()> {
        self.log.record(format!("license_done={}", track.as_raw()));
        Ok(())
    }

    fn surface_id(&self, _player: PlayerHandle, window: WindowHandle) -> Result<u32> {
        self.log.record(format!("surface_of={:#x}", window.as_ptr() as usize));
        Ok(42)
    }

    fn set_display(&self, _player: PlayerHandle, surface_id: u32, area: Geometry) -> Result<()> {
        self.log
            .record(format!("set_display={surface_id}@{}x{}", area.width, area.height));
        self.log.check("SetDisplay")
    }

    fn set_display_mode(&self, _player: PlayerHandle, mode: DisplayMode) -> Result<()> {
        self.log.record(format!("mode={}", mode.as_raw()));
        Ok(())
    }

    fn set_display_roi(&self, _player: PlayerHandle, roi: Geometry) -> Result<()> {
        self.log.record(format!("roi={},{},{},{}", roi.x, roi.y, roi.width, roi.height));
        self.log.check("SetDisplayRoi")
    }

    fn display_rotation(&self, _player: PlayerHandle) -> Result<DisplayRotation> {
        (*self.rotation.lock()).ok_or(NativeError::Rejected("GetDisplayRotate"))
    }

    fn state(&self, _player: PlayerHandle) -> Result<PlusPlayerState> {
        Ok(*self.state.lock())
    }

    fn duration(&self, _player: PlayerHandle) -> Result<i64> {
        Ok(90_000)
    }

    fn playing_time(&self, _player: PlayerHandle) -> Result<u64> {
        Ok(4321)
    }

    fn video_size(&self, _player: PlayerHandle) -> Result<VideoSize> {
        Ok(*self.size.lock())
    }

    fn set_playback_rate(&self, _player: PlayerHandle, rate: f64) -> Result<()> {
        self.log.record(format!("rate={rate}"));
        Ok(())
    }

    fn prepare_async(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("PrepareAsync")
    }

    fn start(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("Start")?;
        self.set_state(PlusPlayerState::Playing);
        Ok(())
    }

    fn pause(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("Pause")?;
        self.set_state(PlusPlayerState::Paused);
        Ok(())
    }

    fn resume(&self, _player: PlayerHandle) -> Result<()> {
        self.log.check("Resume")?;
        self.set_state(PlusPlayerState::Playing);
        Ok(())
    }

    fn seek(&self, _player: PlayerHandle, position_ms: u64) -> Result<()> {
        self.log.record(format!("seek={position_ms}"));
        self.log.check("Seek")
    }
}

// ============================================================================
// DRM runtime
// ============================================================================

/// DRM runtime that issues one queued challenge from inside `Initialize`.
#[derive(Default)]
pub struct FakeDrm {
    pub log: CallLog,
    listener: Mutex<Option<Arc<dyn DrmEventListener>>>,
    challenge: Mutex<Option<(SessionRef, Vec<u8>)>>,
    pub challenge_accepted: Mutex<Option<bool>>,
}

impl FakeDrm {
    pub fn queue_challenge(&self, session_ref: usize, message: &[u8]) {
        *self.challenge.lock() = Some((SessionRef(session_ref), message.to_vec()));
    }

    pub fn listener(&self) -> Option<Arc<dyn DrmEventListener>> {
        self.listener.lock().clone()
    }
}

impl DrmApi for FakeDrm {
    fn set_local_mode(&self) -> Result<()> {
        self.log.check("local_mode")
    }

    fn create_session(&self, sub_type: &str) -> Result<DrmSessionHandle> {
        self.log.record(format!("create_session={sub_type}"));
        self.log.check("DMGRCreateDRMSession")?;
        DrmSessionHandle::from_raw(0xd12).ok_or(NativeError::NullHandle("DMGRCreateDRMSession"))
    }

    fn register_listener(&self, _session: DrmSessionHandle, listener: Arc<dyn DrmEventListener>) -> Result<()> {
        self.log.check("error_event_callback")?;
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn enable_challenge(&self, _session: DrmSessionHandle) -> Result<()> {
        self.log.check("eme_request_key_callback")
    }

    fn set_manifest(&self, _session: DrmSessionHandle, url: &str) -> Result<()> {
        self.log.record(format!("manifest={url}"));
        Ok(())
    }

    fn initialize(&self, _session: DrmSessionHandle) -> Result<()> {
        self.log.check("Initialize")?;
        let challenge = self.challenge.lock().take();
        let listener = self.listener();
        if let (Some((session_ref, message)), Some(listener)) = (challenge, listener) {
            let accepted = listener.on_challenge(session_ref, &message);
            *self.challenge_accepted.lock() = Some(accepted);
        }
        Ok(())
    }

    fn finalize(&self, _session: DrmSessionHandle) -> Result<()> {
        self.log.check("Finalize")
    }

    fn drm_handle(&self, _session: DrmSessionHandle) -> Result<i32> {
        self.log.check("drm_handle")?;
        Ok(DRM_HANDLE)
    }

    fn update_pssh_data(&self, _session: DrmSessionHandle, data: &[u8]) -> Result<()> {
        self.log.record(format!("update_pssh={}", data.len()));
        Ok(())
    }

    fn install_key(&self, _session: DrmSessionHandle, session_ref: SessionRef, response: &[u8]) -> Result<()> {
        self.log.record(format!(
            "install_key={}:{}",
            session_ref.0,
            String::from_utf8_lossy(response)
        ));
        Ok(())
    }

    fn security_init_complete(
        &self,
        _session: DrmSessionHandle,
        _drm_handle: &mut i32,
        pssh: &[u8],
        player: Option<PlayerHandle>,
    ) -> bool {
        self.log.record(format!(
            "security_init={}:{}",
            pssh.len(),
            player.map_or(0, |p| p.as_raw())
        ));
        true
    }

    fn release_session(&self, _session: DrmSessionHandle) -> Result<()> {
        self.listener.lock().take();
        self.log.check("DMGRReleaseDRMSession")
    }
}

// ============================================================================
// Loader and host collaborators
// ============================================================================

#[derive(Default)]
pub struct FakeLoader {
    pub media: Arc<FakeMediaPlayer>,
    pub plus: Arc<FakePlusPlayer>,
    pub drm: Arc<FakeDrm>,
    pub plus_requests: Mutex<Vec<(String, PathBuf)>>,
}

impl NativeLoader for FakeLoader {
    fn open_media_player(&self) -> Result<Arc<dyn MediaPlayerApi>> {
        Ok(self.media.clone())
    }

    fn open_plus_player(&self, platform_version: &str, resource_dir: &Path) -> Result<Arc<dyn PlusPlayerApi>> {
        self.plus_requests
            .lock()
            .push((platform_version.to_string(), resource_dir.to_path_buf()));
        Ok(self.plus.clone())
    }

    fn open_drm_runtime(&self) -> Result<Arc<dyn DrmApi>> {
        Ok(self.drm.clone())
    }
}

pub struct FakeWindow {
    pub geometry: Mutex<Option<Geometry>>,
}

impl Default for FakeWindow {
    fn default() -> Self {
        Self {
            geometry: Mutex::new(Some(Geometry::new(0, 0, 1920, 1080))),
        }
    }
}

impl NativeWindow for FakeWindow {
    fn handle(&self) -> WindowHandle {
        WindowHandle::from_raw(WINDOW_HANDLE as *mut std::ffi::c_void)
    }

    fn geometry(&self) -> BridgeResult<Geometry> {
        (*self.geometry.lock()).ok_or_else(|| {
            BridgeError::NotAvailable("Cannot open dynamic library of ecore_wl2".to_string())
        })
    }
}

pub struct FakeSystem {
    pub screen: Mutex<Option<ScreenSize>>,
}

impl Default for FakeSystem {
    fn default() -> Self {
        Self {
            screen: Mutex::new(Some(ScreenSize {
                width: 1920,
                height: 1080,
            })),
        }
    }
}

impl SystemInfo for FakeSystem {
    fn platform_version(&self) -> BridgeResult<String> {
        Ok("6.5".to_string())
    }

    fn screen_size(&self) -> BridgeResult<ScreenSize> {
        (*self.screen.lock()).ok_or_else(|| BridgeError::OperationFailed("system_info_get_platform_int".to_string()))
    }

    fn app_id(&self) -> BridgeResult<String> {
        Ok("org.example.player".to_string())
    }

    fn resource_dir(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/opt/usr/apps/org.example.player/res"))
    }
}

/// Event sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ChannelMessage>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.messages.lock().clone()
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                ChannelMessage::Event(event) => Some(event),
                ChannelMessage::Error { .. } => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                ChannelMessage::Error { code, message } => Some((code, message)),
                ChannelMessage::Event(_) => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn success(&self, event: &PlayerEvent) {
        self.messages.lock().push(ChannelMessage::Event(event.clone()));
    }

    fn error(&self, code: &str, message: &str) {
        self.messages.lock().push(ChannelMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub loader: Arc<FakeLoader>,
    pub window: Arc<FakeWindow>,
    pub system: Arc<FakeSystem>,
    pub scheduler: Arc<QueuedIdleScheduler>,
    pub bridge: Arc<CallBridge>,
    pub context: Arc<PlayerContext>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_transport(transport: Arc<dyn LicenseTransport>) -> Self {
        Self::build(Some(transport))
    }

    fn build(transport: Option<Arc<dyn LicenseTransport>>) -> Self {
        let loader = Arc::new(FakeLoader::default());
        let window = Arc::new(FakeWindow::default());
        let system = Arc::new(FakeSystem::default());
        let scheduler = Arc::new(QueuedIdleScheduler::new());
        let bridge = Arc::new(CallBridge::new(ReplyPortId(9), Duration::from_secs(5)));

        let mut builder = PlayerContext::builder()
            .config(PlayerConfig::default())
            .window(window.clone())
            .system_info(system.clone())
            .idle_scheduler(scheduler.clone())
            .call_bridge(bridge.clone())
            .loader(loader.clone());
        if let Some(transport) = transport {
            builder = builder.license_transport(transport);
        }
        let context = Arc::new(builder.build().expect("valid context"));

        Self {
            loader,
            window,
            system,
            scheduler,
            bridge,
            context,
        }
    }

    pub fn media(&self) -> &FakeMediaPlayer {
        &self.loader.media
    }

    pub fn plus(&self) -> &FakePlusPlayer {
        &self.loader.plus
    }

    pub fn drm(&self) -> &FakeDrm {
        &self.loader.drm
    }
}
