#![allow(unsafe_code)]

//! Streaming player wrapper (`libplus_player_wrapper_*.so`).
//!
//! The wrapper library is built per platform release and exposes a flat C
//! interface over the streaming player. Its path is derived from the platform
//! version (see [`crate::proxy::plus_player_library_path`]).
//!
//! Callbacks are delivered through a listener table registered by pointer,
//! so the table lives on the heap next to the receiver until
//! [`PlusPlayerApi::unregister_listener`].

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_uchar, c_uint, c_void, CStr, CString};
use std::path::Path;
use std::sync::Arc;

use bridge_traits::window::{Geometry, WindowHandle};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{NativeError, Result};
use crate::listener::PlayerListener;
use crate::media_player::bytes;
use crate::proxy::{ensure_available, Capability, LibraryProxy};
use crate::types::{
    DisplayMode, DisplayRotation, PlayerHandle, PlusDrmType, PlusPlayerState, TrackType, VideoSize,
};

const DISPLAY_TYPE_OVERLAY: c_int = 1;
const STREAMING_MESSAGE_DRM_INIT_DATA: c_int = 10;

/// Operations of the alternate streaming backend.
pub trait PlusPlayerApi: Send + Sync {
    /// Fail unless the entry points every player needs resolved.
    fn ensure_mandatory(&self) -> Result<()>;

    fn create(&self) -> Result<PlayerHandle>;
    fn destroy(&self, player: PlayerHandle) -> Result<()>;
    fn open(&self, player: PlayerHandle, uri: &str) -> Result<()>;
    fn set_app_id(&self, player: PlayerHandle, app_id: &str) -> Result<()>;

    /// Register the callback table pointing at `listener`.
    fn register_listener(&self, player: PlayerHandle, listener: Arc<dyn PlayerListener>) -> Result<()>;

    /// Unregister the callback table and drop the receiver.
    fn unregister_listener(&self, player: PlayerHandle);

    /// Configure content protection; license-acquired notifications go to
    /// the registered receiver.
    fn set_drm(&self, player: PlayerHandle, drm_type: PlusDrmType, drm_handle: i32) -> Result<()>;
    fn drm_license_acquired_done(&self, player: PlayerHandle, track: TrackType) -> Result<()>;

    /// Compositor surface id of `window`.
    fn surface_id(&self, player: PlayerHandle, window: WindowHandle) -> Result<u32>;
    fn set_display(&self, player: PlayerHandle, surface_id: u32, area: Geometry) -> Result<()>;
    fn set_display_mode(&self, player: PlayerHandle, mode: DisplayMode) -> Result<()>;
    fn set_display_roi(&self, player: PlayerHandle, roi: Geometry) -> Result<()>;
    fn display_rotation(&self, player: PlayerHandle) -> Result<DisplayRotation>;

    fn state(&self, player: PlayerHandle) -> Result<PlusPlayerState>;
    fn duration(&self, player: PlayerHandle) -> Result<i64>;
    fn playing_time(&self, player: PlayerHandle) -> Result<u64>;
    fn video_size(&self, player: PlayerHandle) -> Result<VideoSize>;

    fn set_playback_rate(&self, player: PlayerHandle, rate: f64) -> Result<()>;
    fn prepare_async(&self, player: PlayerHandle) -> Result<()>;
    fn start(&self, player: PlayerHandle) -> Result<()>;
    fn pause(&self, player: PlayerHandle) -> Result<()>;
    fn resume(&self, player: PlayerHandle) -> Result<()>;
    fn seek(&self, player: PlayerHandle, position_ms: u64) -> Result<()>;
}

type UserData = *mut c_void;

#[repr(C)]
struct MessageParam {
    data: *const c_char,
    size: c_int,
}

#[repr(C)]
struct ListenerTable {
    buffering: Option<unsafe extern "C" fn(c_int, UserData)>,
    adaptive_streaming_control: Option<unsafe extern "C" fn(c_int, *const MessageParam, UserData)>,
    completed: Option<unsafe extern "C" fn(UserData)>,
    drm_init_data: Option<unsafe extern "C" fn(*mut c_int, c_uint, *mut c_uchar, c_int, UserData)>,
    error: Option<unsafe extern "C" fn(c_int, UserData)>,
    error_message: Option<unsafe extern "C" fn(c_int, *const c_char, UserData)>,
    prepared: Option<unsafe extern "C" fn(bool, UserData)>,
    seek_completed: Option<unsafe extern "C" fn(UserData)>,
    subtitle_updated: Option<unsafe extern "C" fn(*mut c_char, c_int, c_int, u64, UserData)>,
}

type LicenseAcquiredCb = unsafe extern "C" fn(*mut c_int, c_uint, *mut c_uchar, UserData) -> bool;

#[repr(C)]
struct DrmProperty {
    drm_type: c_int,
    handle: c_int,
    license_acquired_cb: Option<LicenseAcquiredCb>,
    license_acquired_userdata: UserData,
    external_decryption: bool,
}

type FnCreate = unsafe extern "C" fn() -> *mut c_void;
type FnBool = unsafe extern "C" fn(*mut c_void) -> bool;
type FnVoid = unsafe extern "C" fn(*mut c_void);
type FnStr = unsafe extern "C" fn(*mut c_void, *const c_char) -> bool;
type FnSetAppId = unsafe extern "C" fn(*mut c_void, *const c_char);
type FnSetDisplay = unsafe extern "C" fn(*mut c_void, c_int, u32, c_int, c_int, c_int, c_int) -> bool;
type FnSetDisplayMode = unsafe extern "C" fn(*mut c_void, c_int) -> bool;
type FnSetDisplayRoi = unsafe extern "C" fn(*mut c_void, c_int, c_int, c_int, c_int) -> bool;
type FnGetDisplayRotate = unsafe extern "C" fn(*mut c_void, *mut c_int) -> bool;
type FnGetState = unsafe extern "C" fn(*mut c_void) -> c_int;
type FnGetDuration = unsafe extern "C" fn(*mut c_void, *mut i64) -> bool;
type FnGetPlayingTime = unsafe extern "C" fn(*mut c_void, *mut u64) -> bool;
type FnSetPlaybackRate = unsafe extern "C" fn(*mut c_void, f64) -> bool;
type FnSeek = unsafe extern "C" fn(*mut c_void, u64) -> bool;
type FnGetVideoSize = unsafe extern "C" fn(*mut c_void, *mut c_int, *mut c_int) -> bool;
type FnGetSurfaceId = unsafe extern "C" fn(*mut c_void, *mut c_void) -> c_int;
type FnRegisterListener = unsafe extern "C" fn(*mut c_void, *mut ListenerTable, UserData);
type FnSetDrm = unsafe extern "C" fn(*mut c_void, *const DrmProperty);
type FnLicenseAcquiredDone = unsafe extern "C" fn(*mut c_void, c_int);

struct Symbols {
    create_player: Capability<FnCreate>,
    destroy_player: Capability<FnVoid>,
    open: Capability<FnStr>,
    set_app_id: Capability<FnSetAppId>,
    set_display: Capability<FnSetDisplay>,
    set_display_mode: Capability<FnSetDisplayMode>,
    set_display_roi: Capability<FnSetDisplayRoi>,
    get_display_rotate: Capability<FnGetDisplayRotate>,
    get_state: Capability<FnGetState>,
    get_duration: Capability<FnGetDuration>,
    get_playing_time: Capability<FnGetPlayingTime>,
    set_playback_rate: Capability<FnSetPlaybackRate>,
    prepare_async: Capability<FnBool>,
    start: Capability<FnBool>,
    pause: Capability<FnBool>,
    resume: Capability<FnBool>,
    seek: Capability<FnSeek>,
    get_video_size: Capability<FnGetVideoSize>,
    get_surface_id: Capability<FnGetSurfaceId>,
    register_listener: Capability<FnRegisterListener>,
    unregister_listener: Capability<FnVoid>,
    set_drm: Capability<FnSetDrm>,
    drm_license_acquired_done: Capability<FnLicenseAcquiredDone>,
}

impl Symbols {
    /// # Safety
    ///
    /// The aliases above must match the wrapper's exports.
    unsafe fn resolve(library: &LibraryProxy) -> Self {
        unsafe {
            Self {
                create_player: library.resolve("CreatePlayer"),
                destroy_player: library.resolve("DestroyPlayer"),
                open: library.resolve("Open"),
                set_app_id: library.resolve("SetAppId"),
                set_display: library.resolve("SetDisplay"),
                set_display_mode: library.resolve("SetDisplayMode"),
                set_display_roi: library.resolve("SetDisplayRoi"),
                get_display_rotate: library.resolve("GetDisplayRotate"),
                get_state: library.resolve("GetState"),
                get_duration: library.resolve("GetDuration"),
                get_playing_time: library.resolve("GetPlayingTime"),
                set_playback_rate: library.resolve("SetPlaybackRate"),
                prepare_async: library.resolve("PrepareAsync"),
                start: library.resolve("Start"),
                pause: library.resolve("Pause"),
                resume: library.resolve("Resume"),
                seek: library.resolve("Seek"),
                get_video_size: library.resolve("GetVideoSize"),
                get_surface_id: library.resolve("GetSurfaceId"),
                register_listener: library.resolve("RegisterListener"),
                unregister_listener: library.resolve("UnregisterListener"),
                set_drm: library.resolve("SetDrm"),
                drm_license_acquired_done: library.resolve("DrmLicenseAcquiredDone"),
            }
        }
    }
}

/// Heap-resident registration for one player.
struct Registration {
    listener: Box<Arc<dyn PlayerListener>>,
    table: Box<ListenerTable>,
    drm_property: Option<Box<DrmProperty>>,
}

// SAFETY: the raw pointers inside the table and property refer to the
// registration's own boxes and to static functions.
unsafe impl Send for Registration {}

impl Registration {
    fn user_data(&self) -> UserData {
        &*self.listener as *const Arc<dyn PlayerListener> as UserData
    }
}

/// [`PlusPlayerApi`] backed by the versioned wrapper library.
pub struct DynamicPlusPlayer {
    symbols: Symbols,
    registrations: Mutex<HashMap<PlayerHandle, Registration>>,
    _library: LibraryProxy,
}

impl DynamicPlusPlayer {
    pub fn open(path: &Path) -> Result<Self> {
        let library = LibraryProxy::open(path)?;
        // SAFETY: the signature aliases follow the wrapper's C interface.
        let symbols = unsafe { Symbols::resolve(&library) };
        debug!(library = strip_path(library.path()), "Streaming player entry points resolved");
        Ok(Self {
            symbols,
            registrations: Mutex::new(HashMap::new()),
            _library: library,
        })
    }

    fn bool_call(&self, name: &'static str, cap: &Capability<FnBool>, player: PlayerHandle) -> Result<()> {
        let func = cap.get()?;
        // SAFETY: `player` is a live handle created by this library.
        NativeError::check_bool(name, unsafe { func(player.as_ptr()) })
    }
}

impl PlusPlayerApi for DynamicPlusPlayer {
    fn ensure_mandatory(&self) -> Result<()> {
        ensure_available(&[
            &self.symbols.create_player,
            &self.symbols.destroy_player,
            &self.symbols.open,
            &self.symbols.prepare_async,
            &self.symbols.get_state,
            &self.symbols.register_listener,
            &self.symbols.unregister_listener,
            &self.symbols.set_display,
        ])
    }

    fn create(&self) -> Result<PlayerHandle> {
        let func = self.symbols.create_player.get()?;
        // SAFETY: no arguments.
        PlayerHandle::from_ptr(unsafe { func() }).ok_or(NativeError::NullHandle("CreatePlayer"))
    }

    fn destroy(&self, player: PlayerHandle) -> Result<()> {
        let func = self.symbols.destroy_player.get()?;
        // SAFETY: the handle is not used afterwards.
        unsafe { func(player.as_ptr()) };
        Ok(())
    }

    fn open(&self, player: PlayerHandle, uri: &str) -> Result<()> {
        let func = self.symbols.open.get()?;
        let uri = CString::new(uri).map_err(|e| NativeError::InvalidArgument {
            call: "Open",
            message: e.to_string(),
        })?;
        // SAFETY: the wrapper copies the string.
        NativeError::check_bool("Open", unsafe { func(player.as_ptr(), uri.as_ptr()) })
    }

    fn set_app_id(&self, player: PlayerHandle, app_id: &str) -> Result<()> {
        let func = self.symbols.set_app_id.get()?;
        let app_id = CString::new(app_id).map_err(|e| NativeError::InvalidArgument {
            call: "SetAppId",
            message: e.to_string(),
        })?;
        // SAFETY: the wrapper copies the string.
        unsafe { func(player.as_ptr(), app_id.as_ptr()) };
        Ok(())
    }

    fn register_listener(&self, player: PlayerHandle, listener: Arc<dyn PlayerListener>) -> Result<()> {
        let func = self.symbols.register_listener.get()?;
        let mut registration = Registration {
            listener: Box::new(listener),
            table: Box::new(ListenerTable {
                buffering: Some(on_buffering),
                adaptive_streaming_control: Some(on_adaptive_streaming_control),
                completed: Some(on_completed),
                drm_init_data: Some(on_drm_init_data),
                error: Some(on_error),
                error_message: Some(on_error_message),
                prepared: Some(on_prepared),
                seek_completed: Some(on_seek_completed),
                subtitle_updated: Some(on_subtitle_updated),
            }),
            drm_property: None,
        };
        let user_data = registration.user_data();
        let table: *mut ListenerTable = &mut *registration.table;
        self.registrations.lock().insert(player, registration);
        // SAFETY: both boxes stay alive in `registrations` until unregistered.
        unsafe { func(player.as_ptr(), table, user_data) };
        Ok(())
    }

    fn unregister_listener(&self, player: PlayerHandle) {
        match self.symbols.unregister_listener.get() {
            // SAFETY: `player` is live; callbacks stop before the boxes drop.
            Ok(func) => unsafe { func(player.as_ptr()) },
            Err(e) => warn!(player = %player, error = %e, "Cannot unregister listener"),
        }
        if self.registrations.lock().remove(&player).is_none() {
            trace!(player = %player, "No listener registered");
        }
    }

    fn set_drm(&self, player: PlayerHandle, drm_type: PlusDrmType, drm_handle: i32) -> Result<()> {
        let func = self.symbols.set_drm.get()?;
        let property: *const DrmProperty = {
            let mut registrations = self.registrations.lock();
            let registration = registrations.get_mut(&player).ok_or(NativeError::InvalidArgument {
                call: "SetDrm",
                message: format!("no listener registered for player {player}"),
            })?;
            let property = Box::new(DrmProperty {
                drm_type: drm_type.as_raw(),
                handle: drm_handle,
                license_acquired_cb: Some(on_license_acquired),
                license_acquired_userdata: registration.user_data(),
                external_decryption: false,
            });
            let stored: *const DrmProperty = &**registration.drm_property.insert(property);
            stored
        };
        // SAFETY: the property box lives in the registration.
        unsafe { func(player.as_ptr(), property) };
        Ok(())
    }

    fn drm_license_acquired_done(&self, player: PlayerHandle, track: TrackType) -> Result<()> {
        let func = self.symbols.drm_license_acquired_done.get()?;
        // SAFETY: plain value arguments.
        unsafe { func(player.as_ptr(), track.as_raw()) };
        Ok(())
    }

    fn surface_id(&self, player: PlayerHandle, window: WindowHandle) -> Result<u32> {
        let func = self.symbols.get_surface_id.get()?;
        // SAFETY: the window is owned by the embedder.
        let id = unsafe { func(player.as_ptr(), window.as_ptr()) };
        u32::try_from(id).map_err(|_| NativeError::CallFailed {
            call: "GetSurfaceId",
            code: id,
        })
    }

    fn set_display(&self, player: PlayerHandle, surface_id: u32, area: Geometry) -> Result<()> {
        let func = self.symbols.set_display.get()?;
        // SAFETY: plain value arguments.
        let ok = unsafe {
            func(
                player.as_ptr(),
                DISPLAY_TYPE_OVERLAY,
                surface_id,
                area.x,
                area.y,
                area.width,
                area.height,
            )
        };
        NativeError::check_bool("SetDisplay", ok)
    }

    fn set_display_mode(&self, player: PlayerHandle, mode: DisplayMode) -> Result<()> {
        let func = self.symbols.set_display_mode.get()?;
        // SAFETY: plain value arguments.
        NativeError::check_bool("SetDisplayMode", unsafe { func(player.as_ptr(), mode.as_raw()) })
    }

    fn set_display_roi(&self, player: PlayerHandle, roi: Geometry) -> Result<()> {
        let func = self.symbols.set_display_roi.get()?;
        // SAFETY: plain value arguments.
        let ok = unsafe { func(player.as_ptr(), roi.x, roi.y, roi.width, roi.height) };
        NativeError::check_bool("SetDisplayRoi", ok)
    }

    fn display_rotation(&self, player: PlayerHandle) -> Result<DisplayRotation> {
        let func = self.symbols.get_display_rotate.get()?;
        let mut rotation: c_int = 0;
        // SAFETY: `rotation` outlives the call.
        NativeError::check_bool("GetDisplayRotate", unsafe { func(player.as_ptr(), &mut rotation) })?;
        Ok(DisplayRotation::from_raw(rotation))
    }

    fn state(&self, player: PlayerHandle) -> Result<PlusPlayerState> {
        let func = self.symbols.get_state.get()?;
        // SAFETY: `player` is live.
        Ok(PlusPlayerState::from_raw(unsafe { func(player.as_ptr()) }))
    }

    fn duration(&self, player: PlayerHandle) -> Result<i64> {
        let func = self.symbols.get_duration.get()?;
        let mut duration: i64 = 0;
        // SAFETY: `duration` outlives the call.
        NativeError::check_bool("GetDuration", unsafe { func(player.as_ptr(), &mut duration) })?;
        Ok(duration)
    }

    fn playing_time(&self, player: PlayerHandle) -> Result<u64> {
        let func = self.symbols.get_playing_time.get()?;
        let mut time: u64 = 0;
        // SAFETY: `time` outlives the call.
        NativeError::check_bool("GetPlayingTime", unsafe { func(player.as_ptr(), &mut time) })?;
        Ok(time)
    }

    fn video_size(&self, player: PlayerHandle) -> Result<VideoSize> {
        let func = self.symbols.get_video_size.get()?;
        let (mut width, mut height): (c_int, c_int) = (0, 0);
        // SAFETY: both out-pointers outlive the call.
        let ok = unsafe { func(player.as_ptr(), &mut width, &mut height) };
        NativeError::check_bool("GetVideoSize", ok)?;
        Ok(VideoSize::new(width, height))
    }

    fn set_playback_rate(&self, player: PlayerHandle, rate: f64) -> Result<()> {
        let func = self.symbols.set_playback_rate.get()?;
        // SAFETY: plain value arguments.
        NativeError::check_bool("SetPlaybackRate", unsafe { func(player.as_ptr(), rate) })
    }

    fn prepare_async(&self, player: PlayerHandle) -> Result<()> {
        self.bool_call("PrepareAsync", &self.symbols.prepare_async, player)
    }

    fn start(&self, player: PlayerHandle) -> Result<()> {
        self.bool_call("Start", &self.symbols.start, player)
    }

    fn pause(&self, player: PlayerHandle) -> Result<()> {
        self.bool_call("Pause", &self.symbols.pause, player)
    }

    fn resume(&self, player: PlayerHandle) -> Result<()> {
        self.bool_call("Resume", &self.symbols.resume, player)
    }

    fn seek(&self, player: PlayerHandle, position_ms: u64) -> Result<()> {
        let func = self.symbols.seek.get()?;
        // SAFETY: plain value arguments.
        NativeError::check_bool("Seek", unsafe { func(player.as_ptr(), position_ms) })
    }
}

// ============================================================================
// Trampolines
// ============================================================================

/// # Safety
///
/// `user_data` must be the pointer produced by `Registration::user_data`.
unsafe fn receiver<'a>(user_data: UserData) -> Option<&'a Arc<dyn PlayerListener>> {
    // SAFETY: guaranteed by the caller.
    unsafe { (user_data as *const Arc<dyn PlayerListener>).as_ref() }
}

unsafe fn c_string(text: *const c_char) -> String {
    if text.is_null() {
        String::new()
    } else {
        // SAFETY: the wrapper passes NUL-terminated strings valid for the call.
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }
}

unsafe extern "C" fn on_buffering(percent: c_int, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_buffering(percent);
    }
}

unsafe extern "C" fn on_adaptive_streaming_control(
    message_type: c_int,
    message: *const MessageParam,
    user_data: UserData,
) {
    trace!(message_type, "Adaptive streaming message");
    if message_type != STREAMING_MESSAGE_DRM_INIT_DATA {
        return;
    }
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return;
    };
    // SAFETY: the message is valid for the duration of the callback.
    let data = match unsafe { message.as_ref() } {
        Some(param) => unsafe { bytes(param.data as *const u8, usize::try_from(param.size).unwrap_or(0)) },
        None => &[],
    };
    listener.on_drm_update_pssh(data);
}

unsafe extern "C" fn on_completed(user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_completed();
    }
}

unsafe extern "C" fn on_drm_init_data(
    drm_handle: *mut c_int,
    len: c_uint,
    pssh: *mut c_uchar,
    track: c_int,
    user_data: UserData,
) {
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return;
    };
    let mut handle = if drm_handle.is_null() { 0 } else { unsafe { *drm_handle } };
    let pssh = unsafe { bytes(pssh, len as usize) };
    listener.on_drm_init_data(&mut handle, pssh, TrackType::from_raw(track));
    if !drm_handle.is_null() {
        unsafe { *drm_handle = handle };
    }
}

unsafe extern "C" fn on_error(code: c_int, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_error(code, None);
    }
}

unsafe extern "C" fn on_error_message(code: c_int, message: *const c_char, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_error(code, Some(unsafe { c_string(message) }));
    }
}

unsafe extern "C" fn on_prepared(ok: bool, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_prepared(ok);
    }
}

unsafe extern "C" fn on_seek_completed(user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_seek_completed();
    }
}

unsafe extern "C" fn on_subtitle_updated(
    data: *mut c_char,
    _size: c_int,
    _subtitle_type: c_int,
    duration: u64,
    user_data: UserData,
) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_subtitle_updated(duration, unsafe { c_string(data) });
    }
}

unsafe extern "C" fn on_license_acquired(
    drm_handle: *mut c_int,
    len: c_uint,
    pssh: *mut c_uchar,
    user_data: UserData,
) -> bool {
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return false;
    };
    let mut handle = if drm_handle.is_null() { 0 } else { unsafe { *drm_handle } };
    let pssh = unsafe { bytes(pssh, len as usize) };
    let accepted = listener.on_drm_init_complete(&mut handle, pssh);
    if !drm_handle.is_null() {
        unsafe { *drm_handle = handle };
    }
    accepted
}
