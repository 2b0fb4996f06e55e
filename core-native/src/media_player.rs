#![allow(unsafe_code)]

//! Media player C API (`libcapi-media-player`).
//!
//! Every entry point, including the private display and DRM extensions, is
//! resolved from the shared object at runtime. The private extensions are
//! mandatory: [`MediaPlayerApi::ensure_mandatory`] fails when any of them is
//! absent so creation can stop before a half-configured player exists.

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_uchar, c_uint, c_ulong, c_void, CStr, CString};
use std::sync::Arc;

use bridge_traits::window::{Geometry, WindowHandle};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{NativeError, Result};
use crate::listener::PlayerListener;
use crate::proxy::{ensure_available, Capability, LibraryProxy};
use crate::types::{DisplayMode, DisplayRotation, MediaPlayerState, PlayerHandle, VideoSize};

/// Default soname of the media player C API.
pub const MEDIA_PLAYER_LIBRARY: &str = "libcapi-media-player.so.0";

const PLAYER_DISPLAY_TYPE_OVERLAY: c_int = 0;
const PLAYER_DRM_TYPE_EME: c_int = 14;

/// Operations of the direct native backend.
///
/// Calls taking a [`PlayerHandle`] must only be issued for a handle returned
/// by [`MediaPlayerApi::create`] and not yet destroyed.
pub trait MediaPlayerApi: Send + Sync {
    /// Fail unless the private display and DRM entry points resolved.
    fn ensure_mandatory(&self) -> Result<()>;

    fn create(&self) -> Result<PlayerHandle>;
    fn destroy(&self, player: PlayerHandle) -> Result<()>;

    /// Store the receiver for all callbacks of `player`.
    fn bind_listener(&self, player: PlayerHandle, listener: Arc<dyn PlayerListener>) -> Result<()>;

    /// Unregister every callback and drop the receiver.
    fn release_listener(&self, player: PlayerHandle);

    fn set_uri(&self, player: PlayerHandle, uri: &str) -> Result<()>;
    fn set_ecore_wl_display(&self, player: PlayerHandle, window: WindowHandle, area: Geometry) -> Result<()>;
    fn set_display_mode(&self, player: PlayerHandle, mode: DisplayMode) -> Result<()>;
    fn set_display_roi_area(&self, player: PlayerHandle, roi: Geometry) -> Result<()>;
    fn set_display_visible(&self, player: PlayerHandle, visible: bool) -> Result<()>;

    /// Attach a DRM manager session (EME type).
    fn set_drm_handle(&self, player: PlayerHandle, drm_handle: i32) -> Result<()>;

    /// Route security-init-complete and init-data callbacks to the receiver.
    fn set_drm_callbacks(&self, player: PlayerHandle) -> Result<()>;

    /// Route buffering, completion, interruption, error and subtitle
    /// callbacks to the receiver.
    fn set_event_callbacks(&self, player: PlayerHandle) -> Result<()>;

    fn prepare_async(&self, player: PlayerHandle) -> Result<()>;
    fn unprepare(&self, player: PlayerHandle) -> Result<()>;
    fn start(&self, player: PlayerHandle) -> Result<()>;
    fn pause(&self, player: PlayerHandle) -> Result<()>;
    fn state(&self, player: PlayerHandle) -> Result<MediaPlayerState>;

    fn set_looping(&self, player: PlayerHandle, looping: bool) -> Result<()>;
    fn set_volume(&self, player: PlayerHandle, left: f32, right: f32) -> Result<()>;
    fn set_playback_rate(&self, player: PlayerHandle, rate: f32) -> Result<()>;

    /// Start an accurate seek; completion arrives through the receiver.
    fn seek(&self, player: PlayerHandle, position_ms: i32) -> Result<()>;

    fn play_position(&self, player: PlayerHandle) -> Result<i32>;
    fn duration(&self, player: PlayerHandle) -> Result<i32>;
    fn video_size(&self, player: PlayerHandle) -> Result<VideoSize>;
    fn display_rotation(&self, player: PlayerHandle) -> Result<DisplayRotation>;

    /// Human readable text for a platform error code.
    fn error_message(&self, code: i32) -> String;
}

type UserData = *mut c_void;
type SimpleCb = unsafe extern "C" fn(UserData);
type BufferingCb = unsafe extern "C" fn(c_int, UserData);
type CodeCb = unsafe extern "C" fn(c_int, UserData);
type SubtitleCb = unsafe extern "C" fn(c_ulong, *mut c_char, UserData);
type DrmInitCompleteCb = unsafe extern "C" fn(*mut c_int, c_uint, *mut c_uchar, UserData) -> bool;
type DrmInitDataCb = unsafe extern "C" fn(c_int, *mut c_void, c_int, UserData) -> c_int;

type FnCreate = unsafe extern "C" fn(*mut *mut c_void) -> c_int;
type FnHandle = unsafe extern "C" fn(*mut c_void) -> c_int;
type FnSetUri = unsafe extern "C" fn(*mut c_void, *const c_char) -> c_int;
type FnPrepareAsync = unsafe extern "C" fn(*mut c_void, Option<SimpleCb>, UserData) -> c_int;
type FnGetInt = unsafe extern "C" fn(*mut c_void, *mut c_int) -> c_int;
type FnSetBool = unsafe extern "C" fn(*mut c_void, bool) -> c_int;
type FnSetInt = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type FnSetVolume = unsafe extern "C" fn(*mut c_void, f32, f32) -> c_int;
type FnSetRate = unsafe extern "C" fn(*mut c_void, f32) -> c_int;
type FnSetPosition = unsafe extern "C" fn(*mut c_void, c_int, bool, Option<SimpleCb>, UserData) -> c_int;
type FnGetSize = unsafe extern "C" fn(*mut c_void, *mut c_int, *mut c_int) -> c_int;
type FnSetRoi = unsafe extern "C" fn(*mut c_void, c_int, c_int, c_int, c_int) -> c_int;
type FnSetCb<C> = unsafe extern "C" fn(*mut c_void, Option<C>, UserData) -> c_int;
type FnErrorMessage = unsafe extern "C" fn(c_int) -> *const c_char;
type FnSetEcoreWlDisplay =
    unsafe extern "C" fn(*mut c_void, c_int, *mut c_void, c_int, c_int, c_int, c_int) -> c_int;
type FnSetDrmHandle = unsafe extern "C" fn(*mut c_void, c_int, c_int) -> c_int;

struct Symbols {
    create: Capability<FnCreate>,
    destroy: Capability<FnHandle>,
    set_uri: Capability<FnSetUri>,
    prepare_async: Capability<FnPrepareAsync>,
    unprepare: Capability<FnHandle>,
    start: Capability<FnHandle>,
    pause: Capability<FnHandle>,
    get_state: Capability<FnGetInt>,
    set_looping: Capability<FnSetBool>,
    set_volume: Capability<FnSetVolume>,
    set_playback_rate: Capability<FnSetRate>,
    set_play_position: Capability<FnSetPosition>,
    get_play_position: Capability<FnGetInt>,
    get_duration: Capability<FnGetInt>,
    get_video_size: Capability<FnGetSize>,
    get_display_rotation: Capability<FnGetInt>,
    set_display_mode: Capability<FnSetInt>,
    set_display_roi_area: Capability<FnSetRoi>,
    set_display_visible: Capability<FnSetBool>,
    set_buffering_cb: Capability<FnSetCb<BufferingCb>>,
    unset_buffering_cb: Capability<FnHandle>,
    set_completed_cb: Capability<FnSetCb<SimpleCb>>,
    unset_completed_cb: Capability<FnHandle>,
    set_interrupted_cb: Capability<FnSetCb<CodeCb>>,
    unset_interrupted_cb: Capability<FnHandle>,
    set_error_cb: Capability<FnSetCb<CodeCb>>,
    unset_error_cb: Capability<FnHandle>,
    set_subtitle_updated_cb: Capability<FnSetCb<SubtitleCb>>,
    unset_subtitle_updated_cb: Capability<FnHandle>,
    error_message: Capability<FnErrorMessage>,
    // Private extensions
    set_ecore_wl_display: Capability<FnSetEcoreWlDisplay>,
    set_drm_handle: Capability<FnSetDrmHandle>,
    set_drm_init_complete_cb: Capability<FnSetCb<DrmInitCompleteCb>>,
    set_drm_init_data_cb: Capability<FnSetCb<DrmInitDataCb>>,
}

impl Symbols {
    /// # Safety
    ///
    /// The aliases above must match the C API headers.
    unsafe fn resolve(library: &LibraryProxy) -> Self {
        unsafe {
            Self {
                create: library.resolve("player_create"),
                destroy: library.resolve("player_destroy"),
                set_uri: library.resolve("player_set_uri"),
                prepare_async: library.resolve("player_prepare_async"),
                unprepare: library.resolve("player_unprepare"),
                start: library.resolve("player_start"),
                pause: library.resolve("player_pause"),
                get_state: library.resolve("player_get_state"),
                set_looping: library.resolve("player_set_looping"),
                set_volume: library.resolve("player_set_volume"),
                set_playback_rate: library.resolve("player_set_playback_rate"),
                set_play_position: library.resolve("player_set_play_position"),
                get_play_position: library.resolve("player_get_play_position"),
                get_duration: library.resolve("player_get_duration"),
                get_video_size: library.resolve("player_get_video_size"),
                get_display_rotation: library.resolve("player_get_display_rotation"),
                set_display_mode: library.resolve("player_set_display_mode"),
                set_display_roi_area: library.resolve("player_set_display_roi_area"),
                set_display_visible: library.resolve("player_set_display_visible"),
                set_buffering_cb: library.resolve("player_set_buffering_cb"),
                unset_buffering_cb: library.resolve("player_unset_buffering_cb"),
                set_completed_cb: library.resolve("player_set_completed_cb"),
                unset_completed_cb: library.resolve("player_unset_completed_cb"),
                set_interrupted_cb: library.resolve("player_set_interrupted_cb"),
                unset_interrupted_cb: library.resolve("player_unset_interrupted_cb"),
                set_error_cb: library.resolve("player_set_error_cb"),
                unset_error_cb: library.resolve("player_unset_error_cb"),
                set_subtitle_updated_cb: library.resolve("player_set_subtitle_updated_cb"),
                unset_subtitle_updated_cb: library.resolve("player_unset_subtitle_updated_cb"),
                error_message: library.resolve("get_error_message"),
                set_ecore_wl_display: library.resolve("player_set_ecore_wl_display"),
                set_drm_handle: library.resolve("player_set_drm_handle"),
                set_drm_init_complete_cb: library.resolve("player_set_drm_init_complete_cb"),
                set_drm_init_data_cb: library.resolve("player_set_drm_init_data_cb"),
            }
        }
    }
}

/// Callback receiver kept at a stable heap address for the lifetime of the
/// registration.
type ListenerBox = Box<Arc<dyn PlayerListener>>;

/// [`MediaPlayerApi`] backed by the shared object.
pub struct DynamicMediaPlayer {
    symbols: Symbols,
    listeners: Mutex<HashMap<PlayerHandle, ListenerBox>>,
    // Declared last so the library outlives every resolved pointer.
    _library: LibraryProxy,
}

impl DynamicMediaPlayer {
    pub fn open(library_name: &str) -> Result<Self> {
        let library = LibraryProxy::open(library_name)?;
        // SAFETY: the signature aliases follow the player.h declarations.
        let symbols = unsafe { Symbols::resolve(&library) };
        debug!(library = library_name, "Media player entry points resolved");
        Ok(Self {
            symbols,
            listeners: Mutex::new(HashMap::new()),
            _library: library,
        })
    }

    fn user_data(&self, player: PlayerHandle) -> Result<UserData> {
        let listeners = self.listeners.lock();
        let listener = listeners.get(&player).ok_or(NativeError::InvalidArgument {
            call: "player_set_*_cb",
            message: format!("no listener bound for player {player}"),
        })?;
        Ok(&**listener as *const Arc<dyn PlayerListener> as UserData)
    }

    fn call(&self, name: &'static str, cap: &Capability<FnHandle>, player: PlayerHandle) -> Result<()> {
        let func = cap.get()?;
        // SAFETY: `player` is a live handle created by this library.
        NativeError::check(name, unsafe { func(player.as_ptr()) })
    }

    fn get_int(&self, name: &'static str, cap: &Capability<FnGetInt>, player: PlayerHandle) -> Result<i32> {
        let func = cap.get()?;
        let mut value: c_int = 0;
        // SAFETY: `value` outlives the call.
        NativeError::check(name, unsafe { func(player.as_ptr(), &mut value) })?;
        Ok(value)
    }
}

impl MediaPlayerApi for DynamicMediaPlayer {
    fn ensure_mandatory(&self) -> Result<()> {
        ensure_available(&[
            &self.symbols.set_ecore_wl_display,
            &self.symbols.set_drm_handle,
            &self.symbols.set_drm_init_complete_cb,
            &self.symbols.set_drm_init_data_cb,
        ])
    }

    fn create(&self) -> Result<PlayerHandle> {
        let func = self.symbols.create.get()?;
        let mut raw: *mut c_void = std::ptr::null_mut();
        // SAFETY: `raw` receives the new handle.
        NativeError::check("player_create", unsafe { func(&mut raw) })?;
        PlayerHandle::from_ptr(raw).ok_or(NativeError::NullHandle("player_create"))
    }

    fn destroy(&self, player: PlayerHandle) -> Result<()> {
        self.call("player_destroy", &self.symbols.destroy, player)
    }

    fn bind_listener(&self, player: PlayerHandle, listener: Arc<dyn PlayerListener>) -> Result<()> {
        self.listeners.lock().insert(player, Box::new(listener));
        Ok(())
    }

    fn release_listener(&self, player: PlayerHandle) {
        let unsets = [
            ("player_unset_buffering_cb", &self.symbols.unset_buffering_cb),
            ("player_unset_completed_cb", &self.symbols.unset_completed_cb),
            ("player_unset_interrupted_cb", &self.symbols.unset_interrupted_cb),
            ("player_unset_error_cb", &self.symbols.unset_error_cb),
            ("player_unset_subtitle_updated_cb", &self.symbols.unset_subtitle_updated_cb),
        ];
        for (name, cap) in unsets {
            if let Err(e) = self.call(name, cap, player) {
                trace!(player = %player, error = %e, "Callback unset skipped");
            }
        }
        // DRM callbacks have no unset entry point; they stop with the handle.
        if self.listeners.lock().remove(&player).is_none() {
            trace!(player = %player, "No listener bound");
        }
    }

    fn set_uri(&self, player: PlayerHandle, uri: &str) -> Result<()> {
        let func = self.symbols.set_uri.get()?;
        let uri = CString::new(uri).map_err(|e| NativeError::InvalidArgument {
            call: "player_set_uri",
            message: e.to_string(),
        })?;
        // SAFETY: the runtime copies the string before returning.
        NativeError::check("player_set_uri", unsafe { func(player.as_ptr(), uri.as_ptr()) })
    }

    fn set_ecore_wl_display(&self, player: PlayerHandle, window: WindowHandle, area: Geometry) -> Result<()> {
        let func = self.symbols.set_ecore_wl_display.get()?;
        // SAFETY: the window handle is owned by the embedder and outlives the player.
        let ret = unsafe {
            func(
                player.as_ptr(),
                PLAYER_DISPLAY_TYPE_OVERLAY,
                window.as_ptr(),
                area.x,
                area.y,
                area.width,
                area.height,
            )
        };
        NativeError::check("player_set_ecore_wl_display", ret)
    }

    fn set_display_mode(&self, player: PlayerHandle, mode: DisplayMode) -> Result<()> {
        let func = self.symbols.set_display_mode.get()?;
        // SAFETY: plain value arguments.
        NativeError::check("player_set_display_mode", unsafe { func(player.as_ptr(), mode.as_raw()) })
    }

    fn set_display_roi_area(&self, player: PlayerHandle, roi: Geometry) -> Result<()> {
        let func = self.symbols.set_display_roi_area.get()?;
        // SAFETY: plain value arguments.
        let ret = unsafe { func(player.as_ptr(), roi.x, roi.y, roi.width, roi.height) };
        NativeError::check("player_set_display_roi_area", ret)
    }

    fn set_display_visible(&self, player: PlayerHandle, visible: bool) -> Result<()> {
        let func = self.symbols.set_display_visible.get()?;
        // SAFETY: plain value arguments.
        NativeError::check("player_set_display_visible", unsafe { func(player.as_ptr(), visible) })
    }

    fn set_drm_handle(&self, player: PlayerHandle, drm_handle: i32) -> Result<()> {
        let func = self.symbols.set_drm_handle.get()?;
        // SAFETY: plain value arguments.
        let ret = unsafe { func(player.as_ptr(), PLAYER_DRM_TYPE_EME, drm_handle) };
        NativeError::check("player_set_drm_handle", ret)
    }

    fn set_drm_callbacks(&self, player: PlayerHandle) -> Result<()> {
        let user_data = self.user_data(player)?;
        let init_complete = self.symbols.set_drm_init_complete_cb.get()?;
        let init_data = self.symbols.set_drm_init_data_cb.get()?;
        // SAFETY: `user_data` points into a box kept until `release_listener`,
        // which runs before the handle is destroyed.
        unsafe {
            NativeError::check(
                "player_set_drm_init_complete_cb",
                init_complete(player.as_ptr(), Some(on_drm_init_complete), user_data),
            )?;
            NativeError::check(
                "player_set_drm_init_data_cb",
                init_data(player.as_ptr(), Some(on_drm_init_data), user_data),
            )
        }
    }

    fn set_event_callbacks(&self, player: PlayerHandle) -> Result<()> {
        let user_data = self.user_data(player)?;
        let p = player.as_ptr();
        // SAFETY: see `set_drm_callbacks`.
        unsafe {
            NativeError::check(
                "player_set_buffering_cb",
                self.symbols.set_buffering_cb.get()?(p, Some(on_buffering), user_data),
            )?;
            NativeError::check(
                "player_set_completed_cb",
                self.symbols.set_completed_cb.get()?(p, Some(on_completed), user_data),
            )?;
            NativeError::check(
                "player_set_interrupted_cb",
                self.symbols.set_interrupted_cb.get()?(p, Some(on_interrupted), user_data),
            )?;
            NativeError::check(
                "player_set_error_cb",
                self.symbols.set_error_cb.get()?(p, Some(on_error), user_data),
            )?;
            NativeError::check(
                "player_set_subtitle_updated_cb",
                self.symbols.set_subtitle_updated_cb.get()?(p, Some(on_subtitle_updated), user_data),
            )
        }
    }

    fn prepare_async(&self, player: PlayerHandle) -> Result<()> {
        let user_data = self.user_data(player)?;
        let func = self.symbols.prepare_async.get()?;
        // SAFETY: see `set_drm_callbacks`.
        let ret = unsafe { func(player.as_ptr(), Some(on_prepared), user_data) };
        NativeError::check("player_prepare_async", ret)
    }

    fn unprepare(&self, player: PlayerHandle) -> Result<()> {
        self.call("player_unprepare", &self.symbols.unprepare, player)
    }

    fn start(&self, player: PlayerHandle) -> Result<()> {
        self.call("player_start", &self.symbols.start, player)
    }

    fn pause(&self, player: PlayerHandle) -> Result<()> {
        self.call("player_pause", &self.symbols.pause, player)
    }

    fn state(&self, player: PlayerHandle) -> Result<MediaPlayerState> {
        self.get_int("player_get_state", &self.symbols.get_state, player)
            .map(MediaPlayerState::from_raw)
    }

    fn set_looping(&self, player: PlayerHandle, looping: bool) -> Result<()> {
        let func = self.symbols.set_looping.get()?;
        // SAFETY: plain value arguments.
        NativeError::check("player_set_looping", unsafe { func(player.as_ptr(), looping) })
    }

    fn set_volume(&self, player: PlayerHandle, left: f32, right: f32) -> Result<()> {
        let func = self.symbols.set_volume.get()?;
        // SAFETY: plain value arguments.
        NativeError::check("player_set_volume", unsafe { func(player.as_ptr(), left, right) })
    }

    fn set_playback_rate(&self, player: PlayerHandle, rate: f32) -> Result<()> {
        let func = self.symbols.set_playback_rate.get()?;
        // SAFETY: plain value arguments.
        NativeError::check("player_set_playback_rate", unsafe { func(player.as_ptr(), rate) })
    }

    fn seek(&self, player: PlayerHandle, position_ms: i32) -> Result<()> {
        let user_data = self.user_data(player)?;
        let func = self.symbols.set_play_position.get()?;
        // SAFETY: see `set_drm_callbacks`.
        let ret = unsafe { func(player.as_ptr(), position_ms, true, Some(on_seek_completed), user_data) };
        NativeError::check("player_set_play_position", ret)
    }

    fn play_position(&self, player: PlayerHandle) -> Result<i32> {
        self.get_int("player_get_play_position", &self.symbols.get_play_position, player)
    }

    fn duration(&self, player: PlayerHandle) -> Result<i32> {
        self.get_int("player_get_duration", &self.symbols.get_duration, player)
    }

    fn video_size(&self, player: PlayerHandle) -> Result<VideoSize> {
        let func = self.symbols.get_video_size.get()?;
        let (mut width, mut height): (c_int, c_int) = (0, 0);
        // SAFETY: both out-pointers outlive the call.
        let ret = unsafe { func(player.as_ptr(), &mut width, &mut height) };
        NativeError::check("player_get_video_size", ret)?;
        Ok(VideoSize::new(width, height))
    }

    fn display_rotation(&self, player: PlayerHandle) -> Result<DisplayRotation> {
        self.get_int("player_get_display_rotation", &self.symbols.get_display_rotation, player)
            .map(DisplayRotation::from_raw)
    }

    fn error_message(&self, code: i32) -> String {
        let Ok(func) = self.symbols.error_message.get() else {
            return format!("error {code:#x}");
        };
        // SAFETY: the returned string is static storage owned by the platform.
        let text = unsafe { func(code) };
        if text.is_null() {
            return format!("error {code:#x}");
        }
        // SAFETY: non-null, NUL-terminated.
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }
}

impl Drop for DynamicMediaPlayer {
    fn drop(&mut self) {
        let leaked = self.listeners.get_mut().len();
        if leaked > 0 {
            warn!(count = leaked, "Media player API dropped with listeners still bound");
        }
    }
}

// ============================================================================
// Trampolines
// ============================================================================

/// # Safety
///
/// `user_data` must be the pointer produced by `DynamicMediaPlayer::user_data`.
unsafe fn receiver<'a>(user_data: UserData) -> Option<&'a Arc<dyn PlayerListener>> {
    // SAFETY: guaranteed by the caller.
    unsafe { (user_data as *const Arc<dyn PlayerListener>).as_ref() }
}

/// # Safety
///
/// `data` must be null or valid for `len` bytes.
pub(crate) unsafe fn bytes<'a>(data: *const u8, len: usize) -> &'a [u8] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: guaranteed by the caller.
        unsafe { std::slice::from_raw_parts(data, len) }
    }
}

unsafe extern "C" fn on_prepared(user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_prepared(true);
    }
}

unsafe extern "C" fn on_buffering(percent: c_int, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_buffering(percent);
    }
}

unsafe extern "C" fn on_seek_completed(user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_seek_completed();
    }
}

unsafe extern "C" fn on_completed(user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_completed();
    }
}

unsafe extern "C" fn on_interrupted(code: c_int, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_interrupted(code);
    }
}

unsafe extern "C" fn on_error(code: c_int, user_data: UserData) {
    if let Some(listener) = unsafe { receiver(user_data) } {
        listener.on_error(code, None);
    }
}

unsafe extern "C" fn on_subtitle_updated(duration: c_ulong, text: *mut c_char, user_data: UserData) {
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return;
    };
    let text = if text.is_null() {
        String::new()
    } else {
        // SAFETY: the runtime passes a NUL-terminated string valid for the call.
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    };
    listener.on_subtitle_updated(u64::from(duration), text);
}

unsafe extern "C" fn on_drm_init_complete(
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

unsafe extern "C" fn on_drm_init_data(
    _init_type: c_int,
    data: *mut c_void,
    len: c_int,
    user_data: UserData,
) -> c_int {
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return 0;
    };
    let data = unsafe { bytes(data as *const u8, usize::try_from(len).unwrap_or(0)) };
    listener.on_drm_update_pssh(data)
}
