#![allow(unsafe_code)]

//! DRM manager runtime (`libdrmmanager`).
//!
//! Sessions are configured through string-keyed `DMGRSetData` calls. The
//! callbacks registered on a session point at a heap-resident
//! [`DrmEventListener`], and the parameter block handed to
//! `DMGRSecurityInitCompleteCB` stays allocated for the whole session because
//! the runtime keeps referring to it across invocations.

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_long, c_uchar, c_uint, c_void, CStr, CString};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::error::{NativeError, Result};
use crate::listener::DrmEventListener;
use crate::media_player::bytes;
use crate::proxy::{ensure_available, Capability, LibraryProxy};
use crate::types::{DrmSessionHandle, PlayerHandle, SessionRef};

/// Default soname of the DRM manager runtime.
pub const DRM_LIBRARY: &str = "libdrmmanager.so.0";

const DM_TYPE_EME: c_int = 11;
const DM_ERROR_NONE: c_int = 0;
const DM_ERROR_INTERNAL_ERROR: c_int = -0x01a1_0002;

const KEY_ERROR_EVENT_CALLBACK: &[u8] = b"error_event_callback\0";
const KEY_EME_REQUEST_KEY_CALLBACK: &[u8] = b"eme_request_key_callback\0";
const KEY_SET_PLAYREADY_MANIFEST: &[u8] = b"set_playready_manifest\0";
const KEY_INITIALIZE: &[u8] = b"Initialize\0";
const KEY_FINALIZE: &[u8] = b"Finalize\0";
const KEY_UPDATE_PSSH_DATA: &[u8] = b"update_pssh_data\0";
const KEY_INSTALL_EME_KEY: &[u8] = b"install_eme_key\0";
const KEY_DRM_HANDLE: &[u8] = b"drm_handle\0";

/// Operations on DRM manager sessions.
pub trait DrmApi: Send + Sync {
    /// Switch the runtime to in-process (local) mode.
    fn set_local_mode(&self) -> Result<()>;

    /// Create an EME session for a key system such as `com.widevine.alpha`.
    fn create_session(&self, sub_type: &str) -> Result<DrmSessionHandle>;

    /// Install the receiver and register the runtime error callback.
    fn register_listener(&self, session: DrmSessionHandle, listener: Arc<dyn DrmEventListener>) -> Result<()>;

    /// Route license challenges to the registered receiver.
    fn enable_challenge(&self, session: DrmSessionHandle) -> Result<()>;

    fn set_manifest(&self, session: DrmSessionHandle, url: &str) -> Result<()>;
    fn initialize(&self, session: DrmSessionHandle) -> Result<()>;
    fn finalize(&self, session: DrmSessionHandle) -> Result<()>;

    /// Handle the player uses to reference this session.
    fn drm_handle(&self, session: DrmSessionHandle) -> Result<i32>;

    fn update_pssh_data(&self, session: DrmSessionHandle, data: &[u8]) -> Result<()>;

    /// Install a license response for the challenge tagged `session_ref`.
    fn install_key(&self, session: DrmSessionHandle, session_ref: SessionRef, response: &[u8]) -> Result<()>;

    /// Relay security initialization to the runtime.
    ///
    /// `player` is passed as correlation data when the completion belongs to
    /// a specific player instance.
    fn security_init_complete(
        &self,
        session: DrmSessionHandle,
        drm_handle: &mut i32,
        pssh: &[u8],
        player: Option<PlayerHandle>,
    ) -> bool;

    /// Release the session and drop its receiver.
    fn release_session(&self, session: DrmSessionHandle) -> Result<()>;
}

type UserData = *mut c_void;

#[repr(C)]
struct SetDataParam {
    param1: *mut c_void,
    param2: *mut c_void,
    param3: *mut c_void,
}

impl SetDataParam {
    fn new(param1: *mut c_void, param2: *mut c_void) -> Self {
        Self {
            param1,
            param2,
            param3: std::ptr::null_mut(),
        }
    }
}

type ChallengeCb = unsafe extern "C" fn(*mut c_void, c_int, *mut c_void, c_int, UserData) -> c_int;
type ErrorCb = unsafe extern "C" fn(c_long, *mut c_char, UserData);

type FnSetLocalMode = unsafe extern "C" fn();
type FnCreateSession = unsafe extern "C" fn(c_int, *const c_char) -> *mut c_void;
type FnSetData = unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_void) -> c_int;
type FnGetData = unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_void) -> c_int;
type FnSecurityInitComplete = unsafe extern "C" fn(*mut c_int, c_uint, *mut c_uchar, *mut c_void) -> bool;
type FnReleaseSession = unsafe extern "C" fn(*mut c_void) -> c_int;

struct Symbols {
    set_local_mode: Capability<FnSetLocalMode>,
    create_session: Capability<FnCreateSession>,
    set_data: Capability<FnSetData>,
    get_data: Capability<FnGetData>,
    security_init_complete: Capability<FnSecurityInitComplete>,
    release_session: Capability<FnReleaseSession>,
}

/// Per-session heap state.
struct SessionSlot {
    listener: Option<Box<Arc<dyn DrmEventListener>>>,
    security_param: Box<SetDataParam>,
    manifest: Option<CString>,
}

// SAFETY: the raw pointers in `security_param` are opaque correlation values
// that are only dereferenced by the runtime.
unsafe impl Send for SessionSlot {}

impl SessionSlot {
    fn new() -> Self {
        Self {
            listener: None,
            security_param: Box::new(SetDataParam::new(std::ptr::null_mut(), std::ptr::null_mut())),
            manifest: None,
        }
    }

    fn user_data(&self) -> Option<UserData> {
        self.listener
            .as_ref()
            .map(|listener| &**listener as *const Arc<dyn DrmEventListener> as UserData)
    }
}

/// [`DrmApi`] backed by the DRM manager shared object.
pub struct DynamicDrm {
    symbols: Symbols,
    sessions: Mutex<HashMap<DrmSessionHandle, SessionSlot>>,
    _library: LibraryProxy,
}

impl DynamicDrm {
    pub fn open(library_name: &str) -> Result<Self> {
        let library = LibraryProxy::open(library_name)?;
        // SAFETY: the aliases follow drm_manager_proxy.h.
        let symbols = unsafe {
            Symbols {
                set_local_mode: library.resolve("DMGRSetDRMLocalMode"),
                create_session: library.resolve("DMGRCreateDRMSession"),
                set_data: library.resolve("DMGRSetData"),
                get_data: library.resolve("DMGRGetData"),
                security_init_complete: library.resolve("DMGRSecurityInitCompleteCB"),
                release_session: library.resolve("DMGRReleaseDRMSession"),
            }
        };
        ensure_available(&[
            &symbols.create_session,
            &symbols.set_data,
            &symbols.get_data,
            &symbols.security_init_complete,
            &symbols.release_session,
        ])?;
        info!(library = library_name, "DRM manager runtime ready");
        Ok(Self {
            symbols,
            sessions: Mutex::new(HashMap::new()),
            _library: library,
        })
    }

    fn set_data(&self, session: DrmSessionHandle, key: &'static [u8], value: *mut c_void) -> Result<()> {
        let func = self.symbols.set_data.get()?;
        // SAFETY: keys are NUL-terminated literals; `value` is valid for the call.
        let ret = unsafe { func(session.as_ptr(), key.as_ptr() as *const c_char, value) };
        NativeError::check(key_name(key), ret)
    }

    fn listener_data(&self, session: DrmSessionHandle, call: &'static str) -> Result<UserData> {
        self.sessions
            .lock()
            .get(&session)
            .and_then(SessionSlot::user_data)
            .ok_or_else(|| NativeError::InvalidArgument {
                call,
                message: format!("no listener registered for session {session}"),
            })
    }
}

fn key_name(key: &'static [u8]) -> &'static str {
    std::str::from_utf8(&key[..key.len().saturating_sub(1)]).unwrap_or("DMGRSetData")
}

impl DrmApi for DynamicDrm {
    fn set_local_mode(&self) -> Result<()> {
        let func = self.symbols.set_local_mode.get()?;
        // SAFETY: no arguments.
        unsafe { func() };
        Ok(())
    }

    fn create_session(&self, sub_type: &str) -> Result<DrmSessionHandle> {
        let func = self.symbols.create_session.get()?;
        let sub_type = CString::new(sub_type).map_err(|e| NativeError::InvalidArgument {
            call: "DMGRCreateDRMSession",
            message: e.to_string(),
        })?;
        // SAFETY: the runtime copies the sub type.
        let raw = unsafe { func(DM_TYPE_EME, sub_type.as_ptr()) };
        let session = DrmSessionHandle::from_ptr(raw).ok_or(NativeError::NullHandle("DMGRCreateDRMSession"))?;
        self.sessions.lock().insert(session, SessionSlot::new());
        debug!(session = %session, "DRM session created");
        Ok(session)
    }

    fn register_listener(&self, session: DrmSessionHandle, listener: Arc<dyn DrmEventListener>) -> Result<()> {
        let user_data = {
            let mut sessions = self.sessions.lock();
            let slot = sessions.entry(session).or_insert_with(SessionSlot::new);
            slot.listener = Some(Box::new(listener));
            slot.user_data()
        };
        let mut param = SetDataParam::new(on_error as ErrorCb as *mut c_void, user_data.unwrap_or(std::ptr::null_mut()));
        self.set_data(session, KEY_ERROR_EVENT_CALLBACK, &mut param as *mut SetDataParam as *mut c_void)
    }

    fn enable_challenge(&self, session: DrmSessionHandle) -> Result<()> {
        let user_data = self.listener_data(session, "eme_request_key_callback")?;
        let mut param = SetDataParam::new(on_challenge as ChallengeCb as *mut c_void, user_data);
        self.set_data(session, KEY_EME_REQUEST_KEY_CALLBACK, &mut param as *mut SetDataParam as *mut c_void)
    }

    fn set_manifest(&self, session: DrmSessionHandle, url: &str) -> Result<()> {
        let url = CString::new(url).map_err(|e| NativeError::InvalidArgument {
            call: "set_playready_manifest",
            message: e.to_string(),
        })?;
        let ptr = url.as_ptr() as *mut c_void;
        if let Some(slot) = self.sessions.lock().get_mut(&session) {
            // Moving the CString keeps its heap buffer, so `ptr` stays valid.
            slot.manifest = Some(url);
        }
        self.set_data(session, KEY_SET_PLAYREADY_MANIFEST, ptr)
    }

    fn initialize(&self, session: DrmSessionHandle) -> Result<()> {
        self.set_data(session, KEY_INITIALIZE, std::ptr::null_mut())
    }

    fn finalize(&self, session: DrmSessionHandle) -> Result<()> {
        self.set_data(session, KEY_FINALIZE, std::ptr::null_mut())
    }

    fn drm_handle(&self, session: DrmSessionHandle) -> Result<i32> {
        let func = self.symbols.get_data.get()?;
        let mut handle: c_int = 0;
        // SAFETY: `handle` outlives the call.
        let ret = unsafe {
            func(
                session.as_ptr(),
                KEY_DRM_HANDLE.as_ptr() as *const c_char,
                &mut handle as *mut c_int as *mut c_void,
            )
        };
        NativeError::check("drm_handle", ret)?;
        Ok(handle)
    }

    fn update_pssh_data(&self, session: DrmSessionHandle, data: &[u8]) -> Result<()> {
        let mut param = SetDataParam::new(data.as_ptr() as *mut c_void, data.len() as *mut c_void);
        self.set_data(session, KEY_UPDATE_PSSH_DATA, &mut param as *mut SetDataParam as *mut c_void)
    }

    fn install_key(&self, session: DrmSessionHandle, session_ref: SessionRef, response: &[u8]) -> Result<()> {
        let mut param = SetDataParam {
            param1: session_ref.as_ptr(),
            param2: response.as_ptr() as *mut c_void,
            param3: response.len() as *mut c_void,
        };
        self.set_data(session, KEY_INSTALL_EME_KEY, &mut param as *mut SetDataParam as *mut c_void)
    }

    fn security_init_complete(
        &self,
        session: DrmSessionHandle,
        drm_handle: &mut i32,
        pssh: &[u8],
        player: Option<PlayerHandle>,
    ) -> bool {
        let Ok(func) = self.symbols.security_init_complete.get() else {
            return false;
        };
        let param: *mut SetDataParam = {
            let mut sessions = self.sessions.lock();
            let Some(slot) = sessions.get_mut(&session) else {
                trace!(session = %session, "Security init for unknown session");
                return false;
            };
            slot.security_param.param1 = player.map_or(std::ptr::null_mut(), |p| p.as_ptr());
            slot.security_param.param2 = session.as_ptr();
            let stored: *mut SetDataParam = &mut *slot.security_param;
            stored
        };
        let Ok(len) = c_uint::try_from(pssh.len()) else {
            return false;
        };
        // SAFETY: `param` stays allocated until `release_session`; the runtime
        // only reads the pssh buffer.
        unsafe { func(drm_handle, len, pssh.as_ptr() as *mut c_uchar, param as *mut c_void) }
    }

    fn release_session(&self, session: DrmSessionHandle) -> Result<()> {
        let func = self.symbols.release_session.get()?;
        // SAFETY: `session` was created by this runtime and is not used again.
        let ret = unsafe { func(session.as_ptr()) };
        // The slot goes regardless; the native handle is unusable either way.
        self.sessions.lock().remove(&session);
        NativeError::check("DMGRReleaseDRMSession", ret)
    }
}

// ============================================================================
// Trampolines
// ============================================================================

unsafe fn receiver<'a>(user_data: UserData) -> Option<&'a Arc<dyn DrmEventListener>> {
    // SAFETY: `user_data` comes from `SessionSlot::user_data`.
    unsafe { (user_data as *const Arc<dyn DrmEventListener>).as_ref() }
}

unsafe extern "C" fn on_challenge(
    session_id: *mut c_void,
    _message_type: c_int,
    message: *mut c_void,
    message_length: c_int,
    user_data: UserData,
) -> c_int {
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return DM_ERROR_INTERNAL_ERROR;
    };
    let message = unsafe { bytes(message as *const u8, usize::try_from(message_length).unwrap_or(0)) };
    if listener.on_challenge(SessionRef::from_ptr(session_id), message) {
        DM_ERROR_NONE
    } else {
        DM_ERROR_INTERNAL_ERROR
    }
}

unsafe extern "C" fn on_error(code: c_long, message: *mut c_char, user_data: UserData) {
    let Some(listener) = (unsafe { receiver(user_data) }) else {
        return;
    };
    let message = if message.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
    };
    listener.on_error(i64::from(code), &message);
}
