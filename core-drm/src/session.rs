//! DRM session lifecycle and license challenge handling.
//!
//! ```text
//! Uninitialized ──create_session──> SessionCreated ──set_challenge──> ChallengeIssued
//!                                                                          │ initialize
//!                     Released <──release── Finalized <──release── Initialized
//! ```
//!
//! Challenges arrive on a native runtime thread while the runtime holds its
//! own lock. The response is resolved on that thread, but installing the key
//! re-enters the runtime, so it is always queued on the host idle loop and
//! performed after the challenge callback has returned.

use std::fmt;
use std::sync::{Arc, Weak};

use bridge_traits::error::BridgeError;
use bridge_traits::license::{DrmType, LicenseRequest, LicenseTransport};
use bridge_traits::scheduler::{IdleScheduler, IdleSourceId};
use bytes::Bytes;
use core_native::drm::DrmApi;
use core_native::listener::DrmEventListener;
use core_native::loader::NativeLoader;
use core_native::types::{DrmSessionHandle, PlayerHandle, SessionRef};
use core_native::NativeError;
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DrmError, Result};

pub const PLAYREADY_KEY_SYSTEM: &str = "com.microsoft.playready";
pub const WIDEVINE_KEY_SYSTEM: &str = "com.widevine.alpha";

/// Key system string used when creating a session for `drm_type`.
pub fn key_system(drm_type: DrmType) -> &'static str {
    match drm_type {
        DrmType::PlayReady => PLAYREADY_KEY_SYSTEM,
        _ => WIDEVINE_KEY_SYSTEM,
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    SessionCreated,
    ChallengeIssued,
    Initialized,
    Finalized,
    Released,
}

/// Answers license challenges from outside the core, typically by asking
/// the application through the cross-context bridge.
pub trait ChallengeCallback: Send + Sync {
    fn respond(&self, challenge: &[u8]) -> std::result::Result<Bytes, BridgeError>;
}

/// Where license responses come from.
#[derive(Clone)]
pub enum ChallengeSource {
    /// POST challenges to this server through the [`LicenseTransport`].
    LicenseServer(String),
    Callback(Arc<dyn ChallengeCallback>),
}

impl fmt::Debug for ChallengeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeSource::LicenseServer(url) => f.debug_tuple("LicenseServer").field(&redact_url(url)).finish(),
            ChallengeSource::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Default)]
struct Routing {
    license_server_url: Option<String>,
    callback: Option<Arc<dyn ChallengeCallback>>,
}

/// A license response waiting for the idle loop.
struct PendingKey {
    session_ref: SessionRef,
    response: Bytes,
}

/// Single-slot deferred installer: at most one idle task is outstanding and
/// it installs every key queued before it runs.
#[derive(Default)]
struct Installer {
    pending: Vec<PendingKey>,
    task: Option<IdleSourceId>,
    /// Set by `release`; responses resolved afterwards are refused.
    released: bool,
}

struct Inner {
    loader: Arc<dyn NativeLoader>,
    scheduler: Arc<dyn IdleScheduler>,
    transport: Option<Arc<dyn LicenseTransport>>,
    runtime: Mutex<Option<Arc<dyn DrmApi>>>,
    drm_type: Mutex<DrmType>,
    session: Mutex<Option<DrmSessionHandle>>,
    state: Mutex<SessionState>,
    routing: Mutex<Routing>,
    installer: Mutex<Installer>,
}

impl Inner {
    fn runtime(&self) -> Result<Arc<dyn DrmApi>> {
        let mut runtime = self.runtime.lock();
        if let Some(api) = runtime.as_ref() {
            return Ok(Arc::clone(api));
        }
        let api = self.loader.open_drm_runtime().map_err(DrmError::RuntimeUnavailable)?;
        *runtime = Some(Arc::clone(&api));
        Ok(api)
    }

    /// Runtime and session, if a session exists.
    fn active(&self) -> Result<(Arc<dyn DrmApi>, DrmSessionHandle)> {
        let session = (*self.session.lock()).ok_or(DrmError::NoSession)?;
        let api = self.runtime.lock().clone().ok_or(DrmError::NoSession)?;
        Ok((api, session))
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!(from = ?*current, to = ?state, "DRM session state");
            *current = state;
        }
    }

    fn resolve_response(&self, challenge: &[u8]) -> Result<Bytes> {
        let (url, callback) = {
            let routing = self.routing.lock();
            (routing.license_server_url.clone(), routing.callback.clone())
        };

        let response = match (url.filter(|u| !u.is_empty()), callback) {
            (Some(server_url), _) => {
                let transport = self.transport.as_ref().ok_or_else(|| {
                    DrmError::License(BridgeError::NotAvailable("license transport".to_string()))
                })?;
                let request = LicenseRequest {
                    server_url,
                    drm_type: *self.drm_type.lock(),
                    challenge: Bytes::copy_from_slice(challenge),
                };
                transport.acquire_license(&request).map_err(DrmError::License)?
            }
            (None, Some(callback)) => callback.respond(challenge).map_err(DrmError::License)?,
            (None, None) => return Err(DrmError::NoResponseSource),
        };

        if response.is_empty() {
            return Err(DrmError::EmptyLicense);
        }
        Ok(response)
    }

    fn handle_challenge(self: &Arc<Self>, session_ref: SessionRef, challenge: &[u8]) -> Result<()> {
        let response = self.resolve_response(challenge)?;
        info!(len = response.len(), "License response received");
        self.queue_install(PendingKey { session_ref, response })
    }

    fn queue_install(self: &Arc<Self>, key: PendingKey) -> Result<()> {
        let mut installer = self.installer.lock();
        if installer.released {
            warn!(len = key.response.len(), "License response arrived after release");
            return Err(DrmError::NoSession);
        }
        installer.pending.push(key);
        if installer.task.is_some() {
            debug!(pending = installer.pending.len(), "Key added to pending install");
            return Ok(());
        }

        // The host loop never runs a task inline, so scheduling under the
        // lock cannot re-enter `install_pending`.
        let weak: Weak<Inner> = Arc::downgrade(self);
        let scheduled = self.scheduler.schedule_idle(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.install_pending();
            }
        }));
        match scheduled {
            Ok(id) => {
                debug!(task = %id, "Key install deferred to idle loop");
                installer.task = Some(id);
                Ok(())
            }
            Err(e) => {
                installer.pending.clear();
                Err(DrmError::Scheduling(e))
            }
        }
    }

    fn install_pending(&self) {
        let batch = {
            let mut installer = self.installer.lock();
            installer.task = None;
            std::mem::take(&mut installer.pending)
        };
        let (api, session) = match self.active() {
            Ok(active) => active,
            Err(_) => {
                warn!(dropped = batch.len(), "Session gone before key install");
                return;
            }
        };
        for key in batch {
            match api.install_key(session, key.session_ref, &key.response) {
                Ok(()) => info!(len = key.response.len(), "License key installed"),
                Err(e) => error!(error = %e, "Failed to install license key"),
            }
        }
    }
}

/// Receiver registered with the native runtime.
///
/// Holds a weak reference: the runtime keeps the receiver until the session
/// is released, which must not keep the manager alive.
struct SessionListener {
    inner: Weak<Inner>,
}

impl DrmEventListener for SessionListener {
    fn on_challenge(&self, session_ref: SessionRef, message: &[u8]) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        match inner.handle_challenge(session_ref, message) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "License challenge failed");
                false
            }
        }
    }

    fn on_error(&self, code: i64, message: &str) {
        error!(code, message, "DRM runtime error");
    }
}

/// Owns one native DRM session.
///
/// Must be released after the player that uses the session has been
/// destroyed.
pub struct DrmSessionManager {
    inner: Arc<Inner>,
}

impl DrmSessionManager {
    pub fn new(
        loader: Arc<dyn NativeLoader>,
        scheduler: Arc<dyn IdleScheduler>,
        transport: Option<Arc<dyn LicenseTransport>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                scheduler,
                transport,
                runtime: Mutex::new(None),
                drm_type: Mutex::new(DrmType::None),
                session: Mutex::new(None),
                state: Mutex::new(SessionState::Uninitialized),
                routing: Mutex::new(Routing::default()),
                installer: Mutex::new(Installer::default()),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn has_session(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Open the runtime if needed and create a session for `drm_type`.
    #[instrument(skip(self))]
    pub fn create_session(&self, drm_type: DrmType, local_mode: bool) -> Result<()> {
        if self.has_session() {
            return Err(DrmError::SessionCreation(NativeError::Rejected("DMGRCreateDRMSession")));
        }
        let api = self.inner.runtime()?;

        if local_mode {
            if let Err(e) = api.set_local_mode() {
                warn!(error = %e, "Local DRM mode unavailable");
            }
        }

        let session = api
            .create_session(key_system(drm_type))
            .map_err(DrmError::SessionCreation)?;

        let listener = Arc::new(SessionListener {
            inner: Arc::downgrade(&self.inner),
        });
        if let Err(e) = api.register_listener(session, listener) {
            if let Err(release) = api.release_session(session) {
                warn!(error = %release, "Failed to release session after setup error");
            }
            return Err(DrmError::SessionCreation(e));
        }

        *self.inner.drm_type.lock() = drm_type;
        *self.inner.session.lock() = Some(session);
        self.inner.installer.lock().released = false;
        self.inner.set_state(SessionState::SessionCreated);
        info!(session = %session, key_system = key_system(drm_type), "DRM session created");
        Ok(())
    }

    /// Answer challenges by posting them to `license_server_url`.
    pub fn set_challenge_with_license_server(&self, media_url: &str, license_server_url: &str) -> Result<()> {
        self.set_challenge(media_url, ChallengeSource::LicenseServer(license_server_url.to_string()))
    }

    /// Answer challenges through an external callback.
    pub fn set_challenge_with_callback(&self, media_url: &str, callback: Arc<dyn ChallengeCallback>) -> Result<()> {
        self.set_challenge(media_url, ChallengeSource::Callback(callback))
    }

    /// Configure the response source, set the manifest and initialize.
    ///
    /// A non-empty license server URL takes precedence over a callback when
    /// both have been configured. An initialization failure leaves the
    /// session in place for the caller to release.
    pub fn set_challenge(&self, media_url: &str, source: ChallengeSource) -> Result<()> {
        let (api, session) = self.inner.active()?;
        info!(manifest = %redact_url(media_url), ?source, "Configuring license challenge");

        {
            let mut routing = self.inner.routing.lock();
            match source {
                ChallengeSource::LicenseServer(url) => routing.license_server_url = Some(url),
                ChallengeSource::Callback(callback) => routing.callback = Some(callback),
            }
        }

        api.enable_challenge(session)?;
        api.set_manifest(session, media_url).map_err(DrmError::Initialization)?;
        self.inner.set_state(SessionState::ChallengeIssued);

        api.initialize(session).map_err(DrmError::Initialization)?;
        // Challenges run inside `initialize`; the session may have been
        // released meanwhile.
        if self.has_session() {
            self.inner.set_state(SessionState::Initialized);
        }
        Ok(())
    }

    pub fn drm_handle(&self) -> Result<i32> {
        let (api, session) = self.inner.active()?;
        Ok(api.drm_handle(session)?)
    }

    pub fn update_pssh_data(&self, data: &[u8]) -> Result<()> {
        let (api, session) = self.inner.active()?;
        Ok(api.update_pssh_data(session, data)?)
    }

    /// Relay security initialization; `player` is the correlation handle.
    pub fn security_init_complete(&self, drm_handle: &mut i32, pssh: &[u8], player: Option<PlayerHandle>) -> bool {
        match self.inner.active() {
            Ok((api, session)) => api.security_init_complete(session, drm_handle, pssh, player),
            Err(_) => false,
        }
    }

    /// Number of license responses waiting for the idle loop.
    pub fn pending_installs(&self) -> usize {
        self.inner.installer.lock().pending.len()
    }

    /// Finalize and release the session. Safe to call repeatedly.
    ///
    /// Failures are logged; the session handle is dropped either way.
    #[instrument(skip(self))]
    pub fn release(&self) {
        {
            let mut installer = self.inner.installer.lock();
            installer.released = true;
            if let Some(task) = installer.task.take() {
                self.inner.scheduler.cancel(task);
            }
            installer.pending.clear();
        }

        let Some(session) = self.inner.session.lock().take() else {
            return;
        };
        let Some(api) = self.inner.runtime.lock().clone() else {
            return;
        };

        if self.state() == SessionState::Initialized {
            if let Err(e) = api.finalize(session) {
                warn!(error = %e, "Failed to finalize DRM session");
            }
            self.inner.set_state(SessionState::Finalized);
        }
        if let Err(e) = api.release_session(session) {
            warn!(error = %e, "Failed to release DRM session");
        }
        self.inner.set_state(SessionState::Released);
        info!(session = %session, "DRM session released");
    }
}

impl Drop for DrmSessionManager {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for DrmSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrmSessionManager")
            .field("state", &self.state())
            .field("session", &*self.inner.session.lock())
            .field("pending_installs", &self.pending_installs())
            .finish()
    }
}
