//! Session manager against an in-process DRM runtime.
//!
//! The fake runtime calls the registered challenge receiver from inside
//! `initialize`, the way the local-mode runtime does, and records whether a
//! key install ever happens while it is still inside that call.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use bridge_traits::error::BridgeError;
use bridge_traits::license::{DrmType, LicenseRequest, LicenseTransport};
use bridge_traits::scheduler::QueuedIdleScheduler;
use bytes::Bytes;
use core_drm::{ChallengeCallback, DrmError, DrmSessionManager, SessionState};
use core_native::drm::DrmApi;
use core_native::listener::DrmEventListener;
use core_native::loader::NativeLoader;
use core_native::media_player::MediaPlayerApi;
use core_native::plus_player::PlusPlayerApi;
use core_native::types::{DrmSessionHandle, PlayerHandle, SessionRef};
use core_native::NativeError;
use mockall::mock;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DrmCall {
    LocalMode,
    Create(String),
    RegisterListener,
    EnableChallenge,
    Manifest(String),
    Initialize,
    Finalize,
    UpdatePssh(Vec<u8>),
    InstallKey { session_ref: usize, len: usize, nested: bool },
    SecurityInit { player: Option<usize> },
    Release,
}

#[derive(Default)]
struct FakeDrm {
    calls: Mutex<Vec<DrmCall>>,
    listener: Mutex<Option<Arc<dyn DrmEventListener>>>,
    /// Challenges the runtime issues while initializing.
    challenges: Mutex<Vec<(SessionRef, Vec<u8>)>>,
    challenge_results: Mutex<Vec<bool>>,
    in_native_call: AtomicBool,
    fail_register: AtomicBool,
    fail_initialize: AtomicBool,
}

impl FakeDrm {
    fn calls(&self) -> Vec<DrmCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: DrmCall) {
        self.calls.lock().push(call);
    }

    fn installs(&self) -> Vec<DrmCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, DrmCall::InstallKey { .. }))
            .collect()
    }

    fn count(&self, wanted: &DrmCall) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    fn issue_challenge(&self, session_ref: usize, message: &[u8]) {
        self.challenges.lock().push((SessionRef(session_ref), message.to_vec()));
    }
}

impl DrmApi for FakeDrm {
    fn set_local_mode(&self) -> core_native::Result<()> {
        self.record(DrmCall::LocalMode);
        Ok(())
    }

    fn create_session(&self, sub_type: &str) -> core_native::Result<DrmSessionHandle> {
        self.record(DrmCall::Create(sub_type.to_string()));
        DrmSessionHandle::from_raw(0x5e55).ok_or(NativeError::NullHandle("DMGRCreateDRMSession"))
    }

    fn register_listener(&self, _session: DrmSessionHandle, listener: Arc<dyn DrmEventListener>) -> core_native::Result<()> {
        self.record(DrmCall::RegisterListener);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(NativeError::CallFailed {
                call: "error_event_callback",
                code: -1,
            });
        }
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn enable_challenge(&self, _session: DrmSessionHandle) -> core_native::Result<()> {
        self.record(DrmCall::EnableChallenge);
        Ok(())
    }

    fn set_manifest(&self, _session: DrmSessionHandle, url: &str) -> core_native::Result<()> {
        self.record(DrmCall::Manifest(url.to_string()));
        Ok(())
    }

    fn initialize(&self, _session: DrmSessionHandle) -> core_native::Result<()> {
        self.record(DrmCall::Initialize);
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(NativeError::CallFailed { call: "Initialize", code: -2 });
        }
        let listener = self.listener.lock().clone();
        let challenges: Vec<_> = self.challenges.lock().drain(..).collect();
        self.in_native_call.store(true, Ordering::SeqCst);
        for (session_ref, message) in challenges {
            if let Some(listener) = &listener {
                let accepted = listener.on_challenge(session_ref, &message);
                self.challenge_results.lock().push(accepted);
            }
        }
        self.in_native_call.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&self, _session: DrmSessionHandle) -> core_native::Result<()> {
        self.record(DrmCall::Finalize);
        Ok(())
    }

    fn drm_handle(&self, _session: DrmSessionHandle) -> core_native::Result<i32> {
        Ok(42)
    }

    fn update_pssh_data(&self, _session: DrmSessionHandle, data: &[u8]) -> core_native::Result<()> {
        self.record(DrmCall::UpdatePssh(data.to_vec()));
        Ok(())
    }

    fn install_key(&self, _session: DrmSessionHandle, session_ref: SessionRef, response: &[u8]) -> core_native::Result<()> {
        self.record(DrmCall::InstallKey {
            session_ref: session_ref.0,
            len: response.len(),
            nested: self.in_native_call.load(Ordering::SeqCst),
        });
        Ok(())
    }

    fn security_init_complete(
        &self,
        _session: DrmSessionHandle,
        _drm_handle: &mut i32,
        _pssh: &[u8],
        player: Option<PlayerHandle>,
    ) -> bool {
        self.record(DrmCall::SecurityInit {
            player: player.map(|p| p.as_raw()),
        });
        true
    }

    fn release_session(&self, _session: DrmSessionHandle) -> core_native::Result<()> {
        self.record(DrmCall::Release);
        self.listener.lock().take();
        Ok(())
    }
}

struct FakeLoader {
    drm: Arc<FakeDrm>,
}

impl NativeLoader for FakeLoader {
    fn open_media_player(&self) -> core_native::Result<Arc<dyn MediaPlayerApi>> {
        Err(NativeError::SymbolUnavailable("player_create"))
    }

    fn open_plus_player(&self, _version: &str, _dir: &Path) -> core_native::Result<Arc<dyn PlusPlayerApi>> {
        Err(NativeError::SymbolUnavailable("Create"))
    }

    fn open_drm_runtime(&self) -> core_native::Result<Arc<dyn DrmApi>> {
        Ok(self.drm.clone())
    }
}

mock! {
    Transport {}
    impl LicenseTransport for Transport {
        fn acquire_license(&self, request: &LicenseRequest) -> bridge_traits::error::Result<Bytes>;
    }
}

struct FixedCallback(Bytes);

impl ChallengeCallback for FixedCallback {
    fn respond(&self, _challenge: &[u8]) -> Result<Bytes, BridgeError> {
        Ok(self.0.clone())
    }
}

/// License server that holds each request until the test opens the gate.
struct GatedTransport {
    entered: Mutex<mpsc::Sender<()>>,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl LicenseTransport for GatedTransport {
    fn acquire_license(&self, _request: &LicenseRequest) -> bridge_traits::error::Result<Bytes> {
        let _ = self.entered.lock().send(());
        let _ = self.gate.lock().recv();
        Ok(Bytes::from_static(b"late-license"))
    }
}

struct Fixture {
    drm: Arc<FakeDrm>,
    scheduler: Arc<QueuedIdleScheduler>,
    manager: DrmSessionManager,
}

fn fixture(transport: Option<MockTransport>) -> Fixture {
    let drm = Arc::new(FakeDrm::default());
    let scheduler = Arc::new(QueuedIdleScheduler::new());
    let transport = transport.map(|t| Arc::new(t) as Arc<dyn LicenseTransport>);
    let manager = DrmSessionManager::new(
        Arc::new(FakeLoader { drm: drm.clone() }),
        scheduler.clone(),
        transport,
    );
    Fixture { drm, scheduler, manager }
}

fn license_server(response: &'static [u8]) -> MockTransport {
    let mut transport = MockTransport::new();
    transport
        .expect_acquire_license()
        .withf(|request| request.server_url == "https://license.example/rightsmanager" && request.challenge.as_ref() == b"challenge")
        .times(1)
        .returning(move |_| Ok(Bytes::from_static(response)));
    transport
}

#[test]
fn test_license_server_round_trip_installs_once_after_challenge() {
    let f = fixture(Some(license_server(b"0123456789")));
    f.manager.create_session(DrmType::PlayReady, true).unwrap();
    f.drm.issue_challenge(7, b"challenge");

    f.manager
        .set_challenge_with_license_server("https://cdn.example/manifest.mpd", "https://license.example/rightsmanager")
        .unwrap();
    f.manager.update_pssh_data(b"pssh").unwrap();

    assert_eq!(*f.drm.challenge_results.lock(), vec![true]);
    assert!(f.drm.installs().is_empty());
    assert_eq!(f.manager.pending_installs(), 1);

    assert_eq!(f.scheduler.run_pending(), 1);
    assert_eq!(
        f.drm.installs(),
        vec![DrmCall::InstallKey {
            session_ref: 7,
            len: 10,
            nested: false
        }]
    );
    assert_eq!(f.manager.pending_installs(), 0);
    assert_eq!(f.manager.state(), SessionState::Initialized);

    assert_eq!(
        &f.drm.calls()[..6],
        &[
            DrmCall::LocalMode,
            DrmCall::Create("com.microsoft.playready".to_string()),
            DrmCall::RegisterListener,
            DrmCall::EnableChallenge,
            DrmCall::Manifest("https://cdn.example/manifest.mpd".to_string()),
            DrmCall::Initialize,
        ]
    );
}

#[test]
fn test_multiple_challenges_share_one_idle_task() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    f.drm.issue_challenge(1, b"first");
    f.drm.issue_challenge(2, b"second");

    f.manager
        .set_challenge_with_callback("https://cdn.example/a.mpd", Arc::new(FixedCallback(Bytes::from_static(b"key"))))
        .unwrap();

    assert_eq!(f.scheduler.pending(), 1);
    assert_eq!(f.manager.pending_installs(), 2);
    f.scheduler.run_pending();

    let installs = f.drm.installs();
    assert_eq!(installs.len(), 2);
    assert!(installs.iter().all(|c| matches!(c, DrmCall::InstallKey { len: 3, nested: false, .. })));
    assert!(!f.drm.calls().contains(&DrmCall::LocalMode));
}

#[test]
fn test_license_server_takes_precedence_over_callback() {
    let f = fixture(Some(license_server(b"server")));
    f.manager.create_session(DrmType::PlayReady, false).unwrap();
    f.manager
        .set_challenge_with_callback("https://cdn.example/a.mpd", Arc::new(FixedCallback(Bytes::from_static(b"callback"))))
        .unwrap();

    f.drm.issue_challenge(3, b"challenge");
    f.manager
        .set_challenge_with_license_server("https://cdn.example/a.mpd", "https://license.example/rightsmanager")
        .unwrap();
    f.scheduler.run_pending();

    assert_eq!(
        f.drm.installs(),
        vec![DrmCall::InstallKey {
            session_ref: 3,
            len: 6,
            nested: false
        }]
    );
}

#[test]
fn test_empty_response_installs_nothing() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    f.drm.issue_challenge(1, b"challenge");
    f.manager
        .set_challenge_with_callback("https://cdn.example/a.mpd", Arc::new(FixedCallback(Bytes::new())))
        .unwrap();

    assert_eq!(*f.drm.challenge_results.lock(), vec![false]);
    assert_eq!(f.scheduler.pending(), 0);
    assert!(f.drm.installs().is_empty());
}

#[test]
fn test_challenge_without_source_is_rejected() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    f.drm.issue_challenge(1, b"challenge");
    // A URL with no transport cannot be used either.
    f.manager
        .set_challenge_with_license_server("https://cdn.example/a.mpd", "https://license.example")
        .unwrap();
    assert_eq!(*f.drm.challenge_results.lock(), vec![false]);
    assert!(f.drm.installs().is_empty());
}

#[test]
fn test_release_cancels_pending_install_and_is_idempotent() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    f.drm.issue_challenge(1, b"challenge");
    f.manager
        .set_challenge_with_callback("https://cdn.example/a.mpd", Arc::new(FixedCallback(Bytes::from_static(b"key"))))
        .unwrap();
    assert_eq!(f.scheduler.pending(), 1);

    f.manager.release();
    f.manager.release();

    assert_eq!(f.scheduler.pending(), 0);
    assert_eq!(f.scheduler.run_pending(), 0);
    assert!(f.drm.installs().is_empty());
    assert_eq!(f.drm.count(&DrmCall::Finalize), 1);
    assert_eq!(f.drm.count(&DrmCall::Release), 1);
    assert_eq!(f.manager.state(), SessionState::Released);
    assert_eq!(f.manager.drm_handle(), Err(DrmError::NoSession));
}

#[test]
fn test_initialize_failure_keeps_session() {
    let f = fixture(None);
    f.drm.fail_initialize.store(true, Ordering::SeqCst);
    f.manager.create_session(DrmType::Widevine, false).unwrap();

    let err = f
        .manager
        .set_challenge_with_callback("https://cdn.example/a.mpd", Arc::new(FixedCallback(Bytes::from_static(b"key"))))
        .unwrap_err();
    assert!(matches!(err, DrmError::Initialization(_)));
    assert!(f.manager.has_session());
    assert_eq!(f.drm.count(&DrmCall::Release), 0);

    // Not initialized, so release skips finalize.
    f.manager.release();
    assert_eq!(f.drm.count(&DrmCall::Finalize), 0);
    assert_eq!(f.drm.count(&DrmCall::Release), 1);
}

#[test]
fn test_listener_registration_failure_releases_session() {
    let f = fixture(None);
    f.drm.fail_register.store(true, Ordering::SeqCst);

    let err = f.manager.create_session(DrmType::Widevine, false).unwrap_err();
    assert!(matches!(err, DrmError::SessionCreation(NativeError::CallFailed { .. })));
    assert_eq!(f.drm.count(&DrmCall::Release), 1);
    assert!(!f.manager.has_session());
}

#[test]
fn test_handle_and_security_init_are_forwarded() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    assert_eq!(f.manager.drm_handle(), Ok(42));

    let mut handle = 42;
    let player = PlayerHandle::from_raw(0xbeef);
    assert!(f.manager.security_init_complete(&mut handle, b"pssh", player));
    assert!(f.manager.security_init_complete(&mut handle, b"pssh", None));
    assert!(f.drm.calls().contains(&DrmCall::SecurityInit { player: Some(0xbeef) }));
    assert!(f.drm.calls().contains(&DrmCall::SecurityInit { player: None }));
}

#[test]
fn test_drop_releases_session() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    let drm = f.drm.clone();
    drop(f);
    assert_eq!(drm.count(&DrmCall::Release), 1);
}

#[test]
fn test_license_resolved_after_release_is_refused() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (open_tx, open_rx) = mpsc::channel();
    let drm = Arc::new(FakeDrm::default());
    let scheduler = Arc::new(QueuedIdleScheduler::new());
    let manager = Arc::new(DrmSessionManager::new(
        Arc::new(FakeLoader { drm: drm.clone() }),
        scheduler.clone(),
        Some(Arc::new(GatedTransport {
            entered: Mutex::new(entered_tx),
            gate: Mutex::new(open_rx),
        })),
    ));
    manager.create_session(DrmType::Widevine, true).unwrap();
    drm.issue_challenge(5, b"challenge");

    let initializing = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            manager.set_challenge_with_license_server("https://cdn.example/a.mpd", "https://license.example/wv")
        })
    };

    // The license request is in flight on the runtime thread.
    entered_rx.recv().unwrap();
    manager.release();
    assert_eq!(manager.state(), SessionState::Released);
    assert_eq!(scheduler.pending(), 0);

    open_tx.send(()).unwrap();
    initializing.join().unwrap().unwrap();

    assert_eq!(*drm.challenge_results.lock(), vec![false]);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(manager.pending_installs(), 0);
    assert_eq!(manager.state(), SessionState::Released);
    assert!(drm.installs().is_empty());
}

#[test]
fn test_session_recreated_after_release_installs_again() {
    let f = fixture(None);
    f.manager.create_session(DrmType::Widevine, false).unwrap();
    f.manager.release();

    f.manager.create_session(DrmType::Widevine, false).unwrap();
    f.drm.issue_challenge(2, b"challenge");
    f.manager
        .set_challenge_with_callback("https://cdn.example/a.mpd", Arc::new(FixedCallback(Bytes::from_static(b"key"))))
        .unwrap();

    assert_eq!(*f.drm.challenge_results.lock(), vec![true]);
    assert_eq!(f.scheduler.run_pending(), 1);
    assert_eq!(f.drm.installs().len(), 1);
    assert_eq!(f.manager.state(), SessionState::Initialized);
}
