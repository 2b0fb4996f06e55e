//! End-to-end behavior of the media player backend against an in-process
//! native runtime.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::license::{DrmType, LicenseRequest, LicenseTransport};
use bridge_traits::port::{MessagePort, PortMessage};
use bridge_traits::window::Geometry;
use bytes::Bytes;
use core_bridge::ReplyHandle;
use core_native::types::{DisplayRotation, MediaPlayerState, SessionRef, VideoSize};
use core_playback::error::{CODE_INTERRUPTED, CODE_INVALID_STATE};
use core_playback::{CreateRequest, MediaPlayer, PlayerError, VideoPlayer};
use core_runtime::events::{ChannelMessage, ChannelSink, PlayerEvent};
use mockall::mock;
use support::{Harness, RecordingSink, DRM_HANDLE, PLAYER_HANDLE};

const URI: &str = "https://media.example.com/stream.mpd";

fn created(harness: &Harness) -> MediaPlayer {
    let player = MediaPlayer::new(1, harness.context.clone());
    player.create(&CreateRequest::new(URI)).expect("create");
    player
}

fn listening(harness: &Harness) -> (MediaPlayer, Arc<RecordingSink>) {
    let player = created(harness);
    let sink = Arc::new(RecordingSink::default());
    player.listen(sink.clone()).expect("listen");
    (player, sink)
}

fn counter() -> (Arc<AtomicUsize>, Box<dyn FnOnce() + Send>) {
    let count = Arc::new(AtomicUsize::new(0));
    let hook = Arc::clone(&count);
    (count, Box::new(move || {
        hook.fetch_add(1, Ordering::SeqCst);
    }))
}

/// Port standing in for the application: answers every request from its
/// own thread.
struct AnsweringPort {
    replies: ReplyHandle,
}

impl MessagePort for AnsweringPort {
    fn post(&self, message: PortMessage) -> BridgeResult<()> {
        let replies = self.replies.clone();
        thread::spawn(move || {
            let mut body = b"license:".to_vec();
            body.extend_from_slice(&message.payload);
            replies.post_reply(message.call_id, Bytes::from(body));
        });
        Ok(())
    }
}

/// Port whose application never answers.
struct SilentPort {
    posted: mpsc::Sender<u64>,
}

impl MessagePort for SilentPort {
    fn post(&self, message: PortMessage) -> BridgeResult<()> {
        let _ = self.posted.send(message.call_id);
        Ok(())
    }
}

mock! {
    Transport {}

    impl LicenseTransport for Transport {
        fn acquire_license(&self, request: &LicenseRequest) -> BridgeResult<Bytes>;
    }
}

#[test]
fn test_create_sequence() {
    let harness = Harness::new();
    let player = created(&harness);
    let media = harness.media();

    let calls = media.log.calls();
    let order = [
        "ensure_mandatory",
        "player_create",
        "bind_listener",
        "player_set_ecore_wl_display",
        "player_set_display_mode",
        "player_set_display_roi_area",
        "player_set_uri",
        "player_set_display_visible",
        "set_event_callbacks",
        "player_prepare_async",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|name| media.log.index_of(name).unwrap_or_else(|| panic!("{name} missing in {calls:?}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {calls:?}");

    assert!(calls.contains(&format!("display={:#x}@1920x1080", support::WINDOW_HANDLE)));
    assert!(calls.contains(&"roi=0,0,1,1".to_string()));
    assert!(calls.contains(&format!("uri={URI}")));
    assert!(calls.contains(&"visible=true".to_string()));
    // No DRM work for clear content.
    assert!(harness.drm().log.calls().is_empty());
    assert_eq!(player.player_id(), 1);
}

#[test]
fn test_create_twice_is_rejected() {
    let harness = Harness::new();
    let player = created(&harness);

    let err = player.create(&CreateRequest::new(URI)).unwrap_err();
    assert!(matches!(err, PlayerError::AlreadyCreated));
    assert_eq!(harness.media().log.count("player_create"), 1);
}

#[test]
fn test_failed_create_tears_down_and_allows_retry() {
    let harness = Harness::new();
    *harness.window.geometry.lock() = None;
    let player = MediaPlayer::new(1, harness.context.clone());

    let err = player.create(&CreateRequest::new(URI)).unwrap_err();
    assert!(matches!(err, PlayerError::Creation { .. }));
    assert_eq!(harness.media().log.count("player_destroy"), 1);
    assert_eq!(harness.media().log.count("release_listener"), 1);
    assert!(player.listen(Arc::new(RecordingSink::default())).is_err());

    *harness.window.geometry.lock() = Some(Geometry::new(0, 0, 1280, 720));
    player.create(&CreateRequest::new(URI)).expect("retry");
    assert_eq!(harness.media().log.count("player_create"), 2);
}

#[test]
fn test_native_failure_uses_runtime_message() {
    let harness = Harness::new();
    harness.media().log.fail("player_prepare_async");
    let player = MediaPlayer::new(1, harness.context.clone());

    let err = player.create(&CreateRequest::new(URI)).unwrap_err();
    assert_eq!(err.code(), "Media Player error");
    assert!(err.message().contains("media error"), "{}", err.message());
}

#[test]
fn test_listen_before_create_fails() {
    let harness = Harness::new();
    let player = MediaPlayer::new(1, harness.context.clone());

    let err = player.listen(Arc::new(RecordingSink::default())).unwrap_err();
    assert_eq!(err.code(), CODE_INVALID_STATE);
    assert_eq!(err.message(), "Media player is not created");
}

#[test]
fn test_play_only_from_ready_or_paused() {
    let harness = Harness::new();
    let player = created(&harness);
    let media = harness.media();

    // Idle: silently ignored
    player.play().unwrap();
    assert_eq!(media.log.count("player_start"), 0);

    media.set_state(MediaPlayerState::Ready);
    player.play().unwrap();
    assert_eq!(media.log.count("player_start"), 1);

    // Already playing: nothing more reaches the runtime
    player.play().unwrap();
    assert_eq!(media.log.count("player_start"), 1);

    player.pause().unwrap();
    assert_eq!(media.log.count("player_pause"), 1);
    player.pause().unwrap();
    assert_eq!(media.log.count("player_pause"), 1);

    player.play().unwrap();
    assert_eq!(media.log.count("player_start"), 2);
}

#[test]
fn test_play_before_create_is_noop() {
    let harness = Harness::new();
    let player = MediaPlayer::new(1, harness.context.clone());

    player.play().unwrap();
    player.pause().unwrap();
    assert!(harness.media().log.calls().is_empty());
}

#[test]
fn test_queries_require_prepared_player() {
    let harness = Harness::new();
    let player = created(&harness);

    let err = player.duration().unwrap_err();
    assert_eq!(err.message(), "Media player is not ready");

    harness.media().set_state(MediaPlayerState::Ready);
    assert_eq!(player.duration().unwrap(), 60_000);
    assert_eq!(player.position().unwrap(), 1234);
}

#[test]
fn test_concurrent_seek_rejected_and_completion_fires_once() {
    let harness = Harness::new();
    let player = created(&harness);
    harness.media().set_state(MediaPlayerState::Playing);

    let (first, on_first) = counter();
    let (second, on_second) = counter();
    player.seek_to(5_000, on_first).unwrap();

    let err = player.seek_to(9_000, on_second).unwrap_err();
    assert!(matches!(err, PlayerError::ConcurrentSeek));
    assert_eq!(harness.media().log.count("seek=9000"), 0);

    let listener = harness.media().listener();
    listener.on_seek_completed();
    listener.on_seek_completed();
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);

    // The slot is free again.
    let (third, on_third) = counter();
    player.seek_to(1_000, on_third).unwrap();
    listener.on_seek_completed();
    assert_eq!(third.load(Ordering::SeqCst), 1);
}

#[test]
fn test_seek_past_duration_is_rejected() {
    let harness = Harness::new();
    let player = created(&harness);
    harness.media().set_state(MediaPlayerState::Paused);

    let (count, hook) = counter();
    let err = player.seek_to(60_001, hook).unwrap_err();
    assert!(matches!(err, PlayerError::InvalidState(_)), "{err:?}");
    assert_eq!(harness.media().log.count("seek=60001"), 0);

    // The end itself is reachable and the slot was never taken.
    let (_, to_end) = counter();
    player.seek_to(60_000, to_end).unwrap();
    assert_eq!(harness.media().log.count("seek=60000"), 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_refused_seek_releases_slot() {
    let harness = Harness::new();
    let player = created(&harness);
    harness.media().set_state(MediaPlayerState::Paused);
    harness.media().log.fail("player_set_play_position");

    let (count, hook) = counter();
    assert!(player.seek_to(100, hook).is_err());
    let (_, retry) = counter();
    let err = player.seek_to(200, retry).unwrap_err();
    assert!(!matches!(err, PlayerError::ConcurrentSeek));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_seek_before_ready_is_state_error() {
    let harness = Harness::new();
    let player = created(&harness);

    let (_, hook) = counter();
    let err = player.seek_to(100, hook).unwrap_err();
    assert!(err.is_state_error());
}

#[test]
fn test_volume_is_clamped() {
    let harness = Harness::new();
    let player = created(&harness);

    player.set_volume(1.7).unwrap();
    player.set_volume(-0.5).unwrap();
    player.set_looping(true).unwrap();

    let calls = harness.media().log.calls();
    assert!(calls.contains(&"volume=1,1".to_string()));
    assert!(calls.contains(&"volume=0,0".to_string()));
    assert!(calls.contains(&"looping=true".to_string()));
}

#[test]
fn test_buffering_sequence() {
    let harness = Harness::new();
    let (_player, sink) = listening(&harness);
    let listener = harness.media().listener();

    for percent in [5, 40, 100] {
        listener.on_buffering(percent);
    }

    assert_eq!(
        sink.events(),
        vec![
            PlayerEvent::BufferingStart,
            PlayerEvent::BufferingUpdate { value: 40 },
            PlayerEvent::BufferingEnd,
        ]
    );
}

#[test]
fn test_prepared_sends_initialized_once() {
    let harness = Harness::new();
    let (_player, sink) = listening(&harness);
    harness.media().set_state(MediaPlayerState::Ready);

    let listener = harness.media().listener();
    listener.on_prepared(true);
    listener.on_prepared(true);

    assert_eq!(
        sink.events(),
        vec![PlayerEvent::Initialized {
            duration: 60_000,
            width: 1920,
            height: 1080,
        }]
    );
}

#[test]
fn test_listen_after_prepare_replays_initialized() {
    let harness = Harness::new();
    let player = created(&harness);
    *harness.media().rotation.lock() = Some(DisplayRotation::Rotate90);

    // Prepared before anyone listens: nothing is emitted yet.
    harness.media().set_state(MediaPlayerState::Ready);
    harness.media().listener().on_prepared(true);

    let sink = Arc::new(RecordingSink::default());
    player.listen(sink.clone()).unwrap();

    assert_eq!(
        sink.events(),
        vec![PlayerEvent::Initialized {
            duration: 60_000,
            width: 1080,
            height: 1920,
        }]
    );
}

#[test]
fn test_rotation_failure_reports_error_then_initializes() {
    let harness = Harness::new();
    let (_player, sink) = listening(&harness);
    *harness.media().rotation.lock() = None;

    harness.media().listener().on_prepared(true);

    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(matches!(&messages[0], ChannelMessage::Error { code, .. } if code == "Media Player error"));
    assert_eq!(
        messages[1],
        ChannelMessage::Event(PlayerEvent::Initialized {
            duration: 60_000,
            width: 1920,
            height: 1080,
        })
    );
}

#[test]
fn test_video_size_follows_rotation() {
    let harness = Harness::new();
    let player = created(&harness);
    let media = harness.media();
    media.set_state(MediaPlayerState::Playing);
    *media.size.lock() = VideoSize::new(1280, 720);

    let cases = [
        (DisplayRotation::None, VideoSize::new(1280, 720)),
        (DisplayRotation::Rotate90, VideoSize::new(720, 1280)),
        (DisplayRotation::Rotate180, VideoSize::new(1280, 720)),
        (DisplayRotation::Rotate270, VideoSize::new(720, 1280)),
    ];
    for (rotation, expected) in cases {
        *media.rotation.lock() = Some(rotation);
        assert_eq!(player.video_size().unwrap(), expected, "{rotation:?}");
    }

    // Unknown rotation keeps the decoder's orientation.
    *media.rotation.lock() = None;
    assert_eq!(player.video_size().unwrap(), VideoSize::new(1280, 720));
}

#[test]
fn test_completion_pauses_player() {
    let harness = Harness::new();
    let (_player, sink) = listening(&harness);
    harness.media().set_state(MediaPlayerState::Playing);

    harness.media().listener().on_completed();

    assert_eq!(sink.events(), vec![PlayerEvent::Completed]);
    assert_eq!(harness.media().log.count("player_pause"), 1);
}

#[test]
fn test_interruption_is_terminal() {
    let harness = Harness::new();
    let (_player, sink) = listening(&harness);
    let listener = harness.media().listener();

    listener.on_interrupted(2);
    listener.on_prepared(true);

    assert_eq!(
        sink.errors(),
        vec![(
            CODE_INTERRUPTED.to_string(),
            "Media player has been interrupted.".to_string()
        )]
    );
    assert!(sink.events().is_empty());
}

#[test]
fn test_error_without_message_uses_runtime_text() {
    let harness = Harness::new();
    let (_player, sink) = listening(&harness);

    harness.media().listener().on_error(0x30, None);

    assert_eq!(
        sink.errors(),
        vec![("Media Player error".to_string(), "media error 0x30".to_string())]
    );
}

#[test]
fn test_dispose_is_idempotent() {
    let harness = Harness::new();
    let (player, sink) = listening(&harness);
    harness.media().set_state(MediaPlayerState::Paused);
    let late = harness.media().listener();

    player.dispose();
    player.dispose();
    late.on_completed();
    drop(player);
    late.on_completed();

    let media = harness.media();
    assert_eq!(media.log.count("player_unprepare"), 1);
    assert_eq!(media.log.count("player_destroy"), 1);
    assert_eq!(media.log.count("release_listener"), 1);
    assert_eq!(media.log.count("player_pause"), 0);
    assert!(!media.has_listener());
    assert!(sink.messages().is_empty());
}

#[test]
fn test_idle_player_is_not_unprepared() {
    let harness = Harness::new();
    let player = created(&harness);

    player.dispose();
    assert_eq!(harness.media().log.count("player_unprepare"), 0);
    assert_eq!(harness.media().log.count("player_destroy"), 1);
}

#[test]
fn test_widevine_with_license_server() {
    let mut transport = MockTransport::new();
    transport
        .expect_acquire_license()
        .withf(|request| {
            request.server_url == "https://license.example.com"
                && request.drm_type == DrmType::Widevine
                && request.challenge.as_ref() == b"challenge"
        })
        .times(1)
        .returning(|_| Ok(Bytes::from_static(b"key")));
    let harness = Harness::with_transport(Arc::new(transport));
    harness.drm().queue_challenge(7, b"challenge");

    let player = MediaPlayer::new(1, harness.context.clone());
    let request = CreateRequest::new(URI).with_drm(DrmType::Widevine, Some("https://license.example.com".to_string()));
    player.create(&request).expect("create");

    let drm_calls = harness.drm().log.calls();
    assert!(drm_calls.contains(&"create_session=com.widevine.alpha".to_string()));
    assert!(drm_calls.contains(&format!("manifest={URI}")));
    assert_eq!(harness.drm().log.count("local_mode"), 0);
    assert!(harness
        .media()
        .log
        .calls()
        .contains(&format!("drm_handle={DRM_HANDLE}")));
    assert_eq!(*harness.drm().challenge_accepted.lock(), Some(true));

    // The key is only installed once the main loop is idle.
    assert_eq!(harness.drm().log.count("install_key=7:key"), 0);
    assert_eq!(harness.scheduler.run_pending(), 1);
    assert_eq!(harness.drm().log.count("install_key=7:key"), 1);

    player.dispose();
    assert_eq!(harness.drm().log.count("Finalize"), 1);
    assert_eq!(harness.drm().log.count("DMGRReleaseDRMSession"), 1);
}

#[test]
fn test_playready_challenge_answered_by_application() {
    let harness = Harness::new();
    harness.drm().queue_challenge(3, b"pr-challenge");

    let player = MediaPlayer::new(1, harness.context.clone());
    player.register_send_port(Arc::new(AnsweringPort {
        replies: harness.bridge.reply_handle(),
    }));
    let request = CreateRequest {
        uri: URI.to_string(),
        drm_type: DrmType::PlayReady,
        license_server_url: None,
    };
    player.create(&request).expect("create");

    assert!(harness
        .drm()
        .log
        .calls()
        .contains(&"create_session=com.microsoft.playready".to_string()));
    harness.scheduler.run_pending();
    assert_eq!(harness.drm().log.count("install_key=3:license:pr-challenge"), 1);
}

#[test]
fn test_dispose_releases_blocked_challenge() {
    let harness = Harness::new();
    let player = MediaPlayer::new(1, harness.context.clone());
    let (posted_tx, posted_rx) = mpsc::channel();
    player.register_send_port(Arc::new(SilentPort { posted: posted_tx }));
    let request = CreateRequest {
        uri: URI.to_string(),
        drm_type: DrmType::Widevine,
        license_server_url: None,
    };
    player.create(&request).expect("create");

    // A native thread asks for a license the application never answers.
    let drm_listener = harness.drm().listener().expect("drm listener");
    let native_thread = thread::spawn(move || drm_listener.on_challenge(SessionRef(11), b"stuck"));
    posted_rx.recv_timeout(Duration::from_secs(2)).expect("challenge posted");

    player.dispose();

    assert!(!native_thread.join().unwrap());
    assert_eq!(harness.bridge.pending_count(), 0);
    assert_eq!(harness.scheduler.pending(), 0);

    // The disposed player keeps refusing calls until it is dropped.
    assert_eq!(harness.bridge.cancelled_scope_count(), 1);
    drop(player);
    assert_eq!(harness.bridge.cancelled_scope_count(), 0);
}

#[test]
fn test_drm_callbacks_forward_to_session() {
    let harness = Harness::new();
    let player = MediaPlayer::new(1, harness.context.clone());
    let request = CreateRequest::new(URI).with_drm(DrmType::Widevine, Some("https://license.example.com".to_string()));
    player.create(&request).expect("create");

    let listener = harness.media().listener();
    let mut handle = DRM_HANDLE;
    assert!(listener.on_drm_init_complete(&mut handle, b"pssh"));
    assert_eq!(listener.on_drm_update_pssh(b"abc"), 0);

    let calls = harness.drm().log.calls();
    assert!(calls.contains(&format!("security_init=4:{PLAYER_HANDLE}")));
    assert!(calls.contains(&"update_pssh=3".to_string()));
}

#[tokio::test]
async fn test_events_reach_channel_sink() {
    let harness = Harness::new();
    let player = created(&harness);
    let (sink, mut rx) = ChannelSink::new();
    player.listen(Arc::new(sink)).unwrap();

    let listener = harness.media().listener();
    listener.on_subtitle_updated(1500, "Hello".to_string());
    listener.on_completed();

    assert_eq!(
        rx.recv().await,
        Some(ChannelMessage::Event(PlayerEvent::SubtitleUpdate {
            duration: 1500,
            text: "Hello".to_string(),
        }))
    );
    assert_eq!(rx.recv().await, Some(ChannelMessage::Event(PlayerEvent::Completed)));

    player.cancel_listen();
    listener.on_completed();
    assert!(rx.try_recv().is_err());
}
