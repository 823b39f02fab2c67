//! Session-level tests: stream switching, restore, auto-save and effects

use bridge_desktop::MemoryStorage;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{PlaybackState, PlayerControl, SeekMode, StreamInfo, StreamResolver};
use core_service::{
    LoopMode, LooperConfig, LooperEvent, LooperSession, MarkerId, ServiceError,
    SessionDependencies, Topic,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Mocks
// ============================================================================

mockall::mock! {
    Player {}

    #[async_trait::async_trait]
    impl PlayerControl for Player {
        async fn load(&self, url: &str) -> BridgeResult<()>;
        async fn seek(&self, position: f64, mode: SeekMode) -> BridgeResult<()>;
        async fn play(&self) -> BridgeResult<()>;
        async fn pause(&self) -> BridgeResult<()>;
        async fn is_paused(&self) -> BridgeResult<bool>;
        async fn set_speed(&self, speed: f64) -> BridgeResult<()>;
        async fn set_audio_filter(&self, filter: &str) -> BridgeResult<()>;
    }
}

mockall::mock! {
    Resolver {}

    #[async_trait::async_trait]
    impl StreamResolver for Resolver {
        async fn resolve(&self, url: &str) -> BridgeResult<StreamInfo>;
    }
}

/// Player that accepts everything and reports seeks on a channel.
fn permissive_player() -> (MockPlayer, mpsc::UnboundedReceiver<(f64, SeekMode)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut player = MockPlayer::new();
    player.expect_load().returning(|_| Ok(()));
    player.expect_set_audio_filter().returning(|_| Ok(()));
    player.expect_set_speed().returning(|_| Ok(()));
    player.expect_seek().returning(move |position, mode| {
        tx.send((position, mode)).ok();
        Ok(())
    });
    (player, rx)
}

fn titled_resolver() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|url| Ok(StreamInfo::new(url, "Practice Track").with_duration(Some(240.0))));
    resolver
}

fn session_with(
    storage: Arc<MemoryStorage>,
    player: MockPlayer,
    resolver: MockResolver,
) -> LooperSession {
    let config = LooperConfig::builder()
        .document_storage(storage)
        .build()
        .unwrap();
    LooperSession::new(
        config,
        SessionDependencies::new(Arc::new(player), Arc::new(resolver)),
    )
    .unwrap()
}

const URL: &str = "https://www.youtube.com/watch?v=abc123";

const SAVED_DOCUMENT: &str = r##"{
  "https://www.youtube.com/watch?v=abc123": {
    "markers": [
      {"id": "m-a", "label": "A", "position": 10.0, "color": "#FF6B6B", "memo": ""},
      {"id": "m-b", "label": "B", "position": 20.0, "color": "#4ECDC4", "memo": "verse"}
    ],
    "segments": [
      {"start_marker_id": "m-a", "end_marker_id": "m-b", "display_name": null}
    ],
    "loop_mode": "loop_single"
  }
}"##;

// ============================================================================
// Stream lifecycle
// ============================================================================

#[tokio::test]
async fn open_stream_restores_saved_loops_without_writing() {
    let storage = Arc::new(MemoryStorage::with_document(SAVED_DOCUMENT));
    let (player, _seeks) = permissive_player();
    let session = session_with(storage.clone(), player, titled_resolver());

    let info = session
        .open_stream("https://www.youtube.com/watch?si=xyz&v=abc123&t=42")
        .await
        .unwrap();

    assert_eq!(info.title, "Practice Track");
    assert_eq!(session.duration(), Some(240.0));
    assert_eq!(session.registry().len(), 2);
    assert_eq!(session.engine().segments().len(), 1);
    assert_eq!(session.engine().loop_mode(), LoopMode::LoopSingle);
    assert_eq!(session.engine().current_index(), Some(0));
    assert!(!session.engine().is_active());
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn open_unknown_stream_starts_empty() {
    let storage = Arc::new(MemoryStorage::with_document(SAVED_DOCUMENT));
    let (player, _seeks) = permissive_player();
    let session = session_with(storage, player, titled_resolver());

    session.open_stream(URL).await.unwrap();
    session.open_stream("https://example.com/other.mp4").await.unwrap();

    assert!(session.registry().is_empty());
    assert!(session.engine().segments().is_empty());
    assert_eq!(session.engine().current_index(), None);
}

#[tokio::test]
async fn switching_streams_saves_and_restores() {
    let storage = Arc::new(MemoryStorage::new());
    let (player, _seeks) = permissive_player();
    let session = session_with(storage.clone(), player, titled_resolver());

    session.open_stream(URL).await.unwrap();
    session.report_position(5.0);
    let a = session.add_marker_at_current().unwrap();
    session.report_position(9.0);
    let b = session.add_marker_at_current().unwrap();
    session
        .engine()
        .add_segment(a.id.clone(), b.id.clone(), Some("intro".into()))
        .unwrap();

    session.open_stream("https://example.com/second").await.unwrap();
    assert!(session.registry().is_empty());

    session.open_stream(URL).await.unwrap();
    let restored = session.registry().snapshot();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored[0].id, a.id);
    assert_eq!(session.engine().describe(0).unwrap().title(), "intro");
}

#[tokio::test]
async fn switching_while_looping_keeps_other_stream_intact() {
    let storage = Arc::new(MemoryStorage::new());
    let (player, _seeks) = permissive_player();
    let session = session_with(storage, player, titled_resolver());
    let second = "https://example.com/second";

    session.open_stream(second).await.unwrap();
    session.report_position(99.0);
    session.add_marker_at_current().unwrap();

    session.open_stream(URL).await.unwrap();
    session.report_position(1.0);
    let a = session.add_marker_at_current().unwrap();
    session.report_position(2.0);
    let b = session.add_marker_at_current().unwrap();
    session.engine().add_segment(a.id, b.id, None).unwrap();
    assert!(session.toggle_looping());

    session.open_stream(second).await.unwrap();

    let positions: Vec<f64> = session
        .registry()
        .snapshot()
        .iter()
        .map(|m| m.position)
        .collect();
    assert_eq!(positions, vec![99.0]);
    assert!(session.engine().segments().is_empty());
    assert!(!session.engine().is_active());

    let first = session.store().load_for_url(URL).unwrap();
    assert_eq!(first.markers.len(), 2);
    assert_eq!(first.segments.len(), 1);
}

#[tokio::test]
async fn resolver_failure_leaves_session_untouched() {
    let storage = Arc::new(MemoryStorage::new());
    let mut player = MockPlayer::new();
    player.expect_load().never();
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|_| Err(BridgeError::ResolveFailed("HTTP 404".into())));
    let session = session_with(storage, player, resolver);

    let result = session.open_stream(URL).await;

    assert!(matches!(result, Err(ServiceError::Bridge(_))));
    assert_eq!(session.current_url(), None);
}

#[tokio::test]
async fn close_saves_and_stops() {
    let storage = Arc::new(MemoryStorage::new());
    let (player, _seeks) = permissive_player();
    let session = session_with(storage.clone(), player, titled_resolver());

    session.open_stream(URL).await.unwrap();
    session.report_position(1.0);
    let a = session.add_marker_at_current().unwrap();
    session.report_position(4.0);
    let b = session.add_marker_at_current().unwrap();
    session.engine().add_segment(a.id, b.id, None).unwrap();
    assert!(session.toggle_looping());
    let writes = storage.write_count();

    session.close().unwrap();

    assert!(!session.engine().is_active());
    assert!(storage.write_count() > writes);
    assert!(storage.contents().unwrap().contains("watch?v=abc123"));
}

// ============================================================================
// Editing and auto-save
// ============================================================================

#[tokio::test]
async fn markers_need_stream_and_position() {
    let storage = Arc::new(MemoryStorage::new());
    let (player, _seeks) = permissive_player();
    let session = session_with(storage, player, titled_resolver());

    assert!(matches!(
        session.add_marker_at_current(),
        Err(ServiceError::NoStreamLoaded)
    ));

    session.open_stream(URL).await.unwrap();
    assert!(matches!(
        session.add_marker_at_current(),
        Err(ServiceError::NoPosition)
    ));
}

#[tokio::test]
async fn edits_are_saved_automatically() {
    let storage = Arc::new(MemoryStorage::new());
    let (player, _seeks) = permissive_player();
    let session = session_with(storage.clone(), player, titled_resolver());
    session.open_stream(URL).await.unwrap();
    assert_eq!(storage.write_count(), 0);

    session.report_position(30.5);
    let marker = session.add_marker_at_current().unwrap();
    assert_eq!(marker.position, 30.5);
    assert_eq!(storage.write_count(), 1);

    session.engine().set_loop_mode(LoopMode::PlayOnce);
    let saved = session.store().load_for_url(URL).unwrap();
    assert_eq!(saved.loop_mode, LoopMode::PlayOnce);
    assert_eq!(saved.markers.len(), 1);
}

#[tokio::test]
async fn removing_last_marker_deletes_saved_entry() {
    let storage = Arc::new(MemoryStorage::new());
    let (player, _seeks) = permissive_player();
    let session = session_with(storage.clone(), player, titled_resolver());
    session.open_stream(URL).await.unwrap();

    session.report_position(2.0);
    let a = session.add_marker_at_current().unwrap();
    session.report_position(3.0);
    let b = session.add_marker_at_current().unwrap();
    session.engine().add_segment(a.id.clone(), b.id.clone(), None).unwrap();

    session.remove_marker(&a.id).unwrap();
    assert!(session.engine().segments().is_empty());
    session.remove_marker(&b.id).unwrap();

    assert!(session.store().load_for_url(URL).is_none());
    assert_eq!(storage.contents().as_deref(), Some("{}"));
    assert!(matches!(
        session.remove_marker(&MarkerId::from("missing")),
        Err(ServiceError::Sequence(_))
    ));
}

// ============================================================================
// Looping through the player
// ============================================================================

#[tokio::test]
async fn toggle_looping_seeks_player_to_first_segment() {
    let storage = Arc::new(MemoryStorage::with_document(SAVED_DOCUMENT));
    let (player, mut seeks) = permissive_player();
    let session = session_with(storage, player, titled_resolver());
    session.open_stream(URL).await.unwrap();

    assert!(session.toggle_looping());
    let first = tokio::time::timeout(Duration::from_secs(1), seeks.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, (10.0, SeekMode::AbsoluteExact));

    // Loop single: reaching the end restarts the segment
    session.report_position(10.2);
    session.report_position(19.9);
    let again = tokio::time::timeout(Duration::from_secs(1), seeks.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.0, 10.0);
    assert_eq!(session.last_position(), Some(19.9));

    assert!(!session.toggle_looping());
}

#[tokio::test]
async fn transport_commands_reach_player() {
    let storage = Arc::new(MemoryStorage::new());
    let (mut player, mut seeks) = permissive_player();
    player.expect_is_paused().returning(|| Ok(false));
    player.expect_pause().times(1).returning(|| Ok(()));
    let session = session_with(storage, player, titled_resolver());

    session.seek_relative(-5.0).await.unwrap();
    let (delta, mode) = seeks.recv().await.unwrap();
    assert_eq!(delta, -5.0);
    assert_eq!(mode, SeekMode::RelativeExact);

    session.toggle_pause().await.unwrap();

    session.report_playback_state(PlaybackState::Paused);
    session.report_duration(61.0);
    assert_eq!(session.playback_state(), Some(PlaybackState::Paused));
    assert_eq!(session.duration(), Some(61.0));
}

// ============================================================================
// Audio effects
// ============================================================================

#[tokio::test]
async fn effects_clamp_and_publish() {
    let storage = Arc::new(MemoryStorage::new());
    let mut player = MockPlayer::new();
    player
        .expect_set_speed()
        .withf(|speed| *speed == 2.0)
        .times(1)
        .returning(|_| Ok(()));
    player
        .expect_set_speed()
        .withf(|speed| *speed == 1.0)
        .times(1)
        .returning(|_| Ok(()));
    player
        .expect_set_audio_filter()
        .withf(|filter| filter == "lavfi=[asetrate=24000,aresample=48000]")
        .times(1)
        .returning(|_| Ok(()));
    player
        .expect_set_audio_filter()
        .withf(|filter| filter.is_empty())
        .times(1)
        .returning(|_| Ok(()));
    let session = session_with(storage, player, MockResolver::new());
    let (_id, mut events) = session.bus().subscribe_channel(Topic::EffectsChanged);

    assert_eq!(session.effects().set_tempo(3.5).await.unwrap(), 2.0);
    assert_eq!(session.effects().set_semitones(-20).await.unwrap(), -12);
    assert!(session.effects().set_tempo(f64::NAN).await.is_err());

    assert_eq!(
        events.try_recv().unwrap(),
        LooperEvent::EffectsChanged {
            tempo: 2.0,
            semitones: 0
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        LooperEvent::EffectsChanged {
            tempo: 2.0,
            semitones: -12
        }
    );

    session.effects().reset().await.unwrap();
    assert_eq!(session.effects().tempo(), 1.0);
    assert_eq!(session.effects().semitones(), 0);
}
