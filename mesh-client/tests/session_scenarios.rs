//! End-to-end session scenarios over the in-memory hub.
//!
//! A local session runs against a `MemoryHub`; the test plays the remote
//! peer directly through its own `HubChannel`.

use std::time::Duration;

use geomesh_client::{
    Channel, Config, FeedHandle, FeedSource, HubChannel, MemoryHub, PositionError, PositionWatch,
    Session, SessionHandle, WatchOptions,
};
use mesh_core::{Coordinator, Notice, PeerState, RecordingRouter, RecordingSurface};
use mesh_types::{InboundEvent, OutboundEvent, PeerId, Position};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type LocalCoordinator = Coordinator<RecordingSurface, RecordingRouter>;

struct Harness {
    hub: MemoryHub,
    surface: RecordingSurface,
    router: RecordingRouter,
    feed: FeedHandle,
    handle: SessionHandle,
    notices: mpsc::UnboundedReceiver<Notice>,
    task: JoinHandle<LocalCoordinator>,
}

fn pos(lat: f64, lng: f64) -> Position {
    Position::new(lat, lng).unwrap()
}

async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for: {}", what);
}

async fn start() -> Harness {
    let hub = MemoryHub::new();
    let surface = RecordingSurface::new();
    let router = RecordingRouter::new();
    let (notice_tx, notices) = mpsc::unbounded_channel();

    let (session, handle) = Session::new(
        &Config::default(),
        hub.join(),
        surface.clone(),
        router.clone(),
    );
    let mut session = session.with_notices(notice_tx);
    let (source, feed) = FeedSource::new();
    session.attach_position(PositionWatch::new(source, WatchOptions::default()));

    let task = tokio::spawn(async move { session.run().await.unwrap() });
    let joined = hub.clone();
    eventually("local session joins hub", || joined.len() == 1).await;

    Harness {
        hub,
        surface,
        router,
        feed,
        handle,
        notices,
        task,
    }
}

async fn remote_peer(hub: &MemoryHub) -> HubChannel {
    let remote = hub.join();
    remote.connect("hub").await.unwrap();
    remote
}

async fn publish(remote: &HubChannel, lat: f64, lng: f64) {
    let frame = OutboundEvent::location(pos(lat, lng)).to_bytes().unwrap();
    remote.send(&frame).await.unwrap();
}

async fn stop(harness: Harness) -> LocalCoordinator {
    harness.handle.shutdown();
    harness.task.await.unwrap()
}

#[tokio::test]
async fn sighting_and_disconnect_lifecycle() {
    let h = start().await;
    let remote = remote_peer(&h.hub).await;

    h.feed.fix(pos(10.0, 20.0));
    eventually("self marker", || h.surface.marker_count() == 1).await;
    let self_marker = h.surface.find_by_label("Your location").unwrap();
    assert_eq!(h.surface.marker_position(self_marker), Some(pos(10.0, 20.0)));
    assert_eq!(h.surface.viewport(), Some((pos(10.0, 20.0), 16)));

    // The remote peer sees our publish tagged with our transport id.
    let frame = remote.recv().await.unwrap();
    match InboundEvent::from_bytes(&frame).unwrap() {
        InboundEvent::Location(location) => {
            assert!(!location.id.is_local());
            assert_eq!(location.position().unwrap(), pos(10.0, 20.0));
        }
        other => panic!("Expected location, got {:?}", other),
    }

    publish(&remote, 30.0, 40.0).await;
    eventually("remote marker", || h.surface.marker_count() == 2).await;
    let label = format!("User {}", remote.id());
    let remote_marker = h.surface.find_by_label(&label).unwrap();
    assert!(h.surface.is_clickable(remote_marker));

    remote.close().await.unwrap();
    eventually("remote marker removed", || h.surface.marker_count() == 1).await;
    assert_eq!(h.surface.removed(), vec![remote_marker]);

    let remote_id = remote.id().clone();
    let coordinator = stop(h).await;
    assert_eq!(coordinator.registry().len(), 1);
    assert!(coordinator.registry().contains(&PeerId::local()));
    assert_eq!(coordinator.peer_state(&remote_id), PeerState::Removed);
}

#[tokio::test]
async fn route_follows_moving_peer() {
    let h = start().await;
    let remote = remote_peer(&h.hub).await;

    h.feed.fix(pos(0.0, 0.0));
    publish(&remote, 1.0, 1.0).await;
    eventually("both markers", || h.surface.marker_count() == 2).await;
    let marker = h
        .surface
        .find_by_label(&format!("User {}", remote.id()))
        .unwrap();

    h.handle.click(marker);
    assert!(h.handle.flush().await);
    assert_eq!(
        h.router.last_rendered(),
        Some((pos(0.0, 0.0), pos(1.0, 1.0)))
    );

    publish(&remote, 2.0, 2.0).await;
    eventually("peer moved", || {
        h.surface.marker_position(marker) == Some(pos(2.0, 2.0))
    })
    .await;

    h.handle.click(marker);
    assert!(h.handle.flush().await);
    assert_eq!(
        h.router.last_rendered(),
        Some((pos(0.0, 0.0), pos(2.0, 2.0)))
    );
    assert_eq!(h.router.active_count(), 1);
    assert_eq!(h.router.removed_count(), 1);

    h.handle.clear_route();
    assert!(h.handle.flush().await);
    assert_eq!(h.router.active_count(), 0);

    let coordinator = stop(h).await;
    assert_eq!(coordinator.active_route(), None);
}

#[tokio::test]
async fn click_before_local_fix_notifies() {
    let mut h = start().await;
    let remote = remote_peer(&h.hub).await;

    publish(&remote, 5.0, 5.0).await;
    eventually("remote marker", || h.surface.marker_count() == 1).await;
    let marker = h
        .surface
        .find_by_label(&format!("User {}", remote.id()))
        .unwrap();

    h.handle.click(marker);
    assert!(h.handle.flush().await);

    assert_eq!(h.notices.recv().await, Some(Notice::LocationUnavailable));
    assert!(h.router.calls().is_empty());
    stop(h).await;
}

#[tokio::test]
async fn local_error_without_fix_publishes_nothing() {
    let mut h = start().await;
    let remote = remote_peer(&h.hub).await;

    h.feed.fail(PositionError::Timeout);
    assert_eq!(
        h.notices.recv().await,
        Some(Notice::PositionFailed("timed out waiting for position".into()))
    );

    let nothing = tokio::time::timeout(Duration::from_millis(50), remote.recv()).await;
    assert!(nothing.is_err(), "no location may be published");
    assert_eq!(h.surface.marker_count(), 0);

    let coordinator = stop(h).await;
    assert_eq!(coordinator.peer_state(&PeerId::local()), PeerState::Unknown);
}

#[tokio::test]
async fn remote_position_matches_published_sample() {
    let h = start().await;
    let remote = remote_peer(&h.hub).await;
    let lng = 15.978 + 0.0003;

    h.feed.fix(pos(45.8130, 15.9780));
    publish(&remote, 45.8132, lng).await;
    eventually("both markers", || h.surface.marker_count() == 2).await;
    let marker = h
        .surface
        .find_by_label(&format!("User {}", remote.id()))
        .unwrap();
    assert_eq!(h.surface.marker_position(marker), Some(pos(45.8132, lng)));

    h.handle.click(marker);
    assert!(h.handle.flush().await);
    assert_eq!(
        h.router.last_rendered(),
        Some((pos(45.8130, 15.9780), pos(45.8132, lng)))
    );

    let remote_id = remote.id().clone();
    let coordinator = stop(h).await;
    assert_eq!(coordinator.registry().get(&remote_id), Some(pos(45.8132, lng)));
}
