//! Simulate a local session against walking peers.
//!
//! Everything runs in-process: the local session and every simulated peer
//! join one [`MemoryHub`]. The local position comes from a [`FeedSource`],
//! the map and router are the recording sinks from `mesh-core`.

use anyhow::{bail, Context, Result};
use mesh_client::{
    Channel, Config, FeedHandle, FeedSource, HubChannel, MemoryHub, PositionWatch, Session,
    SessionHandle,
};
use mesh_core::{MarkerHandle, Notice, RecordingRouter, RecordingSurface, RouteRequest};
use mesh_types::{OutboundEvent, PeerId, Position};
use std::time::Duration;
use tokio::sync::mpsc;

/// Starting point of every walk.
const ORIGIN: (f64, f64) = (45.8130, 15.9780);

/// Spacing between the lanes peers walk in, in degrees of latitude.
const LANE_SPACING: f64 = 0.001;

/// Distance covered per step, in degrees.
const STEP_LAT: f64 = 0.0002;
const STEP_LNG: f64 = 0.0003;

/// How long to wait for the session to catch up with a step.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Final state of a simulation run.
#[derive(Debug)]
pub struct Report {
    /// Registry contents as `(label, position)`, local peer first.
    pub peers: Vec<(String, Position)>,
    /// The route on the map when the session stopped.
    pub route: Option<RouteRequest>,
    /// Number of routes drawn over the run.
    pub routes_drawn: usize,
    /// Simulated peers that left before the end.
    pub departed: Vec<PeerId>,
    /// Notices raised by the session.
    pub notices: Vec<Notice>,
}

/// Run the simulate command.
pub async fn run(config: &Config, peers: usize, steps: usize) -> Result<()> {
    println!("Simulating {} peer(s) for {} step(s)...", peers, steps);
    let report = simulate(config, peers, steps).await?;

    println!();
    println!("Registry:");
    for (label, position) in &report.peers {
        println!("  {:<40} {}", label, position);
    }
    for id in &report.departed {
        println!("  {:<40} (left)", id.label());
    }

    println!();
    match report.route {
        Some(route) => println!("Route: {} -> {}", route.start, route.end),
        None => println!("Route: none"),
    }
    println!("Routes drawn: {}", report.routes_drawn);

    if !report.notices.is_empty() {
        println!();
        println!("Notices:");
        for notice in &report.notices {
            println!("  {}", notice);
        }
    }

    Ok(())
}

/// Drive a full simulation and return what the session ended up with.
pub async fn simulate(config: &Config, peers: usize, steps: usize) -> Result<Report> {
    let hub = MemoryHub::new();
    let surface = RecordingSurface::new();
    let router = RecordingRouter::new();
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    let (session, handle) = Session::new(config, hub.join(), surface.clone(), router.clone());
    let mut session = session.with_notices(notice_tx);
    let (source, feed) = FeedSource::new();
    session.attach_position(PositionWatch::new(source, config.position.watch_options()));
    let task = tokio::spawn(session.run());

    settle("local session to join", || hub.len() == 1).await?;

    let mut remotes = Vec::with_capacity(peers);
    for _ in 0..peers {
        let remote = hub.join();
        remote
            .connect(&config.channel.address)
            .await
            .context("Failed to connect simulated peer")?;
        remotes.push(remote);
    }
    tracing::info!(peers, steps, "simulation started");

    for step in 0..steps {
        walk_step(&feed, &remotes, step).await?;
        settle("markers to follow their peers", || {
            in_place(&surface, &remotes, step)
        })
        .await?;

        if let Some(first) = remotes.first() {
            let marker = surface
                .find_by_label(&first.id().label())
                .context("first peer has no marker")?;
            click_and_wait(&handle, marker)
                .await
                .with_context(|| format!("step {}", step + 1))?;
        }

        match router.last_rendered() {
            Some((start, end)) if !remotes.is_empty() => {
                println!("  step {:>3}: route {} -> {}", step + 1, start, end)
            }
            _ => println!("  step {:>3}: you are at {}", step + 1, walk(0, step)?),
        }
    }

    let mut departed = Vec::new();
    if steps > 0 && remotes.len() > 1 {
        if let Some(leaving) = remotes.pop() {
            leaving.close().await.context("Failed to close simulated peer")?;
            let expected = remotes.len() + 1;
            settle("departed marker to disappear", || {
                surface.marker_count() == expected
            })
            .await?;
            departed.push(leaving.id().clone());
        }
    }

    if !handle.shutdown() {
        bail!("session ended before shutdown");
    }
    let coordinator = task.await.context("session task panicked")??;

    let mut listed: Vec<(String, Position)> = coordinator
        .registry()
        .peers()
        .map(|entry| (entry.id.label(), entry.position))
        .collect();
    listed.sort_by_key(|(label, _)| (label != &PeerId::local().label(), label.clone()));

    let mut notices = Vec::new();
    while let Ok(notice) = notice_rx.try_recv() {
        notices.push(notice);
    }

    Ok(Report {
        peers: listed,
        route: coordinator.active_route(),
        routes_drawn: router.removed_count() + router.active_count(),
        departed,
        notices,
    })
}

/// Position of lane `lane` after `step` steps. Lane 0 is the local peer.
fn walk(lane: usize, step: usize) -> Result<Position> {
    let latitude = ORIGIN.0 + lane as f64 * LANE_SPACING + step as f64 * STEP_LAT;
    let longitude = ORIGIN.1 + step as f64 * STEP_LNG;
    Ok(Position::new(latitude, longitude)?)
}

async fn walk_step(feed: &FeedHandle, remotes: &[HubChannel], step: usize) -> Result<()> {
    if !feed.fix(walk(0, step)?) {
        bail!("local position feed closed");
    }
    for (i, remote) in remotes.iter().enumerate() {
        let frame = OutboundEvent::location(walk(i + 1, step)?).to_bytes()?;
        remote
            .send(&frame)
            .await
            .context("Failed to publish simulated position")?;
    }
    Ok(())
}

/// Click `marker` and wait until the session has applied the click.
async fn click_and_wait(handle: &SessionHandle, marker: MarkerHandle) -> Result<()> {
    if !handle.click(marker) || !handle.flush().await {
        bail!("session ended before the click was applied");
    }
    Ok(())
}

fn in_place(surface: &RecordingSurface, remotes: &[HubChannel], step: usize) -> bool {
    let at = |label: String, lane: usize| {
        let expected = walk(lane, step).ok();
        surface
            .find_by_label(&label)
            .and_then(|marker| surface.marker_position(marker))
            == expected
    };
    at(PeerId::local().label(), 0)
        && remotes
            .iter()
            .enumerate()
            .all(|(i, remote)| at(remote.id().label(), i + 1))
}

async fn settle(what: &str, mut condition: impl FnMut() -> bool) -> Result<()> {
    let waited = tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    if waited.is_err() {
        bail!("timed out waiting for {}", what);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulate_routes_to_first_peer() {
        let report = simulate(&Config::default(), 2, 3).await.unwrap();

        assert_eq!(report.peers.len(), 2);
        assert_eq!(report.peers[0].0, "Your location");
        assert_eq!(report.peers[0].1, walk(0, 2).unwrap());
        assert_eq!(report.peers[1].1, walk(1, 2).unwrap());
        assert_eq!(report.departed.len(), 1);

        let route = report.route.unwrap();
        assert_eq!(route.start, walk(0, 2).unwrap());
        assert_eq!(route.end, walk(1, 2).unwrap());
        assert_eq!(report.routes_drawn, 3);
        assert!(report.notices.is_empty());
    }

    #[tokio::test]
    async fn simulate_alone_has_no_route() {
        let report = simulate(&Config::default(), 0, 2).await.unwrap();

        assert_eq!(report.peers.len(), 1);
        assert!(report.route.is_none());
        assert_eq!(report.routes_drawn, 0);
    }

    #[tokio::test]
    async fn simulate_without_steps_sees_nobody() {
        let report = simulate(&Config::default(), 3, 0).await.unwrap();

        assert!(report.peers.is_empty());
        assert!(report.departed.is_empty());
        assert!(report.route.is_none());
    }

    #[tokio::test]
    async fn click_after_session_ended_fails() {
        let (session, handle) = Session::new(
            &Config::default(),
            MemoryHub::new().join(),
            RecordingSurface::new(),
            RecordingRouter::new(),
        );
        drop(session);

        let result = click_and_wait(&handle, MarkerHandle::new(1)).await;
        assert!(result.is_err());
    }

    #[test]
    fn off_grid_coordinates_survive_the_hub() {
        // 15.978 + 0.0003 has no short decimal form.
        let sent = walk(1, 1).unwrap();
        let frame = OutboundEvent::location(sent).to_bytes().unwrap();
        let received = OutboundEvent::from_bytes(&frame).unwrap();
        assert_eq!(received, OutboundEvent::location(sent));
    }

    #[test]
    fn lanes_are_apart() {
        let a = walk(0, 4).unwrap();
        let b = walk(1, 4).unwrap();
        assert_eq!(a.longitude(), b.longitude());
        assert!((b.latitude() - a.latitude() - LANE_SPACING).abs() < 1e-9);
    }
}
