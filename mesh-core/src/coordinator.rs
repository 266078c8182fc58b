//! Sync coordinator for geomesh.
//!
//! The coordinator takes inputs (local samples, channel events, marker
//! clicks) and applies them to the [`PeerRegistry`] and [`RouteOverlay`] it
//! owns. Anything that needs async I/O is returned as a list of [`Action`]s
//! for the caller (geomesh-client) to execute.
//!
//! Every input runs to completion before the next one is applied, so no
//! locking is needed. Callers must never apply inputs concurrently.
//!
//! Per peer id the lifecycle is `Unknown -> Tracked -> Removed`. A removed
//! id that is sighted again starts a fresh `Tracked` lifecycle with a new
//! marker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use mesh_types::{InboundEvent, OutboundEvent, PeerId, PeerLocation, Position};

use crate::overlay::{RouteOverlay, RouteRequest};
use crate::registry::PeerRegistry;
use crate::surface::{MarkerHandle, MarkerSurface, RoutingEngine};

/// Default viewport zoom when recentering on the local peer.
pub const DEFAULT_ZOOM: u8 = 16;

/// Default maximum zoom supported by the tile layer.
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// Number of departed peer ids remembered for [`Coordinator::peer_state`].
///
/// Older departures fall back to [`PeerState::Unknown`].
pub const DEPARTED_HISTORY: usize = 1024;

/// Inputs to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A local position sample.
    LocalFix(Position),
    /// The position source failed.
    LocalError {
        /// Error message describing the failure.
        error: String,
    },
    /// An event received on the channel.
    Remote(InboundEvent),
    /// The user clicked a marker.
    MarkerClicked(MarkerHandle),
    /// The user dismissed the route overlay.
    ClearRoute,
}

/// Actions to be executed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Publish an event on the channel.
    Publish(OutboundEvent),
    /// Show a transient, non-fatal notice to the user.
    Notify(Notice),
}

/// User-visible, non-fatal notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A route was requested before any local position was known.
    LocationUnavailable,
    /// The position source reported an error.
    PositionFailed(String),
    /// The routing engine could not produce a route.
    RouteFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocationUnavailable => f.write_str("Unable to get your current location."),
            Self::PositionFailed(error) => write!(f, "Location error: {}", error),
            Self::RouteFailed(error) => write!(f, "Could not show route: {}", error),
        }
    }
}

/// Lifecycle of a peer id as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Never sighted.
    Unknown,
    /// Has a registry entry and a marker.
    Tracked,
    /// Disconnected; entry and marker destroyed. Only the most recent
    /// [`DEPARTED_HISTORY`] departures are remembered.
    Removed,
}

/// Viewport settings applied when recentering on the local peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    zoom: u8,
    max_zoom: u8,
}

impl ViewSettings {
    /// Create settings, clamping `zoom` to `max_zoom`.
    pub fn new(zoom: u8, max_zoom: u8) -> Self {
        Self {
            zoom: zoom.min(max_zoom),
            max_zoom,
        }
    }

    /// Zoom level used when recentering.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Maximum zoom level.
    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM, DEFAULT_MAX_ZOOM)
    }
}

/// Recently departed peer ids, oldest evicted first.
#[derive(Debug)]
struct Departures {
    capacity: usize,
    order: VecDeque<PeerId>,
    ids: HashSet<PeerId>,
}

impl Departures {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    fn record(&mut self, id: PeerId) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }

    fn remove(&mut self, id: &PeerId) {
        if self.ids.remove(id) {
            self.order.retain(|d| d != id);
        }
    }

    fn contains(&self, id: &PeerId) -> bool {
        self.ids.contains(id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Orchestrates the registry and the route overlay.
#[derive(Debug)]
pub struct Coordinator<S: MarkerSurface, E: RoutingEngine> {
    registry: PeerRegistry<S>,
    overlay: RouteOverlay<E>,
    view: ViewSettings,
    /// Click targets, registered once per marker at first sighting.
    click_targets: HashMap<MarkerHandle, PeerId>,
    departed: Departures,
}

impl<S: MarkerSurface, E: RoutingEngine> Coordinator<S, E> {
    /// Create a coordinator with default view settings.
    pub fn new(surface: S, engine: E) -> Self {
        Self::with_view(surface, engine, ViewSettings::default())
    }

    /// Create a coordinator with explicit view settings.
    pub fn with_view(surface: S, engine: E, view: ViewSettings) -> Self {
        Self {
            registry: PeerRegistry::new(surface),
            overlay: RouteOverlay::new(engine),
            view,
            click_targets: HashMap::new(),
            departed: Departures::new(DEPARTED_HISTORY),
        }
    }

    /// Apply an input and return the actions to execute.
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        match input {
            Input::LocalFix(position) => self.on_local_fix(position),
            Input::LocalError { error } => vec![Action::Notify(Notice::PositionFailed(error))],
            Input::Remote(InboundEvent::Location(location)) => {
                self.on_remote_location(location);
                vec![]
            }
            Input::Remote(InboundEvent::Disconnect(departure)) => {
                self.on_disconnect(&departure.id);
                vec![]
            }
            Input::MarkerClicked(handle) => self.on_marker_clicked(handle),
            Input::ClearRoute => {
                self.overlay.clear();
                vec![]
            }
        }
    }

    fn on_local_fix(&mut self, position: Position) -> Vec<Action> {
        self.registry.upsert(&PeerId::local(), position);
        self.registry
            .surface_mut()
            .set_viewport(position, self.view.zoom());
        vec![Action::Publish(OutboundEvent::location(position))]
    }

    fn on_remote_location(&mut self, location: PeerLocation) {
        // The local position only ever comes from the position source.
        if location.id.is_local() {
            return;
        }
        let Ok(position) = location.position() else {
            return;
        };

        let sighting = self.registry.upsert(&location.id, position);
        if sighting.is_new() {
            let handle = sighting.handle();
            self.registry.surface_mut().on_click(handle);
            self.click_targets.insert(handle, location.id.clone());
            self.departed.remove(&location.id);
        }
    }

    fn on_disconnect(&mut self, id: &PeerId) {
        if id.is_local() {
            return;
        }
        if let Some(handle) = self.registry.marker(id) {
            self.click_targets.remove(&handle);
        }
        if self.registry.remove(id) {
            self.departed.record(id.clone());
        }
    }

    fn on_marker_clicked(&mut self, handle: MarkerHandle) -> Vec<Action> {
        // Clicks on the local marker or a removed peer's marker do nothing.
        let Some(target) = self.click_targets.get(&handle) else {
            return vec![];
        };
        // Read both ends at click time, never from when the handler was attached.
        let Some(end) = self.registry.get(target) else {
            return vec![];
        };
        let Some(start) = self.local_position() else {
            return vec![Action::Notify(Notice::LocationUnavailable)];
        };

        match self.overlay.show(RouteRequest { start, end }) {
            Ok(_) => vec![],
            Err(e) => vec![Action::Notify(Notice::RouteFailed(e.to_string()))],
        }
    }

    /// Most recent local position, if any sample has arrived.
    pub fn local_position(&self) -> Option<Position> {
        self.registry.get(&PeerId::local())
    }

    /// Lifecycle state of `id`.
    pub fn peer_state(&self, id: &PeerId) -> PeerState {
        if self.registry.contains(id) {
            PeerState::Tracked
        } else if self.departed.contains(id) {
            PeerState::Removed
        } else {
            PeerState::Unknown
        }
    }

    /// The request behind the currently displayed route.
    pub fn active_route(&self) -> Option<RouteRequest> {
        self.overlay.active_request()
    }

    /// The peer registry.
    pub fn registry(&self) -> &PeerRegistry<S> {
        &self.registry
    }

    /// The route overlay.
    pub fn overlay(&self) -> &RouteOverlay<E> {
        &self.overlay
    }

    /// Viewport settings.
    pub fn view(&self) -> ViewSettings {
        self.view
    }
}
