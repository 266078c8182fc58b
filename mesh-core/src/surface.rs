//! Sinks for the map-rendering and routing engines.
//!
//! The core never draws anything itself. It asks a [`MarkerSurface`] to
//! create, move and remove markers, and a [`RoutingEngine`] to start and
//! stop route renderings. Both are synchronous: they are called from the
//! single thread of control that owns the registry and overlay.

use mesh_types::Position;
use std::fmt;
use thiserror::Error;

/// Opaque reference to a single rendered marker.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    /// Wrap a surface-issued marker id.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The surface-issued marker id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MarkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkerHandle({})", self.0)
    }
}

/// Opaque reference to a rendered route.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteHandle(u64);

impl RouteHandle {
    /// Wrap an engine-issued route id.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The engine-issued route id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteHandle({})", self.0)
    }
}

/// Route computation failures reported by a [`RoutingEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No path exists between the two positions.
    #[error("no route found: {0}")]
    NoRoute(String),

    /// The engine itself failed (network, quota, etc).
    #[error("routing engine error: {0}")]
    Engine(String),
}

/// Rendering surface that displays peer markers.
pub trait MarkerSurface {
    /// Create a marker at `position` with a popup `label`.
    fn create_marker(&mut self, position: Position, label: &str) -> MarkerHandle;

    /// Move an existing marker.
    fn move_marker(&mut self, handle: MarkerHandle, position: Position);

    /// Detach a marker from the surface.
    fn remove_marker(&mut self, handle: MarkerHandle);

    /// Recenter the viewport.
    fn set_viewport(&mut self, center: Position, zoom: u8);

    /// Start reporting clicks on `handle`.
    ///
    /// Clicks are delivered back to the coordinator as
    /// [`Input::MarkerClicked`](crate::Input::MarkerClicked).
    fn on_click(&mut self, handle: MarkerHandle);
}

/// Routing engine that computes and renders a path between two positions.
pub trait RoutingEngine {
    /// Start rendering a route from `start` to `end`.
    fn render_route(&mut self, start: Position, end: Position) -> Result<RouteHandle, RouteError>;

    /// Tear down a previously rendered route.
    ///
    /// Called immediately even if the engine is still computing the route;
    /// engines must cope with cancelling an in-flight render.
    fn remove_route(&mut self, handle: RouteHandle);
}
