//! Recording sinks for testing.
//!
//! [`RecordingSurface`] and [`RecordingRouter`] stand in for the map and
//! routing engines. Clones share state, so a test can hand one clone to the
//! coordinator and inspect the other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mesh_types::Position;

use crate::surface::{MarkerHandle, MarkerSurface, RouteError, RouteHandle, RoutingEngine};

/// Marker surface that records every call.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    inner: Arc<Mutex<SurfaceInner>>,
}

#[derive(Debug, Default)]
struct SurfaceInner {
    next_id: u64,
    markers: HashMap<MarkerHandle, (Position, String)>,
    created: u64,
    moves: u64,
    removed: Vec<MarkerHandle>,
    clickable: HashSet<MarkerHandle>,
    viewport: Option<(Position, u8)>,
}

impl RecordingSurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, SurfaceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of markers currently on the surface.
    pub fn marker_count(&self) -> usize {
        self.inner().markers.len()
    }

    /// Total number of markers ever created.
    pub fn created_count(&self) -> u64 {
        self.inner().created
    }

    /// Total number of marker moves.
    pub fn move_count(&self) -> u64 {
        self.inner().moves
    }

    /// Rendered position of a marker, if it is still on the surface.
    pub fn marker_position(&self, handle: MarkerHandle) -> Option<Position> {
        self.inner().markers.get(&handle).map(|(p, _)| *p)
    }

    /// Popup label of a marker, if it is still on the surface.
    pub fn marker_label(&self, handle: MarkerHandle) -> Option<String> {
        self.inner().markers.get(&handle).map(|(_, l)| l.clone())
    }

    /// Find a marker on the surface by its popup label.
    pub fn find_by_label(&self, label: &str) -> Option<MarkerHandle> {
        self.inner()
            .markers
            .iter()
            .find(|(_, (_, l))| l == label)
            .map(|(handle, _)| *handle)
    }

    /// Markers removed so far, in order.
    pub fn removed(&self) -> Vec<MarkerHandle> {
        self.inner().removed.clone()
    }

    /// Whether clicks are reported for `handle`.
    pub fn is_clickable(&self, handle: MarkerHandle) -> bool {
        self.inner().clickable.contains(&handle)
    }

    /// Last viewport center and zoom.
    pub fn viewport(&self) -> Option<(Position, u8)> {
        self.inner().viewport
    }
}

impl MarkerSurface for RecordingSurface {
    fn create_marker(&mut self, position: Position, label: &str) -> MarkerHandle {
        let mut inner = self.inner();
        inner.next_id += 1;
        let handle = MarkerHandle::new(inner.next_id);
        inner.markers.insert(handle, (position, label.to_string()));
        inner.created += 1;
        handle
    }

    fn move_marker(&mut self, handle: MarkerHandle, position: Position) {
        let mut inner = self.inner();
        if let Some(entry) = inner.markers.get_mut(&handle) {
            entry.0 = position;
            inner.moves += 1;
        }
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        let mut inner = self.inner();
        if inner.markers.remove(&handle).is_some() {
            inner.clickable.remove(&handle);
            inner.removed.push(handle);
        }
    }

    fn set_viewport(&mut self, center: Position, zoom: u8) {
        self.inner().viewport = Some((center, zoom));
    }

    fn on_click(&mut self, handle: MarkerHandle) {
        self.inner().clickable.insert(handle);
    }
}

/// A call made on a [`RecordingRouter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteCall {
    /// `render_route` succeeded.
    Rendered {
        /// Handle returned to the caller.
        handle: RouteHandle,
        /// Route start.
        start: Position,
        /// Route end.
        end: Position,
    },
    /// `render_route` failed.
    Failed,
    /// `remove_route` was called.
    Removed(RouteHandle),
}

/// Routing engine that records every call.
#[derive(Debug, Default, Clone)]
pub struct RecordingRouter {
    inner: Arc<Mutex<RouterInner>>,
}

#[derive(Debug, Default)]
struct RouterInner {
    next_id: u64,
    calls: Vec<RouteCall>,
    active: HashSet<RouteHandle>,
    fail_next: Option<RouteError>,
}

impl RecordingRouter {
    /// Create an idle router.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, RouterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cause the next `render_route` to fail with the given error.
    pub fn fail_next(&self, error: RouteError) {
        self.inner().fail_next = Some(error);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<RouteCall> {
        self.inner().calls.clone()
    }

    /// Number of routes currently rendered.
    pub fn active_count(&self) -> usize {
        self.inner().active.len()
    }

    /// Number of `remove_route` calls so far.
    pub fn removed_count(&self) -> usize {
        self.inner()
            .calls
            .iter()
            .filter(|c| matches!(c, RouteCall::Removed(_)))
            .count()
    }

    /// Start and end of the most recent successful render.
    pub fn last_rendered(&self) -> Option<(Position, Position)> {
        self.inner().calls.iter().rev().find_map(|c| match c {
            RouteCall::Rendered { start, end, .. } => Some((*start, *end)),
            _ => None,
        })
    }
}

impl RoutingEngine for RecordingRouter {
    fn render_route(&mut self, start: Position, end: Position) -> Result<RouteHandle, RouteError> {
        let mut inner = self.inner();
        if let Some(error) = inner.fail_next.take() {
            inner.calls.push(RouteCall::Failed);
            return Err(error);
        }
        inner.next_id += 1;
        let handle = RouteHandle::new(inner.next_id);
        inner.active.insert(handle);
        inner.calls.push(RouteCall::Rendered { handle, start, end });
        Ok(handle)
    }

    fn remove_route(&mut self, handle: RouteHandle) {
        let mut inner = self.inner();
        inner.active.remove(&handle);
        inner.calls.push(RouteCall::Removed(handle));
    }
}
