//! Route overlay: at most one rendered route at a time.

use mesh_types::Position;

use crate::surface::{RouteError, RouteHandle, RoutingEngine};

/// A request to route from the local peer to a remote peer.
///
/// Built at click time from current registry positions; never stored by
/// the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    /// Local peer's current position.
    pub start: Position,
    /// Target peer's current position.
    pub end: Position,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRoute {
    handle: RouteHandle,
    request: RouteRequest,
}

/// Owner of the single active route slot.
#[derive(Debug)]
pub struct RouteOverlay<E: RoutingEngine> {
    engine: E,
    active: Option<ActiveRoute>,
}

impl<E: RoutingEngine> RouteOverlay<E> {
    /// Create an overlay with no active route.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            active: None,
        }
    }

    /// Replace the active route with a new one.
    ///
    /// Any existing route is torn down first, even if the engine is still
    /// computing it. If the new render fails, the slot stays empty.
    pub fn show(&mut self, request: RouteRequest) -> Result<RouteHandle, RouteError> {
        if let Some(previous) = self.active.take() {
            self.engine.remove_route(previous.handle);
        }
        let handle = self.engine.render_route(request.start, request.end)?;
        self.active = Some(ActiveRoute { handle, request });
        Ok(handle)
    }

    /// Tear down the active route. Returns whether one existed.
    pub fn clear(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                self.engine.remove_route(active.handle);
                true
            }
            None => false,
        }
    }

    /// Handle of the active route.
    pub fn active(&self) -> Option<RouteHandle> {
        self.active.map(|a| a.handle)
    }

    /// Request that produced the active route.
    pub fn active_request(&self) -> Option<RouteRequest> {
        self.active.map(|a| a.request)
    }

    /// The routing engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }
}
