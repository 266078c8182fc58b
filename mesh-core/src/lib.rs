//! # geomesh-core
//!
//! Pure logic for geomesh (no async, no network I/O, instant tests).
//!
//! This crate owns the only real state of a position-sharing session:
//! - [`PeerRegistry`] - peer id to last-known position and marker handle
//! - [`RouteOverlay`] - the single active route rendering
//! - [`Coordinator`] - applies local samples, channel events and marker
//!   clicks to the two, and emits [`Action`]s for the caller to execute
//!
//! ## Design Philosophy
//!
//! Rendering and routing are reached through the synchronous
//! [`MarkerSurface`] and [`RoutingEngine`] sinks. Everything that needs
//! async I/O (publishing on the channel, showing notices) is returned as an
//! [`Action`] and performed by `geomesh-client`, which feeds every input
//! through one consumer task so mutations are always sequential.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod mock;
pub mod overlay;
pub mod registry;
pub mod surface;

pub use coordinator::{Action, Coordinator, Input, Notice, PeerState, ViewSettings};
pub use mock::{RecordingRouter, RecordingSurface, RouteCall};
pub use overlay::{RouteOverlay, RouteRequest};
pub use registry::{PeerEntry, PeerRegistry, Sighting};
pub use surface::{MarkerHandle, MarkerSurface, RouteError, RouteHandle, RoutingEngine};
