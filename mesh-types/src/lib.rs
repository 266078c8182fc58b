//! # geomesh-types
//!
//! Wire format types for geomesh live position sharing.
//!
//! This crate provides the foundational types used across all geomesh crates:
//! - [`PeerId`], [`Position`] - Identity and location types
//! - [`OutboundEvent`], [`InboundEvent`] - Named channel events and their payloads
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;

pub use error::WireError;
pub use events::{
    InboundEvent, LocationUpdate, OutboundEvent, PeerDeparture, PeerLocation, EVENT_DISCONNECT,
    EVENT_LOCATION,
};
pub use ids::{PeerId, Position, LOCAL_PEER};
