//! # geomesh-client
//!
//! Runtime for geomesh live position sharing.
//!
//! This crate performs the I/O that `geomesh-core` leaves out:
//!
//! - **Channel Abstraction**: pluggable pub/sub transport ([`Channel`]), with
//!   a [`MockChannel`] for tests and an in-process [`MemoryHub`] relay
//! - **Position Source Adapter**: [`PositionWatch`] applies timeout and
//!   staleness rules to a raw [`PositionSource`]
//! - **Session Driver**: [`Session`] feeds every event source into one
//!   consumer task that drives the core [`Coordinator`](mesh_core::Coordinator)
//!
//! ## Example
//!
//! ```ignore
//! use geomesh_client::{Config, MemoryHub, Session};
//!
//! let hub = MemoryHub::new();
//! let (mut session, handle) = Session::new(&config, hub.join(), surface, router);
//! session.attach_position(watch);
//! let coordinator = session.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod position;
pub mod session;

pub use channel::{Channel, ChannelError, HubChannel, MemoryHub, MockChannel};
pub use config::{ChannelConfig, Config, ConfigError, PositionConfig, ViewConfig};
pub use position::{
    FeedHandle, FeedSource, PositionError, PositionSource, PositionWatch, WatchOptions,
};
pub use session::{Session, SessionError, SessionHandle};
