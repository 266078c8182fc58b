//! Channel abstraction for geomesh.
//!
//! This module provides a pluggable pub/sub layer that abstracts the
//! relay-mediated transport connecting all peers.
//!
//! # Design
//!
//! The channel trait is async and frame-oriented:
//! - `connect()` joins the relay
//! - `send()` publishes an encoded [`OutboundEvent`](mesh_types::OutboundEvent)
//! - `recv()` yields encoded [`InboundEvent`](mesh_types::InboundEvent)s
//! - `close()` leaves; the relay announces a `disconnect` for us
//!
//! Delivery is at-least-once and ordered per sender. Nothing is promised
//! across senders.

mod hub;
mod mock;

pub use hub::{HubChannel, MemoryHub};
pub use mock::MockChannel;

use async_trait::async_trait;
use thiserror::Error;

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Channel trait for exchanging named events with other peers.
///
/// Implementations handle the underlying relay connection
/// (WebSocket, in-memory hub, mock, etc).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Connect to the relay identified by the given address.
    async fn connect(&self, address: &str) -> Result<(), ChannelError>;

    /// Publish an encoded event.
    async fn send(&self, frame: &[u8]) -> Result<(), ChannelError>;

    /// Receive the next encoded event.
    ///
    /// Waits until a frame is available or the connection closes. Must be
    /// cancel-safe: dropping the future must not lose a frame.
    async fn recv(&self) -> Result<Vec<u8>, ChannelError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Leave the channel.
    async fn close(&self) -> Result<(), ChannelError>;
}
