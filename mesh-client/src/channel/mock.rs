//! Mock channel for testing.
//!
//! Plays the relay for a single session: inbound events are scripted ahead
//! of time, published events are decoded and recorded the way a relay
//! would see them.

use super::{Channel, ChannelError};
use async_trait::async_trait;
use mesh_types::{InboundEvent, OutboundEvent, PeerDeparture, PeerId, PeerLocation, Position};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Channel operation a scripted fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Connect,
    Send,
    Recv,
}

/// Mock channel for testing.
///
/// `recv()` drains the scripted inbound queue and then reports the
/// connection closed. `send()` only accepts frames that decode as an
/// [`OutboundEvent`], like the relay does.
#[derive(Debug, Default, Clone)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

#[derive(Debug, Default)]
struct MockChannelInner {
    address: Option<String>,
    connected: bool,
    inbound: VecDeque<Vec<u8>>,
    published: Vec<OutboundEvent>,
    faults: VecDeque<(Op, String)>,
}

impl MockChannelInner {
    /// Take the oldest scripted fault for `op`, if any.
    fn take_fault(&mut self, op: Op) -> Option<String> {
        let index = self.faults.iter().position(|(o, _)| *o == op)?;
        self.faults.remove(index).map(|(_, error)| error)
    }
}

impl MockChannel {
    /// Create a disconnected mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script a raw inbound frame, valid or not.
    pub fn queue_frame(&self, frame: Vec<u8>) {
        self.inner().inbound.push_back(frame);
    }

    /// Script an inbound event.
    pub fn queue_event(&self, event: &InboundEvent) {
        match event.to_bytes() {
            Ok(frame) => self.queue_frame(frame),
            Err(e) => tracing::warn!("MockChannel: cannot encode {} event: {}", event.name(), e),
        }
    }

    /// Script a remote peer's location.
    pub fn queue_location(&self, id: PeerId, position: Position) {
        self.queue_event(&InboundEvent::Location(PeerLocation::new(
            id,
            position.into(),
        )));
    }

    /// Script a remote peer leaving.
    pub fn queue_disconnect(&self, id: PeerId) {
        self.queue_event(&InboundEvent::Disconnect(PeerDeparture { id }));
    }

    /// Events published so far, in order.
    pub fn sent_events(&self) -> Vec<OutboundEvent> {
        self.inner().published.clone()
    }

    /// Positions published so far, in order.
    pub fn sent_positions(&self) -> Vec<Position> {
        self.inner()
            .published
            .iter()
            .filter_map(|event| match event {
                OutboundEvent::Location(update) => update.position().ok(),
            })
            .collect()
    }

    /// Address passed to the last successful `connect()`.
    pub fn connected_address(&self) -> Option<String> {
        self.inner().address.clone()
    }

    /// Fail one upcoming `connect()`. Faults queue up per operation.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner().faults.push_back((Op::Connect, error.to_string()));
    }

    /// Fail one upcoming `send()`. Faults queue up per operation.
    pub fn fail_next_send(&self, error: &str) {
        self.inner().faults.push_back((Op::Send, error.to_string()));
    }

    /// Fail one upcoming `recv()`. Faults queue up per operation.
    pub fn fail_next_recv(&self, error: &str) {
        self.inner().faults.push_back((Op::Recv, error.to_string()));
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn connect(&self, address: &str) -> Result<(), ChannelError> {
        let mut inner = self.inner();
        if let Some(error) = inner.take_fault(Op::Connect) {
            return Err(ChannelError::ConnectionFailed(error));
        }
        inner.address = Some(address.to_string());
        inner.connected = true;
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), ChannelError> {
        let mut inner = self.inner();
        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }
        if let Some(error) = inner.take_fault(Op::Send) {
            return Err(ChannelError::SendFailed(error));
        }
        let event =
            OutboundEvent::from_bytes(frame).map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        inner.published.push(event);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, ChannelError> {
        let mut inner = self.inner();
        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }
        if let Some(error) = inner.take_fault(Op::Recv) {
            return Err(ChannelError::ReceiveFailed(error));
        }
        inner
            .inbound
            .pop_front()
            .ok_or(ChannelError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.inner().connected
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.inner().connected = false;
        Ok(())
    }
}
