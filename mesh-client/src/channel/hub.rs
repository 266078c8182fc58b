//! In-process relay for demos and tests.
//!
//! [`MemoryHub`] plays the part of the relay: each [`HubChannel`] gets a
//! transport-assigned id on join, `location` publishes are tagged with the
//! sender id and fanned out to every other member, and a member leaving is
//! announced to the rest as `disconnect`. A member never receives its own
//! events.

use super::{Channel, ChannelError};
use async_trait::async_trait;
use mesh_types::{InboundEvent, OutboundEvent, PeerDeparture, PeerId, PeerLocation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// In-memory relay shared by all of its [`HubChannel`]s.
#[derive(Debug, Default, Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

#[derive(Debug, Default)]
struct HubInner {
    members: HashMap<PeerId, mpsc::UnboundedSender<Vec<u8>>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a channel with a fresh transport-assigned id.
    ///
    /// The channel joins the hub on `connect()`.
    pub fn join(&self) -> HubChannel {
        // 32 hex chars: never empty, never the reserved local id.
        let id = PeerId::new(uuid::Uuid::new_v4().simple().to_string())
            .unwrap_or_else(|_| unreachable!("uuid strings are never empty"));
        let (tx, rx) = mpsc::unbounded_channel();
        HubChannel {
            id,
            hub: self.clone(),
            pending_tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            connected: AtomicBool::new(false),
        }
    }

    /// Ids of connected members.
    pub fn member_ids(&self) -> Vec<PeerId> {
        self.inner().members.keys().cloned().collect()
    }

    /// Number of connected members.
    pub fn len(&self) -> usize {
        self.inner().members.len()
    }

    /// Whether no member is connected.
    pub fn is_empty(&self) -> bool {
        self.inner().members.is_empty()
    }

    fn register(&self, id: &PeerId, tx: mpsc::UnboundedSender<Vec<u8>>) {
        let mut inner = self.inner();
        inner.members.insert(id.clone(), tx);
        tracing::debug!("Hub: {} joined (members: {})", id, inner.members.len());
    }

    fn leave(&self, id: &PeerId) {
        let mut inner = self.inner();
        if inner.members.remove(id).is_none() {
            return;
        }
        tracing::debug!("Hub: {} left (members: {})", id, inner.members.len());
        let event = InboundEvent::Disconnect(PeerDeparture { id: id.clone() });
        Self::fan_out(&inner, id, &event);
    }

    fn publish(&self, from: &PeerId, event: OutboundEvent) {
        let inner = self.inner();
        let inbound = match event {
            OutboundEvent::Location(update) => {
                InboundEvent::Location(PeerLocation::new(from.clone(), update))
            }
        };
        Self::fan_out(&inner, from, &inbound);
    }

    fn fan_out(inner: &HubInner, from: &PeerId, event: &InboundEvent) {
        let frame = match event.to_bytes() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Hub: failed to encode {} event: {}", event.name(), e);
                return;
            }
        };
        for (id, tx) in inner.members.iter().filter(|(id, _)| *id != from) {
            if tx.send(frame.clone()).is_err() {
                tracing::debug!("Hub: member {} no longer receiving", id);
            }
        }
    }
}

/// One member's connection to a [`MemoryHub`].
#[derive(Debug)]
pub struct HubChannel {
    id: PeerId,
    hub: MemoryHub,
    pending_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: AtomicBool,
}

impl HubChannel {
    /// Transport-assigned id of this member, as other members see it.
    pub fn id(&self) -> &PeerId {
        &self.id
    }
}

#[async_trait]
impl Channel for HubChannel {
    async fn connect(&self, address: &str) -> Result<(), ChannelError> {
        let tx = self
            .pending_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ChannelError::ConnectionFailed("hub channels cannot rejoin".into()))?;
        tracing::debug!("Hub: {} connecting via {:?}", self.id, address);
        self.hub.register(&self.id, tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let event =
            OutboundEvent::from_bytes(frame).map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        self.hub.publish(&self.id, event);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(ChannelError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), ChannelError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.hub.leave(&self.id);
        }
        Ok(())
    }
}
