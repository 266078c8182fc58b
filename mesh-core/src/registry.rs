//! Peer registry: who is where, and which marker shows them.
//!
//! The registry owns one [`PeerEntry`] per known peer and the marker that
//! renders it. An entry and its marker are created together on first
//! sighting and destroyed together on removal; the marker handle of a live
//! entry is never replaced.

use std::collections::HashMap;

use mesh_types::{PeerId, Position};

use crate::surface::{MarkerHandle, MarkerSurface};

/// A tracked peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    /// The peer's id.
    pub id: PeerId,
    /// Last known position.
    pub position: Position,
    /// Marker rendering this peer.
    pub marker: MarkerHandle,
}

/// Outcome of [`PeerRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First sighting: a marker was created.
    New(MarkerHandle),
    /// Known peer: its existing marker was moved.
    Moved(MarkerHandle),
}

impl Sighting {
    /// The peer's marker handle.
    pub fn handle(&self) -> MarkerHandle {
        match self {
            Self::New(handle) | Self::Moved(handle) => *handle,
        }
    }

    /// Whether this was the peer's first sighting.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Mapping from peer id to last known position and marker.
///
/// Every operation is total over any [`PeerId`]; there are no error cases.
#[derive(Debug)]
pub struct PeerRegistry<S: MarkerSurface> {
    surface: S,
    entries: HashMap<PeerId, PeerEntry>,
}

impl<S: MarkerSurface> PeerRegistry<S> {
    /// Create an empty registry rendering onto `surface`.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            entries: HashMap::new(),
        }
    }

    /// Record `position` for `id`.
    ///
    /// Creates the entry and its marker on first sighting; otherwise moves
    /// the existing marker in place. Repeating an identical position does
    /// not touch the surface.
    pub fn upsert(&mut self, id: &PeerId, position: Position) -> Sighting {
        if let Some(entry) = self.entries.get_mut(id) {
            if entry.position != position {
                entry.position = position;
                self.surface.move_marker(entry.marker, position);
            }
            return Sighting::Moved(entry.marker);
        }

        let marker = self.surface.create_marker(position, &id.label());
        self.entries.insert(
            id.clone(),
            PeerEntry {
                id: id.clone(),
                position,
                marker,
            },
        );
        Sighting::New(marker)
    }

    /// Remove `id` and detach its marker.
    ///
    /// Returns whether an entry was removed. Absent ids and the local peer
    /// are no-ops.
    pub fn remove(&mut self, id: &PeerId) -> bool {
        if id.is_local() {
            return false;
        }
        match self.entries.remove(id) {
            Some(entry) => {
                self.surface.remove_marker(entry.marker);
                true
            }
            None => false,
        }
    }

    /// Last known position of `id`.
    pub fn get(&self, id: &PeerId) -> Option<Position> {
        self.entries.get(id).map(|e| e.position)
    }

    /// Marker of `id`.
    pub fn marker(&self, id: &PeerId) -> Option<MarkerHandle> {
        self.entries.get(id).map(|e| e.marker)
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of tracked peers, including the local peer once sampled.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no peer is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over tracked peers in no particular order.
    pub fn peers(&self) -> impl Iterator<Item = &PeerEntry> {
        self.entries.values()
    }

    /// The rendering surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The rendering surface, mutably (viewport changes).
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingSurface;

    fn pos(lat: f64, lng: f64) -> Position {
        Position::new(lat, lng).unwrap()
    }

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    #[test]
    fn first_upsert_creates_marker() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());

        let sighting = registry.upsert(&peer("A"), pos(1.0, 1.0));

        assert!(sighting.is_new());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&peer("A")), Some(pos(1.0, 1.0)));
        assert_eq!(surface.created_count(), 1);
        assert_eq!(
            surface.marker_label(sighting.handle()).as_deref(),
            Some("User A")
        );
    }

    #[test]
    fn repeated_upserts_create_exactly_one_marker() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());
        let id = peer("A");

        let first = registry.upsert(&id, pos(0.0, 0.0)).handle();
        let mut last = first;
        for i in 1..=10 {
            let sighting = registry.upsert(&id, pos(i as f64, -(i as f64)));
            assert!(!sighting.is_new());
            last = sighting.handle();
        }

        assert_eq!(first, last, "marker handle must never be replaced");
        assert_eq!(surface.created_count(), 1);
        assert_eq!(surface.marker_position(last), Some(pos(10.0, -10.0)));
        assert_eq!(registry.get(&id), Some(pos(10.0, -10.0)));
    }

    #[test]
    fn identical_position_is_idempotent() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());
        let id = peer("A");

        registry.upsert(&id, pos(3.0, 4.0));
        registry.upsert(&id, pos(3.0, 4.0));
        registry.upsert(&id, pos(3.0, 4.0));

        assert_eq!(surface.created_count(), 1);
        assert_eq!(surface.move_count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_detaches_marker() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());
        let handle = registry.upsert(&peer("A"), pos(1.0, 1.0)).handle();

        assert!(registry.remove(&peer("A")));

        assert!(registry.is_empty());
        assert_eq!(registry.get(&peer("A")), None);
        assert_eq!(surface.removed(), vec![handle]);
        assert_eq!(surface.marker_count(), 0);
    }

    #[test]
    fn remove_twice_is_noop() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());
        registry.upsert(&peer("A"), pos(1.0, 1.0));

        assert!(registry.remove(&peer("A")));
        assert!(!registry.remove(&peer("A")));
        assert_eq!(surface.removed().len(), 1);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut registry = PeerRegistry::new(RecordingSurface::new());
        assert!(!registry.remove(&peer("ghost")));
    }

    #[test]
    fn local_peer_cannot_be_removed() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());
        registry.upsert(&PeerId::local(), pos(0.0, 0.0));

        assert!(!registry.remove(&PeerId::local()));
        assert!(registry.contains(&PeerId::local()));
        assert_eq!(surface.marker_count(), 1);
    }

    #[test]
    fn resighting_after_removal_creates_new_marker() {
        let surface = RecordingSurface::new();
        let mut registry = PeerRegistry::new(surface.clone());
        let first = registry.upsert(&peer("A"), pos(1.0, 1.0)).handle();
        registry.remove(&peer("A"));

        let again = registry.upsert(&peer("A"), pos(2.0, 2.0));

        assert!(again.is_new());
        assert_ne!(again.handle(), first);
        assert_eq!(surface.created_count(), 2);
        assert_eq!(surface.marker_count(), 1);
    }

    #[test]
    fn peers_are_independent() {
        let mut registry = PeerRegistry::new(RecordingSurface::new());
        registry.upsert(&peer("A"), pos(1.0, 1.0));
        registry.upsert(&peer("B"), pos(2.0, 2.0));
        registry.remove(&peer("A"));
        registry.upsert(&peer("B"), pos(3.0, 3.0));

        assert_eq!(registry.get(&peer("A")), None);
        assert_eq!(registry.get(&peer("B")), Some(pos(3.0, 3.0)));
        assert_eq!(registry.peers().count(), 1);
    }
}
