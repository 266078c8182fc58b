//! Named channel events for geomesh.
//!
//! Every frame on the channel is a JSON object of the form
//! `{"event": <name>, "data": <payload>}`. The local peer publishes
//! [`OutboundEvent`]s without an id; the relay tags them with the sender's
//! transport id before fanning them out as [`InboundEvent`]s.

use serde::{Deserialize, Serialize};

use crate::{PeerId, Position, WireError};

/// Event name for position updates (both directions).
pub const EVENT_LOCATION: &str = "location";

/// Event name for peer departure notifications.
pub const EVENT_DISCONNECT: &str = "disconnect";

/// Events published by the local peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// The local peer's current position
    Location(LocationUpdate),
}

impl OutboundEvent {
    /// Build a location event from a local sample.
    pub fn location(position: Position) -> Self {
        Self::Location(position.into())
    }

    /// Logical event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Location(_) => EVENT_LOCATION,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes, validating coordinates.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let event: Self = serde_json::from_slice(bytes).map_err(WireError::Deserialization)?;
        match &event {
            Self::Location(update) => {
                update.position()?;
            }
        }
        Ok(event)
    }
}

/// Events delivered to the local peer by the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum InboundEvent {
    /// A remote peer's current position
    Location(PeerLocation),
    /// A remote peer has left
    Disconnect(PeerDeparture),
}

impl InboundEvent {
    /// Logical event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Location(_) => EVENT_LOCATION,
            Self::Disconnect(_) => EVENT_DISCONNECT,
        }
    }

    /// The remote peer this event is about.
    pub fn peer(&self) -> &PeerId {
        match self {
            Self::Location(location) => &location.id,
            Self::Disconnect(departure) => &departure.id,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes.
    ///
    /// Rejects events naming the reserved local peer id, so neither a
    /// location nor a disconnect for `"self"` can come off the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let event: Self = serde_json::from_slice(bytes).map_err(WireError::Deserialization)?;
        if event.peer().is_local() {
            return Err(WireError::ReservedPeerId(event.peer().to_string()));
        }
        if let Self::Location(location) = &event {
            location.position()?;
        }
        Ok(event)
    }
}

/// Payload of an outbound `location` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl LocationUpdate {
    /// The position carried by this update, if its coordinates are finite.
    pub fn position(&self) -> Result<Position, WireError> {
        Position::new(self.latitude, self.longitude)
    }
}

impl From<Position> for LocationUpdate {
    fn from(position: Position) -> Self {
        Self {
            latitude: position.latitude(),
            longitude: position.longitude(),
        }
    }
}

/// Payload of an inbound `location` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerLocation {
    /// Transport-assigned sender id
    pub id: PeerId,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl PeerLocation {
    /// Tag an outbound update with the sender's id.
    pub fn new(id: PeerId, update: LocationUpdate) -> Self {
        Self {
            id,
            latitude: update.latitude,
            longitude: update.longitude,
        }
    }

    /// The position carried by this event, if its coordinates are finite.
    pub fn position(&self) -> Result<Position, WireError> {
        Position::new(self.latitude, self.longitude)
    }
}

/// Payload of an inbound `disconnect` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDeparture {
    /// The peer that left
    pub id: PeerId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_location_wire_shape() {
        let event = OutboundEvent::location(Position::new(10.0, 20.0).unwrap());
        let value: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();

        assert_eq!(value["event"], "location");
        assert_eq!(value["data"]["latitude"], 10.0);
        assert_eq!(value["data"]["longitude"], 20.0);
        assert!(value["data"].get("id").is_none());
    }

    #[test]
    fn inbound_location_decodes() {
        let bytes = br#"{"event":"location","data":{"id":"A","latitude":30.0,"longitude":40.0}}"#;
        let event = InboundEvent::from_bytes(bytes).unwrap();

        assert_eq!(event.name(), EVENT_LOCATION);
        match event {
            InboundEvent::Location(location) => {
                assert_eq!(location.id.as_str(), "A");
                assert_eq!(location.position().unwrap(), Position::new(30.0, 40.0).unwrap());
            }
            other => panic!("Expected location, got {:?}", other),
        }
    }

    #[test]
    fn inbound_disconnect_decodes() {
        let bytes = br#"{"event":"disconnect","data":{"id":"A"}}"#;
        let event = InboundEvent::from_bytes(bytes).unwrap();

        assert_eq!(event.name(), EVENT_DISCONNECT);
        assert_eq!(event.peer().as_str(), "A");
    }

    #[test]
    fn inbound_disconnect_for_self_rejected() {
        let bytes = br#"{"event":"disconnect","data":{"id":"self"}}"#;
        let result = InboundEvent::from_bytes(bytes);
        assert!(matches!(result, Err(WireError::ReservedPeerId(id)) if id == "self"));
    }

    #[test]
    fn inbound_location_for_self_rejected() {
        // The local position is never learned from the channel.
        let bytes = br#"{"event":"location","data":{"id":"self","latitude":1.0,"longitude":2.0}}"#;
        assert!(matches!(
            InboundEvent::from_bytes(bytes),
            Err(WireError::ReservedPeerId(_))
        ));
    }

    #[test]
    fn inbound_empty_id_rejected() {
        let bytes = br#"{"event":"disconnect","data":{"id":""}}"#;
        assert!(matches!(
            InboundEvent::from_bytes(bytes),
            Err(WireError::Deserialization(_))
        ));
    }

    #[test]
    fn unknown_event_name_rejected() {
        let bytes = br#"{"event":"teleport","data":{"id":"A"}}"#;
        assert!(InboundEvent::from_bytes(bytes).is_err());
    }

    #[test]
    fn malformed_frame_rejected() {
        assert!(InboundEvent::from_bytes(b"not json").is_err());
        assert!(OutboundEvent::from_bytes(b"{}").is_err());
    }

    #[test]
    fn relay_tagging_preserves_coordinates() {
        let update = LocationUpdate::from(Position::new(-33.5, 151.25).unwrap());
        let location = PeerLocation::new(PeerId::new("B").unwrap(), update);

        assert_eq!(location.position().unwrap(), update.position().unwrap());
        assert_eq!(location.id.as_str(), "B");
    }

    #[test]
    fn coordinates_survive_encoding_bit_for_bit() {
        // Neither value has an exact short decimal form.
        let sent = Position::new(45.8132, 15.978 + 0.0003).unwrap();
        let location = PeerLocation::new(PeerId::new("A").unwrap(), sent.into());

        let bytes = InboundEvent::Location(location).to_bytes().unwrap();
        let received = match InboundEvent::from_bytes(&bytes).unwrap() {
            InboundEvent::Location(location) => location.position().unwrap(),
            other => panic!("Expected location, got {:?}", other),
        };

        assert_eq!(received, sent);
        assert_eq!(received.longitude().to_bits(), sent.longitude().to_bits());

        let outbound = OutboundEvent::location(sent);
        let decoded = OutboundEvent::from_bytes(&outbound.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, outbound);
    }
}
