//! Identity and location types for geomesh.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WireError;

/// Identifier reserved for the local peer.
///
/// Transport-assigned identifiers never take this value.
pub const LOCAL_PEER: &str = "self";

/// An opaque identifier for a peer sharing its position.
///
/// Assigned by the transport/relay and stable for the lifetime of the peer's
/// connection. Compared by value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Create a PeerId from a transport-assigned identifier.
    ///
    /// Returns an error if the identifier is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, WireError> {
        let id = id.into();
        if id.is_empty() {
            return Err(WireError::EmptyPeerId);
        }
        Ok(Self(id))
    }

    /// The reserved identifier of the local peer.
    pub fn local() -> Self {
        Self(LOCAL_PEER.to_string())
    }

    /// Whether this is the reserved local peer identifier.
    pub fn is_local(&self) -> bool {
        self.0 == LOCAL_PEER
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable marker label for this peer.
    pub fn label(&self) -> String {
        if self.is_local() {
            "Your location".to_string()
        } else {
            format!("User {}", self.0)
        }
    }
}

impl TryFrom<String> for PeerId {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

/// The most recent known sample of a peer's location.
///
/// Always finite; there is no range validation.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawPosition {
    latitude: f64,
    longitude: f64,
}

impl Position {
    /// Create a position, rejecting NaN or infinite coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, WireError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(WireError::NonFinite {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl TryFrom<RawPosition> for Position {
    type Error = WireError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({}, {})", self.latitude, self.longitude)
    }
}
