//! Error types for geomesh wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding channel events.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed (malformed frame or unknown event)
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Peer identifier was empty
    #[error("peer id must not be empty")]
    EmptyPeerId,

    /// Inbound event named the reserved local peer id
    #[error("peer id {0:?} is reserved for the local peer")]
    ReservedPeerId(String),

    /// Coordinate was NaN or infinite
    #[error("coordinate is not finite: latitude={latitude}, longitude={longitude}")]
    NonFinite {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::ReservedPeerId("self".into());
        assert_eq!(
            err.to_string(),
            "peer id \"self\" is reserved for the local peer"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
