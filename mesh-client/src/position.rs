//! Position source adapter.
//!
//! A [`PositionSource`] is the raw device location API: it yields samples
//! whenever it has them. [`PositionWatch`] wraps it with the watch options
//! every location API exposes (high accuracy, timeout, maximum age) and
//! turns a missing sample into a local [`PositionError::Timeout`].
//!
//! Retry cadence belongs here, not in the coordinator: after a timeout the
//! watch simply keeps waiting for the next sample.

use async_trait::async_trait;
use mesh_types::Position;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Errors reported by the position source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The user or platform denied location access.
    #[error("permission denied")]
    PermissionDenied,

    /// The platform could not determine a position.
    #[error("position unavailable: {0}")]
    Unavailable(String),

    /// No sample arrived within the configured timeout.
    #[error("timed out waiting for position")]
    Timeout,
}

/// Watch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Ask the source for its most accurate fix.
    pub high_accuracy: bool,
    /// How long to wait for each sample. Zero waits indefinitely.
    pub timeout: Duration,
    /// Maximum age of a cached fix that may be reused on timeout.
    /// Zero means always resample, never reuse.
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_millis(5000),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Raw device location source.
#[async_trait]
pub trait PositionSource: Send {
    /// Wait for the next sample.
    ///
    /// Returns `None` once the source has ended. Must be cancel-safe: the
    /// watch drops the future when its timeout elapses.
    async fn sample(&mut self, high_accuracy: bool) -> Option<Result<Position, PositionError>>;
}

/// Position source fed through a [`FeedHandle`].
///
/// Used by tests and the simulator in place of a device API.
#[derive(Debug)]
pub struct FeedSource {
    rx: mpsc::UnboundedReceiver<Result<Position, PositionError>>,
}

/// Sending side of a [`FeedSource`]. Dropping every handle ends the source.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<Result<Position, PositionError>>,
}

impl FeedSource {
    /// Create a source and the handle that feeds it.
    pub fn new() -> (Self, FeedHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, FeedHandle { tx })
    }
}

impl FeedHandle {
    /// Deliver a sample. Returns false if the source is gone.
    pub fn fix(&self, position: Position) -> bool {
        self.tx.send(Ok(position)).is_ok()
    }

    /// Deliver an error. Returns false if the source is gone.
    pub fn fail(&self, error: PositionError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

#[async_trait]
impl PositionSource for FeedSource {
    async fn sample(&mut self, _high_accuracy: bool) -> Option<Result<Position, PositionError>> {
        self.rx.recv().await
    }
}

/// A running position watch over a [`PositionSource`].
#[derive(Debug)]
pub struct PositionWatch<P: PositionSource> {
    source: P,
    options: WatchOptions,
    cached: Option<(Position, Instant)>,
}

impl<P: PositionSource> PositionWatch<P> {
    /// Start watching `source` with `options`.
    pub fn new(source: P, options: WatchOptions) -> Self {
        Self {
            source,
            options,
            cached: None,
        }
    }

    /// The watch options.
    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Wait for the next position or error.
    ///
    /// Returns `None` once the underlying source has ended.
    pub async fn next(&mut self) -> Option<Result<Position, PositionError>> {
        let high_accuracy = self.options.high_accuracy;
        let sample = if self.options.timeout.is_zero() {
            self.source.sample(high_accuracy).await
        } else {
            let sample = self.source.sample(high_accuracy);
            match tokio::time::timeout(self.options.timeout, sample).await {
                Ok(sample) => sample,
                Err(_) => {
                    return Some(self.cached_fix().ok_or(PositionError::Timeout));
                }
            }
        };

        match sample? {
            Ok(position) => {
                self.cached = Some((position, Instant::now()));
                Some(Ok(position))
            }
            Err(e) => Some(Err(e)),
        }
    }

    fn cached_fix(&self) -> Option<Position> {
        if self.options.maximum_age.is_zero() {
            return None;
        }
        let (position, taken_at) = self.cached?;
        (taken_at.elapsed() <= self.options.maximum_age).then_some(position)
    }
}
