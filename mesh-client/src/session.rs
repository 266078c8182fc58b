//! Session - the runtime around the core coordinator.
//!
//! # Architecture
//!
//! Every event source gets its own pump task. The pumps never touch the
//! coordinator; they forward inputs into one queue, and a single consumer
//! applies them in arrival order and executes the resulting actions.
//!
//! ```text
//! PositionWatch ──pump──┐
//! Channel.recv ───pump──┼──► queue ──► Coordinator ──► Channel.send / notices
//! SessionHandle ────────┘                  │
//!                               MarkerSurface / RoutingEngine
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (mut session, handle) = Session::new(&config, channel, surface, router);
//! session.attach_position(PositionWatch::new(source, config.position.watch_options()));
//! tokio::spawn(async move { session.run().await });
//!
//! // The map reports marker clicks back through the handle.
//! handle.click(marker);
//! ```

use std::sync::Arc;
use std::time::Duration;

use mesh_core::{Action, Coordinator, Input, MarkerHandle, MarkerSurface, Notice, RoutingEngine};
use mesh_types::InboundEvent;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelError};
use crate::config::Config;
use crate::position::{PositionSource, PositionWatch};

/// First delay before retrying a failed channel receive.
const RECV_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Upper bound for the receive retry delay.
const RECV_RETRY_MAX: Duration = Duration::from_secs(5);

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Could not join the channel.
    #[error("failed to connect channel: {0}")]
    Connect(#[source] ChannelError),
}

/// Queue entries for the consumer.
#[derive(Debug)]
enum Event {
    Input(Input),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable handle for feeding user interaction into a running session.
///
/// The session stops once shutdown is requested, or once every handle and
/// every pump is gone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl SessionHandle {
    /// Report a click on a marker. Returns false if the session has ended.
    pub fn click(&self, marker: MarkerHandle) -> bool {
        self.submit(Input::MarkerClicked(marker))
    }

    /// Dismiss the route overlay. Returns false if the session has ended.
    pub fn clear_route(&self) -> bool {
        self.submit(Input::ClearRoute)
    }

    /// Queue an arbitrary input. Returns false if the session has ended.
    pub fn submit(&self, input: Input) -> bool {
        self.tx.send(Event::Input(input)).is_ok()
    }

    /// Wait until everything queued before this call has been applied.
    ///
    /// Returns false if the session ended first.
    pub async fn flush(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Event::Flush(done_tx)).is_err() {
            return false;
        }
        done_rx.await.is_ok()
    }

    /// Ask the session to stop after the inputs already queued.
    pub fn shutdown(&self) -> bool {
        self.tx.send(Event::Shutdown).is_ok()
    }
}

/// A position-sharing session.
pub struct Session<C: Channel, S: MarkerSurface, E: RoutingEngine> {
    coordinator: Coordinator<S, E>,
    channel: Arc<C>,
    address: String,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    pumps: Vec<JoinHandle<()>>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl<C: Channel, S: MarkerSurface, E: RoutingEngine> std::fmt::Debug for Session<C, S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("pumps", &self.pumps.len())
            .field("tracked_peers", &self.coordinator.registry().len())
            .finish_non_exhaustive()
    }
}

impl<C, S, E> Session<C, S, E>
where
    C: Channel + 'static,
    S: MarkerSurface,
    E: RoutingEngine,
{
    /// Create a session and the handle used to feed it user interaction.
    pub fn new(config: &Config, channel: C, surface: S, engine: E) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            coordinator: Coordinator::with_view(surface, engine, config.view.settings()),
            channel: Arc::new(channel),
            address: config.channel.address.clone(),
            tx: tx.clone(),
            rx,
            pumps: Vec::new(),
            notices: None,
        };
        (session, SessionHandle { tx })
    }

    /// Forward user-visible notices to `sink` as well as the log.
    pub fn with_notices(mut self, sink: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(sink);
        self
    }

    /// Start pumping samples from a position watch into the session.
    ///
    /// Must be called from within a Tokio runtime. The watch runs for the
    /// life of the session and is never cancelled by the core.
    pub fn attach_position<P>(&mut self, mut watch: PositionWatch<P>)
    where
        P: PositionSource + 'static,
    {
        let tx = self.tx.clone();
        self.pumps.push(tokio::spawn(async move {
            while let Some(sample) = watch.next().await {
                let input = match sample {
                    Ok(position) => Input::LocalFix(position),
                    Err(e) => Input::LocalError {
                        error: e.to_string(),
                    },
                };
                if tx.send(Event::Input(input)).is_err() {
                    return;
                }
            }
            tracing::debug!("Position source ended");
        }));
    }

    /// The session's channel.
    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Connect the channel and process inputs until the session ends.
    ///
    /// Returns the coordinator so callers can inspect the final state.
    pub async fn run(self) -> Result<Coordinator<S, E>, SessionError> {
        let Session {
            mut coordinator,
            channel,
            address,
            tx,
            mut rx,
            mut pumps,
            notices,
        } = self;

        if let Err(e) = channel.connect(&address).await {
            for pump in &pumps {
                pump.abort();
            }
            return Err(SessionError::Connect(e));
        }
        tracing::info!("Session started (channel: {})", address);

        pumps.push(spawn_channel_pump(Arc::clone(&channel), tx));

        let mut processed: u64 = 0;
        while let Some(event) = rx.recv().await {
            let input = match event {
                Event::Input(input) => input,
                Event::Flush(done) => {
                    let _ = done.send(());
                    continue;
                }
                Event::Shutdown => {
                    tracing::debug!("Shutdown requested");
                    break;
                }
            };

            processed += 1;
            tracing::trace!(?input, "Applying input");
            for action in coordinator.handle(input) {
                execute(channel.as_ref(), notices.as_ref(), action).await;
            }
        }

        for pump in &pumps {
            pump.abort();
        }
        if let Err(e) = channel.close().await {
            tracing::warn!("Failed to close channel: {}", e);
        }
        tracing::info!(
            "Session stopped after {} inputs ({} peers tracked)",
            processed,
            coordinator.registry().len()
        );

        Ok(coordinator)
    }
}

/// Execute one coordinator action. Failures are logged, never propagated.
async fn execute<C: Channel>(
    channel: &C,
    notices: Option<&mpsc::UnboundedSender<Notice>>,
    action: Action,
) {
    match action {
        Action::Publish(event) => {
            let frame = match event.to_bytes() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Failed to encode {} event: {}", event.name(), e);
                    return;
                }
            };
            match channel.send(&frame).await {
                Ok(()) => tracing::debug!("Published {} event", event.name()),
                Err(e) => tracing::warn!("Publish failed (non-fatal): {}", e),
            }
        }
        Action::Notify(notice) => {
            tracing::warn!("Notice: {}", notice);
            if let Some(sink) = notices {
                let _ = sink.send(notice);
            }
        }
    }
}

/// Forward decoded channel events into the session queue.
fn spawn_channel_pump<C: Channel + 'static>(
    channel: Arc<C>,
    tx: mpsc::UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut retry_delay = RECV_RETRY_DELAY;
        loop {
            match channel.recv().await {
                Ok(frame) => {
                    retry_delay = RECV_RETRY_DELAY;
                    if !forward_frame(&tx, &frame) {
                        return;
                    }
                }
                Err(ChannelError::ReceiveFailed(e)) => {
                    tracing::warn!(
                        "Channel receive failed, retrying in {:?}: {}",
                        retry_delay,
                        e
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(RECV_RETRY_MAX);
                }
                Err(e) => {
                    tracing::info!("Channel pump stopped: {}", e);
                    return;
                }
            }
        }
    })
}

/// Decode one frame and queue it. Returns false once the session is gone.
fn forward_frame(tx: &mpsc::UnboundedSender<Event>, frame: &[u8]) -> bool {
    match InboundEvent::from_bytes(frame) {
        Ok(event) => {
            tracing::debug!("Received {} event for {}", event.name(), event.peer());
            tx.send(Event::Input(Input::Remote(event))).is_ok()
        }
        Err(e) => {
            tracing::warn!("Skipping undecodable frame: {}", e);
            true
        }
    }
}
