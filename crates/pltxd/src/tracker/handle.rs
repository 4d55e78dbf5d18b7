//! Client interface for interacting with the TrackerActor.
//!
//! The `TrackerHandle` is a cheap-to-clone interface that maps the host
//! player's lifecycle callbacks onto tracker commands.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `TrackerError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use pltx_core::{CorrelationId, Identity, PingParams, SessionSnapshot};

use super::commands::{PlayerCall, TrackerCommand, TrackerError};

/// Handle for interacting with a tracker actor.
///
/// Every method returns once the actor has applied the call, so a ping it
/// triggers has already been published to subscribers.
#[derive(Clone)]
pub struct TrackerHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<TrackerCommand>,

    /// Ping broadcaster for subscribing to emissions
    ping_sender: broadcast::Sender<PingParams>,
}

impl TrackerHandle {
    pub fn new(
        sender: mpsc::Sender<TrackerCommand>,
        ping_sender: broadcast::Sender<PingParams>,
    ) -> Self {
        Self {
            sender,
            ping_sender,
        }
    }

    /// Starts a new session and returns its `emi` id.
    ///
    /// # Errors
    ///
    /// - `TrackerError::ChannelClosed` if the actor has shut down
    pub async fn ready(&self, identity: Identity) -> Result<CorrelationId, TrackerError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(TrackerCommand::Ready {
                identity: Box::new(identity),
                respond_to: tx,
            })
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;

        rx.await.map_err(|_| TrackerError::ChannelClosed)
    }

    pub async fn ad_impression(&self) -> Result<(), TrackerError> {
        self.call(PlayerCall::AdImpression).await
    }

    pub async fn time(&self, progress: f64, duration: f64) -> Result<(), TrackerError> {
        self.call(PlayerCall::Time { progress, duration }).await
    }

    pub async fn seek(&self, offset: f64, duration: f64) -> Result<(), TrackerError> {
        self.call(PlayerCall::Seek { offset, duration }).await
    }

    /// Reports a finished seek. The `vs` ping follows after the debounce window.
    pub async fn seeked(&self) -> Result<(), TrackerError> {
        self.call(PlayerCall::Seeked).await
    }

    pub async fn complete(&self) -> Result<(), TrackerError> {
        self.call(PlayerCall::Complete).await
    }

    pub async fn remove(&self) -> Result<(), TrackerError> {
        self.call(PlayerCall::Remove).await
    }

    /// Page-unload flush: stops the ticker and sends any unsent watched time.
    pub async fn unload(&self) -> Result<(), TrackerError> {
        self.call(PlayerCall::Unload).await
    }

    /// Applies a lifecycle callback.
    ///
    /// # Errors
    ///
    /// - `TrackerError::ChannelClosed` if the actor has shut down
    pub async fn call(&self, call: PlayerCall) -> Result<(), TrackerError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(TrackerCommand::Player {
                call,
                respond_to: tx,
            })
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;

        rx.await.map_err(|_| TrackerError::ChannelClosed)
    }

    /// Tracking state of the current session.
    ///
    /// Returns `None` before the first `ready` or if the actor is gone.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(TrackerCommand::GetSnapshot { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Subscribe to emitted pings.
    pub fn subscribe(&self) -> broadcast::Receiver<PingParams> {
        self.ping_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
