//! Playback tracker using the Actor pattern.
//!
//! One tracker serves one player view. It receives lifecycle calls via a
//! tokio mpsc channel, owns the current `Session`, and turns the session's
//! directives into pings, ticker changes and debounce timers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  TrackerHandle  │────▶│  TrackerActor   │────▶│ BeaconDispatcher │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                   ▲         │
//!         │ TrackerCommand    │         │ PingParams (broadcast)
//!         ▼                   │         ▼
//!   ready/time/seek/…   LiveTicker /   subscribers
//!                       DeferredTask
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;
mod schedule;

pub use actor::TrackerActor;
pub use commands::{PlayerCall, TrackerCommand, TrackerError};
pub use handle::TrackerHandle;
pub use schedule::{DeferredTask, LiveTicker};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::ids::{IdSource, RandomIds};
use crate::transport::{BeaconDispatcher, BeaconTransport};

/// LIVE watched time is credited once per this period, one second per tick.
pub const LIVE_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const PING_BUFFER: usize = 100;

/// Collaborators injected into every tracker.
#[derive(Clone)]
pub struct TrackerDeps {
    pub dispatcher: BeaconDispatcher,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdSource>,
    pub seek_debounce: Duration,
}

impl TrackerDeps {
    /// Wall clock, random ids and the configured collector and debounce.
    pub fn new(transport: Arc<dyn BeaconTransport>, config: &TrackerConfig) -> Self {
        Self {
            dispatcher: BeaconDispatcher::new(transport, config.collector_host.clone()),
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
            seek_debounce: config.seek_debounce(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }
}

/// Spawn a tracker actor and return a handle for interaction.
///
/// Must be called from within a tokio runtime. The actor stops when the
/// last handle is dropped.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pltx_core::Identity;
/// use pltxd::config::TrackerConfig;
/// use pltxd::tracker::{spawn_tracker, TrackerDeps};
/// use pltxd::transport::DiscardTransport;
///
/// #[tokio::main]
/// async fn main() {
///     let deps = TrackerDeps::new(Arc::new(DiscardTransport), &TrackerConfig::default());
///     let tracker = spawn_tracker(deps);
///
///     let _ = tracker.ready(Identity::default()).await;
///     let _ = tracker.time(0.0, 120.0).await;
/// }
/// ```
pub fn spawn_tracker(deps: TrackerDeps) -> TrackerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (ping_tx, _) = broadcast::channel(PING_BUFFER);

    let actor = TrackerActor::new(cmd_rx, cmd_tx.downgrade(), ping_tx.clone(), deps);
    tokio::spawn(actor.run());

    TrackerHandle::new(cmd_tx, ping_tx)
}
