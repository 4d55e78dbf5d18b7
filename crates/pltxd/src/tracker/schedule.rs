//! Timers feeding commands back into the tracker actor.
//!
//! Both timers hold only a weak sender, so they never keep an actor alive
//! after its last handle is dropped.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::commands::TrackerCommand;

/// Recurring LIVE watched-time ticker.
///
/// Every start bumps the generation so ticks already queued by a
/// previous run can be told apart. Cancelling is idempotent.
#[derive(Debug, Default)]
pub struct LiveTicker {
    token: Option<CancellationToken>,
    generation: u64,
}

impl LiveTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking every `period`, first tick one period from now.
    ///
    /// A running ticker is cancelled first.
    pub fn start(&mut self, period: Duration, commands: mpsc::WeakSender<TrackerCommand>) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(sender) = commands.upgrade() else {
                            break;
                        };
                        if sender.send(TrackerCommand::LiveTick { generation }).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(generation, "Live ticker stopped");
        });

        self.token = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }

    /// Whether a tick of `generation` comes from the running ticker.
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_running() && generation == self.generation
    }
}

impl Drop for LiveTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One-shot deferred command.
///
/// Fires exactly once at the deadline fixed when it was scheduled; it is
/// never pushed back by later activity.
#[derive(Debug)]
pub struct DeferredTask {
    handle: JoinHandle<()>,
}

impl DeferredTask {
    pub fn schedule(
        delay: Duration,
        commands: mpsc::WeakSender<TrackerCommand>,
        command: TrackerCommand,
    ) -> Self {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(sender) = commands.upgrade() {
                let _ = sender.send(command).await;
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}
