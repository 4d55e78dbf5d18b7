//! Tracker actor - owns the playback session and its timers.
//!
//! The TrackerActor is the single owner of session state for one player
//! view. It receives commands via an mpsc channel, runs them through the
//! `pltx-core` session, and carries out the resulting directives.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored; the caller may have gone away

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use pltx_core::{CorrelationId, Directive, EventCode, Identity, PingParams, Session};

use super::commands::{PlayerCall, TrackerCommand};
use super::schedule::{DeferredTask, LiveTicker};
use super::{TrackerDeps, LIVE_TICK_PERIOD};
use crate::clock::Clock;
use crate::ids::IdSource;
use crate::transport::BeaconDispatcher;

/// The tracker actor.
///
/// Processes commands sequentially, so no two lifecycle handlers ever run
/// against the session at the same time.
pub struct TrackerActor {
    /// Command receiver
    receiver: mpsc::Receiver<TrackerCommand>,

    /// Handed to timers so they can post back without keeping the actor alive
    commands: mpsc::WeakSender<TrackerCommand>,

    /// Current session; replaced on every `ready`
    session: Option<Session>,

    ticker: LiveTicker,

    /// Seek debounce tasks that may still fire
    pending_settles: Vec<DeferredTask>,

    dispatcher: BeaconDispatcher,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    seek_debounce: Duration,

    /// Every emitted ping, for observers
    ping_publisher: broadcast::Sender<PingParams>,
}

impl TrackerActor {
    pub fn new(
        receiver: mpsc::Receiver<TrackerCommand>,
        commands: mpsc::WeakSender<TrackerCommand>,
        ping_publisher: broadcast::Sender<PingParams>,
        deps: TrackerDeps,
    ) -> Self {
        Self {
            receiver,
            commands,
            session: None,
            ticker: LiveTicker::new(),
            pending_settles: Vec::new(),
            dispatcher: deps.dispatcher,
            clock: deps.clock,
            ids: deps.ids,
            seek_debounce: deps.seek_debounce,
            ping_publisher,
        }
    }

    /// Runs the actor event loop until every handle has been dropped.
    pub async fn run(mut self) {
        debug!("Tracker actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        self.ticker.cancel();
        for task in &self.pending_settles {
            task.cancel();
        }

        debug!(
            session_id = ?self.session.as_ref().map(|s| s.session_id().to_string()),
            "Tracker actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: TrackerCommand) {
        match cmd {
            TrackerCommand::Ready {
                identity,
                respond_to,
            } => {
                let session_id = self.handle_ready(*identity);
                let _ = respond_to.send(session_id);
            }
            TrackerCommand::Player { call, respond_to } => {
                self.handle_player_call(call);
                let _ = respond_to.send(());
            }
            TrackerCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.session.as_ref().map(Session::snapshot));
            }
            TrackerCommand::LiveTick { generation } => {
                self.handle_live_tick(generation);
            }
            TrackerCommand::SeekSettled => {
                self.handle_seek_settled();
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_ready(&mut self, identity: Identity) -> CorrelationId {
        // Nothing carries over from the previous session
        self.ticker.cancel();
        for task in self.pending_settles.drain(..) {
            task.cancel();
        }

        let (session, directives) = Session::start(identity, self.ids.correlation_ids());
        let session_id = session.session_id().clone();

        info!(
            session_id = %session_id,
            media_id = ?session.identity().media_id,
            "Playback session started"
        );

        self.session = Some(session);
        self.apply(directives);
        session_id
    }

    fn handle_player_call(&mut self, call: PlayerCall) {
        let Some(session) = self.session.as_mut() else {
            debug!(call = call.name(), "Ignoring player call before ready");
            return;
        };

        let directives = match call {
            PlayerCall::AdImpression => session.ad_impression(),
            PlayerCall::Time { progress, duration } => session.time(progress, duration),
            PlayerCall::Seek { offset, duration } => session.seek(offset, duration),
            PlayerCall::Seeked => session.seeked(),
            PlayerCall::Complete => session.complete(),
            PlayerCall::Remove => session.remove(),
            PlayerCall::Unload => {
                // Settles from before the unload must not revive the session
                for task in self.pending_settles.drain(..) {
                    task.cancel();
                }
                session.unload()
            }
        };

        self.apply(directives);
    }

    fn handle_live_tick(&mut self, generation: u64) {
        if !self.ticker.accepts(generation) {
            debug!(generation, "Dropping tick from stopped ticker");
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.live_tick();
        }
    }

    fn handle_seek_settled(&mut self) {
        self.pending_settles.retain(|task| !task.is_finished());

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let directives = session.seek_settled();
        self.apply(directives);
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn apply(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Emit(event) => self.emit(event),
                Directive::StartLiveTicker => {
                    self.ticker.start(LIVE_TICK_PERIOD, self.commands.clone());
                }
                Directive::StopLiveTicker => self.ticker.cancel(),
                Directive::ScheduleSeekSettle => {
                    self.pending_settles.push(DeferredTask::schedule(
                        self.seek_debounce,
                        self.commands.clone(),
                        TrackerCommand::SeekSettled,
                    ));
                }
            }
        }
    }

    fn emit(&self, event: EventCode) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let ping = session.ping(event, self.clock.now_millis());
        debug!(
            session_id = %ping.session_id,
            event = %ping.event,
            pw = ?ping.progress_watched,
            ti = ?ping.time_watched,
            "Emitting ping"
        );

        // Ignore if no subscribers
        let _ = self.ping_publisher.send(ping.clone());
        self.dispatcher.dispatch(&ping);
    }
}
