//! Playback session state machine.
//!
//! A [`Session`] is created on player `ready` and mutated by the player's
//! lifecycle callbacks. It never touches timers or the network itself:
//! every transition returns a list of [`Directive`]s that the runtime
//! carries out in order (emit a ping, start or stop the live ticker,
//! schedule the seek debounce).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quantile::{progress_units, quantile_count, quantile_index, MAX_PROGRESS_UNITS};
use crate::{CorrelationId, CorrelationIds, EventCode, Identity, PingParams};

/// LIVE watched time is flushed once the accumulator exceeds this many seconds.
pub const LIVE_FLUSH_THRESHOLD_SECS: f64 = 19.0;

/// `pw` value marking a LIVE stream.
const LIVE_PROGRESS_SENTINEL: i32 = -1;

// ============================================================================
// Stream Kind & Directives
// ============================================================================

/// Kind of stream, fixed by the first time tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// On-demand stream with a known duration
    Vod,
    /// Live stream (reported duration below one second)
    Live,
}

/// Side effect requested by a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Send a ping of this type with the session's current parameters
    Emit(EventCode),
    /// Start the 1 Hz watched-time ticker
    StartLiveTicker,
    /// Stop the ticker; must be harmless when none is running
    StopLiveTicker,
    /// Call [`Session::seek_settled`] once the debounce window elapses
    ScheduleSeekSettle,
}

// ============================================================================
// Session
// ============================================================================

/// State of one playback view.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    ids: CorrelationIds,
    kind: Option<StreamKind>,

    // Values that persist across pings, like the query map they end up in
    duration: Option<u64>,
    quantiles: Option<u32>,
    progress_watched: Option<i32>,
    time_watched: Option<i64>,

    last_quantile: i64,
    last_progress: f64,
    accumulated: f64,
    seeking: bool,
    ticker_running: bool,
}

impl Session {
    /// Starts a session and requests the engagement ping.
    pub fn start(identity: Identity, ids: CorrelationIds) -> (Self, Vec<Directive>) {
        let session = Self {
            identity,
            ids,
            kind: None,
            duration: None,
            quantiles: None,
            progress_watched: None,
            time_watched: None,
            last_quantile: 0,
            last_progress: 0.0,
            accumulated: 0.0,
            seeking: false,
            ticker_running: false,
        };
        (session, vec![Directive::Emit(EventCode::EngagementStart)])
    }

    pub fn ad_impression(&self) -> Vec<Directive> {
        vec![Directive::Emit(EventCode::AdImpression)]
    }

    /// Processes a playback position tick.
    pub fn time(&mut self, progress: f64, duration: f64) -> Vec<Directive> {
        if self.seeking {
            return Vec::new();
        }

        match self.kind {
            None if duration < 1.0 => self.begin_live(),
            None => self.begin_vod(progress, duration),
            Some(StreamKind::Live) => self.check_live_flush(),
            Some(StreamKind::Vod) if duration < 1.0 => {
                debug!(
                    session_id = %self.ids.session,
                    duration,
                    "Ignoring tick without duration on VOD session"
                );
                Vec::new()
            }
            Some(StreamKind::Vod) => self.track_vod_progress(progress, duration),
        }
    }

    /// Marks the start of a seek.
    ///
    /// VOD position tracking is re-synchronised to the seek target so the
    /// ticks after the seek don't report quantiles that were skipped.
    pub fn seek(&mut self, offset: f64, duration: f64) -> Vec<Directive> {
        self.seeking = true;

        match self.kind {
            Some(StreamKind::Live) => self.stop_ticker(),
            Some(StreamKind::Vod) => {
                self.last_progress = offset;
                if duration >= 1.0 {
                    self.last_quantile =
                        quantile_index(offset, duration, self.quantiles.unwrap_or(0));
                }
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub fn seeked(&self) -> Vec<Directive> {
        vec![Directive::ScheduleSeekSettle]
    }

    /// Ends a seek once the debounce window has passed.
    pub fn seek_settled(&mut self) -> Vec<Directive> {
        self.seeking = false;

        let mut directives = Vec::with_capacity(2);
        if self.kind == Some(StreamKind::Live) && !self.ticker_running {
            self.ticker_running = true;
            directives.push(Directive::StartLiveTicker);
        }
        directives.push(Directive::Emit(EventCode::VideoSeeked));
        directives
    }

    /// Playback reached the end of the stream.
    pub fn complete(&mut self) -> Vec<Directive> {
        let mut directives = match self.kind {
            Some(StreamKind::Live) => self.stop_ticker(),
            Some(StreamKind::Vod) | None => {
                self.progress_watched = Some(MAX_PROGRESS_UNITS);
                Vec::new()
            }
        };
        self.time_watched = Some(self.take_accumulated());
        directives.push(Directive::Emit(EventCode::TimeWatched));
        directives
    }

    /// The player was detached from the page.
    pub fn remove(&mut self) -> Vec<Directive> {
        let mut directives = match self.kind {
            Some(StreamKind::Live) => self.stop_ticker(),
            Some(StreamKind::Vod) | None => {
                let duration = self.duration.unwrap_or(0) as f64;
                self.progress_watched = Some(progress_units(self.last_progress, duration));
                Vec::new()
            }
        };
        self.time_watched = Some(self.take_accumulated());
        directives.push(Directive::Emit(EventCode::TimeWatched));
        directives
    }

    /// Last chance flush when the page goes away.
    pub fn unload(&mut self) -> Vec<Directive> {
        let mut directives = self.stop_ticker();
        if self.accumulated != 0.0 {
            self.time_watched = Some(self.take_accumulated());
            directives.push(Directive::Emit(EventCode::TimeWatched));
        }
        directives
    }

    /// Credits one second of LIVE watching.
    ///
    /// Returns false (and changes nothing) unless this is a LIVE session
    /// with its ticker running and no seek in progress.
    pub fn live_tick(&mut self) -> bool {
        if self.kind != Some(StreamKind::Live) || !self.ticker_running || self.seeking {
            return false;
        }
        self.accumulated += 1.0;
        true
    }

    /// Builds the parameters for a ping of the given type.
    pub fn ping(&self, event: EventCode, sent_at: i64) -> PingParams {
        PingParams {
            identity: self.identity.clone(),
            session_id: self.ids.session.clone(),
            play_session_id: self.ids.play_session.clone(),
            event,
            sent_at,
            duration: self.duration,
            quantiles: self.quantiles,
            progress_watched: self.progress_watched,
            time_watched: self.time_watched,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.ids.session.clone(),
            kind: self.kind,
            duration: self.duration,
            quantiles: self.quantiles,
            progress_watched: self.progress_watched,
            last_quantile: self.last_quantile,
            last_progress: self.last_progress,
            accumulated_secs: self.accumulated,
            seeking: self.seeking,
            ticker_running: self.ticker_running,
        }
    }

    pub fn session_id(&self) -> &CorrelationId {
        &self.ids.session
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn kind(&self) -> Option<StreamKind> {
        self.kind
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn begin_live(&mut self) -> Vec<Directive> {
        self.kind = Some(StreamKind::Live);
        self.duration = Some(0);
        self.quantiles = Some(0);
        self.progress_watched = Some(LIVE_PROGRESS_SENTINEL);
        self.ticker_running = true;

        debug!(session_id = %self.ids.session, "LIVE playback started");
        vec![
            Directive::Emit(EventCode::SessionStart),
            Directive::StartLiveTicker,
        ]
    }

    fn begin_vod(&mut self, progress: f64, duration: f64) -> Vec<Directive> {
        let quantiles = quantile_count(duration);

        self.kind = Some(StreamKind::Vod);
        self.duration = Some(duration.round() as u64);
        self.quantiles = Some(quantiles);
        self.time_watched = Some(0);
        self.progress_watched = Some(0);
        self.last_quantile = quantile_index(progress, duration, quantiles);
        self.last_progress = progress;

        debug!(
            session_id = %self.ids.session,
            duration,
            quantiles,
            "VOD playback started"
        );
        vec![Directive::Emit(EventCode::SessionStart)]
    }

    fn check_live_flush(&mut self) -> Vec<Directive> {
        if self.accumulated > LIVE_FLUSH_THRESHOLD_SECS {
            self.time_watched = Some(self.take_accumulated());
            vec![Directive::Emit(EventCode::TimeWatched)]
        } else {
            Vec::new()
        }
    }

    fn track_vod_progress(&mut self, progress: f64, duration: f64) -> Vec<Directive> {
        let units = progress_units(progress, duration);
        let index = quantile_index(progress, duration, self.quantiles.unwrap_or(0));

        self.accumulated += progress - self.last_progress;
        self.last_progress = progress;

        if index > self.last_quantile {
            self.time_watched = Some(self.take_accumulated());
            self.progress_watched = Some(units);
            self.last_quantile = index;
            vec![Directive::Emit(EventCode::TimeWatched)]
        } else {
            Vec::new()
        }
    }

    fn stop_ticker(&mut self) -> Vec<Directive> {
        self.ticker_running = false;
        vec![Directive::StopLiveTicker]
    }

    /// Reads the accumulator (floored) and resets it.
    fn take_accumulated(&mut self) -> i64 {
        let secs = self.accumulated.floor() as i64;
        self.accumulated = 0.0;
        secs
    }
}

/// Read-only view of a session's tracking state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: CorrelationId,
    pub kind: Option<StreamKind>,
    pub duration: Option<u64>,
    pub quantiles: Option<u32>,
    pub progress_watched: Option<i32>,
    pub last_quantile: i64,
    pub last_progress: f64,
    pub accumulated_secs: f64,
    pub seeking: bool,
    pub ticker_running: bool,
}
