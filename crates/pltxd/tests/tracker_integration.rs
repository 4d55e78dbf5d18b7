//! Integration tests for the tracker actor.
//!
//! These drive `spawn_tracker()` through its `TrackerHandle` with a fixed
//! clock, predictable ids and a recording transport. Timers run on paused
//! tokio time, so debounce windows and LIVE ticks are deterministic.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pltx_core::{Bucket, CorrelationId, EventCode, Identity, PingParams, StreamKind};
use pltx_protocol::decode_beacon;
use pltxd::clock::Clock;
use pltxd::ids::IdSource;
use pltxd::tracker::{spawn_tracker, TrackerDeps, TrackerHandle};
use pltxd::transport::{BeaconDispatcher, BeaconTransport, TransportError};
use reqwest::Url;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

// ============================================================================
// Test Doubles
// ============================================================================

const NOW_MILLIS: i64 = 1_700_000_000_000;
const COLLECTOR: &str = "collector.test";

struct FixedClock;

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        NOW_MILLIS
    }
}

/// Hands out 000000000001, 000000000002, …
#[derive(Default)]
struct SequentialIds(AtomicU64);

impl IdSource for SequentialIds {
    fn correlation_id(&self) -> CorrelationId {
        let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
        CorrelationId::from_bytes(&n.to_be_bytes()[2..])
    }
}

struct RecordingTransport(mpsc::UnboundedSender<Url>);

#[async_trait]
impl BeaconTransport for RecordingTransport {
    async fn deliver(&self, url: Url) -> Result<(), TransportError> {
        let _ = self.0.send(url);
        Ok(())
    }
}

struct Harness {
    tracker: TrackerHandle,
    pings: broadcast::Receiver<PingParams>,
    delivered: mpsc::UnboundedReceiver<Url>,
}

impl Harness {
    fn spawn() -> Self {
        let (tx, delivered) = mpsc::unbounded_channel();
        let deps = TrackerDeps {
            dispatcher: BeaconDispatcher::new(Arc::new(RecordingTransport(tx)), COLLECTOR),
            clock: Arc::new(FixedClock),
            ids: Arc::new(SequentialIds::default()),
            seek_debounce: Duration::from_secs(1),
        };
        let tracker = spawn_tracker(deps);
        let pings = tracker.subscribe();
        Self {
            tracker,
            pings,
            delivered,
        }
    }

    /// Every ping published so far.
    fn drain(&mut self) -> Vec<PingParams> {
        let mut pings = Vec::new();
        while let Ok(ping) = self.pings.try_recv() {
            pings.push(ping);
        }
        pings
    }

    fn drain_events(&mut self) -> Vec<EventCode> {
        self.drain().into_iter().map(|p| p.event).collect()
    }

    async fn next_delivery(&mut self) -> Option<Url> {
        timeout(Duration::from_secs(1), self.delivered.recv())
            .await
            .ok()
            .flatten()
    }
}

fn identity() -> Identity {
    Identity {
        account_id: Some("acct".to_string()),
        bundle_id: Some("com.example.app".to_string()),
        feed_id: Some("feed-1".to_string()),
        media_id: Some("media-1".to_string()),
        title: Some("Intro".to_string()),
    }
}

// ============================================================================
// Session Start
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_ready_emits_engagement_start() {
    let mut h = Harness::spawn();

    let session_id = h.tracker.ready(identity()).await.unwrap();
    assert_eq!(session_id.as_str(), "000000000001");

    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    let ping = &pings[0];
    assert_eq!(ping.event, EventCode::EngagementStart);
    assert_eq!(ping.session_id.as_str(), "000000000001");
    assert_eq!(ping.play_session_id.as_str(), "000000000002");
    assert_eq!(ping.sent_at, NOW_MILLIS);
    assert_eq!(ping.duration, None);
    assert_eq!(ping.identity, identity());
}

#[tokio::test(start_paused = true)]
async fn test_calls_before_ready_are_ignored() {
    let mut h = Harness::spawn();

    h.tracker.time(5.0, 40.0).await.unwrap();
    h.tracker.complete().await.unwrap();
    h.tracker.unload().await.unwrap();

    assert!(h.drain().is_empty());
    assert!(h.tracker.snapshot().await.is_none());
}

// ============================================================================
// VOD
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_vod_quantile_crossing_reports_watched_time() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.drain();

    h.tracker.time(0.0, 40.0).await.unwrap();
    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].event, EventCode::SessionStart);
    assert_eq!(pings[0].duration, Some(40));
    assert_eq!(pings[0].quantiles, Some(4));
    assert_eq!(pings[0].progress_watched, Some(0));
    assert_eq!(pings[0].time_watched, Some(0));

    h.tracker.time(5.0, 40.0).await.unwrap();
    assert!(h.drain().is_empty(), "still in the first quantile");

    h.tracker.time(10.0, 40.0).await.unwrap();
    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].event, EventCode::TimeWatched);
    assert_eq!(pings[0].time_watched, Some(10));
    assert_eq!(pings[0].progress_watched, Some(32));
}

#[tokio::test(start_paused = true)]
async fn test_complete_reports_full_progress() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 40.0).await.unwrap();
    h.tracker.time(3.0, 40.0).await.unwrap();
    h.drain();

    h.tracker.complete().await.unwrap();
    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].event, EventCode::TimeWatched);
    assert_eq!(pings[0].progress_watched, Some(128));
    assert_eq!(pings[0].time_watched, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_unload_flushes_unsent_time_once() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 40.0).await.unwrap();
    h.tracker.time(7.0, 40.0).await.unwrap();
    h.drain();

    h.tracker.unload().await.unwrap();
    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].event, EventCode::TimeWatched);
    assert_eq!(pings[0].time_watched, Some(7));

    h.tracker.unload().await.unwrap();
    assert!(h.drain().is_empty(), "nothing left to flush");
}

// ============================================================================
// Seek Debounce
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_seeked_reports_after_debounce() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 40.0).await.unwrap();
    h.drain();

    h.tracker.seek(25.0, 40.0).await.unwrap();
    h.tracker.seeked().await.unwrap();

    // Ticks during the window are ignored
    h.tracker.time(25.0, 40.0).await.unwrap();

    sleep(Duration::from_millis(999)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(snapshot.seeking);
    assert!(h.drain().is_empty());

    sleep(Duration::from_millis(2)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(!snapshot.seeking);
    assert_eq!(snapshot.last_quantile, 2);
    assert_eq!(h.drain_events(), vec![EventCode::VideoSeeked]);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_seeks_each_report() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 40.0).await.unwrap();
    h.drain();

    h.tracker.seek(10.0, 40.0).await.unwrap();
    h.tracker.seeked().await.unwrap();
    sleep(Duration::from_millis(500)).await;
    h.tracker.seek(20.0, 40.0).await.unwrap();
    h.tracker.seeked().await.unwrap();

    // First window is not pushed back by the second seek
    sleep(Duration::from_millis(501)).await;
    h.tracker.snapshot().await.unwrap();
    assert_eq!(h.drain_events(), vec![EventCode::VideoSeeked]);

    sleep(Duration::from_millis(500)).await;
    h.tracker.snapshot().await.unwrap();
    assert_eq!(h.drain_events(), vec![EventCode::VideoSeeked]);
}

// ============================================================================
// LIVE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_live_flushes_after_threshold() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.drain();

    h.tracker.time(0.0, 0.0).await.unwrap();
    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].event, EventCode::SessionStart);
    assert_eq!(pings[0].duration, Some(0));
    assert_eq!(pings[0].quantiles, Some(0));
    assert_eq!(pings[0].progress_watched, Some(-1));

    sleep(Duration::from_millis(19_500)).await;
    h.tracker.time(0.0, 0.0).await.unwrap();
    assert!(h.drain().is_empty(), "19 seconds is not past the threshold");

    sleep(Duration::from_secs(1)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.kind, Some(StreamKind::Live));
    assert_eq!(snapshot.accumulated_secs, 20.0);

    h.tracker.time(0.0, 0.0).await.unwrap();
    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].event, EventCode::TimeWatched);
    assert_eq!(pings[0].time_watched, Some(20));
}

#[tokio::test(start_paused = true)]
async fn test_live_seek_pauses_ticker() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 0.0).await.unwrap();

    sleep(Duration::from_millis(3_500)).await;
    h.tracker.seek(0.0, 0.0).await.unwrap();
    h.tracker.seeked().await.unwrap();

    sleep(Duration::from_millis(900)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(!snapshot.ticker_running);
    assert_eq!(snapshot.accumulated_secs, 3.0);

    // Settles at 4.5s, then ticks resume one period later
    sleep(Duration::from_millis(1_200)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(snapshot.ticker_running);
    assert_eq!(snapshot.accumulated_secs, 4.0);
}

#[tokio::test(start_paused = true)]
async fn test_live_unload_flushes_ticks() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 0.0).await.unwrap();
    h.drain();

    sleep(Duration::from_millis(5_500)).await;
    h.tracker.unload().await.unwrap();

    let pings = h.drain();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].time_watched, Some(5));

    // Ticker is gone
    sleep(Duration::from_secs(3)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.accumulated_secs, 0.0);
    assert!(!snapshot.ticker_running);
}

#[tokio::test(start_paused = true)]
async fn test_unload_cancels_pending_seek_settle() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 0.0).await.unwrap();
    sleep(Duration::from_millis(3_500)).await;

    h.tracker.seek(0.0, 0.0).await.unwrap();
    h.tracker.seeked().await.unwrap();
    h.tracker.unload().await.unwrap();
    h.drain();

    // Well past the debounce window
    sleep(Duration::from_millis(6_500)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(!snapshot.ticker_running);
    assert_eq!(snapshot.accumulated_secs, 0.0);
    assert!(h.drain().is_empty(), "no vs after unload");

    h.tracker.unload().await.unwrap();
    assert!(h.drain().is_empty(), "no second flush");
}

#[tokio::test(start_paused = true)]
async fn test_ready_resets_session() {
    let mut h = Harness::spawn();
    let first = h.tracker.ready(identity()).await.unwrap();
    h.tracker.time(0.0, 0.0).await.unwrap();
    sleep(Duration::from_millis(2_500)).await;

    let second = h.tracker.ready(identity()).await.unwrap();
    assert_ne!(first, second);

    sleep(Duration::from_secs(3)).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, second);
    assert_eq!(snapshot.kind, None);
    assert_eq!(snapshot.accumulated_secs, 0.0);
    assert!(!snapshot.ticker_running);
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pings_are_delivered_to_buckets() {
    let mut h = Harness::spawn();
    h.tracker.ready(identity()).await.unwrap();
    h.tracker.ad_impression().await.unwrap();

    let mut delivered = Vec::new();
    for _ in 0..2 {
        let url = h.next_delivery().await.expect("beacon delivered");
        assert_eq!(url.host_str(), Some(COLLECTOR));
        let (bucket, ping) = decode_beacon(&url).unwrap();
        delivered.push((ping.event, bucket, url.path().to_string()));
    }
    delivered.sort_by_key(|(event, _, _)| event.as_str());

    assert_eq!(
        delivered,
        vec![
            (
                EventCode::EngagementStart,
                Bucket::Player,
                "/v1/jwplayer6/ping.gif".to_string()
            ),
            (
                EventCode::AdImpression,
                Bucket::Ads,
                "/v1/clienta/ping.gif".to_string()
            ),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_account_means_no_delivery() {
    let mut h = Harness::spawn();
    let anonymous = Identity {
        account_id: None,
        ..identity()
    };
    h.tracker.ready(anonymous).await.unwrap();
    h.tracker.time(0.0, 40.0).await.unwrap();

    // Still observable, just never sent
    assert_eq!(
        h.drain_events(),
        vec![EventCode::EngagementStart, EventCode::SessionStart]
    );
    assert!(h.next_delivery().await.is_none());
}
