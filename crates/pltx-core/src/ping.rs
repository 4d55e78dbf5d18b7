//! Snapshot of the query parameters carried by one beacon.

use serde::{Deserialize, Serialize};

use crate::{CorrelationId, EventCode, Identity};

/// Everything a single ping reports, minus the fixed platform constants.
///
/// `None` fields are not sent. The progress fields keep their last
/// assigned value for the rest of the session, so a `vs` ping after a
/// quantile report repeats that report's `pw` and `ti`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingParams {
    pub identity: Identity,
    /// `emi`
    pub session_id: CorrelationId,
    /// `pli`
    pub play_session_id: CorrelationId,
    /// `e`
    pub event: EventCode,
    /// `sa`, epoch milliseconds at emission
    pub sent_at: i64,
    /// `vd`, rounded VOD duration (0 for LIVE)
    pub duration: Option<u64>,
    /// `q`, quantile count (0 for LIVE)
    pub quantiles: Option<u32>,
    /// `pw`, progress on the 0-128 scale, -1 for LIVE
    pub progress_watched: Option<i32>,
    /// `ti`, watched seconds in the reported interval
    pub time_watched: Option<i64>,
}

impl PingParams {
    /// Returns true if this ping should go to the collector rather than the log.
    #[must_use]
    pub fn is_deliverable(&self) -> bool {
        self.identity.has_account()
    }
}
