//! Analytics event codes and collector buckets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// Event type carried in the `e` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCode {
    /// Player ready, engagement started (`e`)
    #[serde(rename = "e")]
    EngagementStart,
    /// Ad impression (`i`)
    #[serde(rename = "i")]
    AdImpression,
    /// First time tick, playback started (`s`)
    #[serde(rename = "s")]
    SessionStart,
    /// Watched-time report (`t`)
    #[serde(rename = "t")]
    TimeWatched,
    /// Seek settled (`vs`)
    #[serde(rename = "vs")]
    VideoSeeked,
}

impl EventCode {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EngagementStart => "e",
            Self::AdImpression => "i",
            Self::SessionStart => "s",
            Self::TimeWatched => "t",
            Self::VideoSeeked => "vs",
        }
    }

    /// Collector bucket this event is delivered to.
    pub fn bucket(&self) -> Bucket {
        match self {
            Self::AdImpression => Bucket::Ads,
            _ => Bucket::Player,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCode {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "e" => Ok(Self::EngagementStart),
            "i" => Ok(Self::AdImpression),
            "s" => Ok(Self::SessionStart),
            "t" => Ok(Self::TimeWatched),
            "vs" => Ok(Self::VideoSeeked),
            other => Err(DomainError::InvalidFieldValue {
                field: "e".to_string(),
                value: other.to_string(),
                expected: "one of e, i, s, t, vs".to_string(),
            }),
        }
    }
}

/// Path segment on the collector that receives a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Playback events
    Player,
    /// Ad impressions
    Ads,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "jwplayer6",
            Self::Ads => "clienta",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
