//! Session identity: host-provided fields and random correlation ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// Number of random bytes behind a correlation id (12 hex characters).
pub const CORRELATION_ID_BYTES: usize = 6;

/// Identity fields passed by the host player on `ready`.
///
/// All fields are optional; absent fields are left out of the beacon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Analytics account token (`aid`). Without one, beacons are only logged.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Application bundle (`bun`)
    #[serde(default)]
    pub bundle_id: Option<String>,
    /// Playlist / feed (`fed`)
    #[serde(default)]
    pub feed_id: Option<String>,
    /// Media item being played (`id`)
    #[serde(default)]
    pub media_id: Option<String>,
    /// Media title (`t`)
    #[serde(default)]
    pub title: Option<String>,
}

impl Identity {
    /// Returns true when an account token is present and non-empty.
    #[must_use]
    pub fn has_account(&self) -> bool {
        self.account_id.as_deref().is_some_and(|aid| !aid.is_empty())
    }
}

/// Random hex identifier correlating the pings of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Hex-encodes the given bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Parses an id received on the wire.
    pub fn parse(s: &str) -> DomainResult<Self> {
        if s.len() == CORRELATION_ID_BYTES * 2 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(DomainError::InvalidFieldValue {
                field: "correlation id".to_string(),
                value: s.to_string(),
                expected: format!("{} hex characters", CORRELATION_ID_BYTES * 2),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two independent ids generated on `ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationIds {
    /// `emi`
    pub session: CorrelationId,
    /// `pli`
    pub play_session: CorrelationId,
}
