//! Tracker actor commands and errors.
//!
//! This module defines the message types for communicating with the `TrackerActor`:
//! - `TrackerCommand`: Commands sent to the actor
//! - `PlayerCall`: The player lifecycle callbacks carried by `TrackerCommand::Player`
//! - `TrackerError`: Errors surfaced by `TrackerHandle`

use pltx_core::{CorrelationId, Identity, SessionSnapshot};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Tracker Commands
// ============================================================================

/// Commands sent to the tracker actor.
///
/// Commands from the host carry a oneshot channel that is answered once
/// the actor has applied them, so callers observe their effects in order.
/// `LiveTick` and `SeekSettled` come from the actor's own timers.
#[derive(Debug)]
pub enum TrackerCommand {
    /// Start a new playback session, replacing any current one.
    ///
    /// Responds with the new session's `emi` id.
    Ready {
        /// Identity reported by the player (boxed for size optimization)
        identity: Box<Identity>,
        /// Channel to send the result
        respond_to: oneshot::Sender<CorrelationId>,
    },

    /// Apply a player lifecycle callback to the current session.
    ///
    /// Ignored when no session has been started.
    Player {
        /// The callback
        call: PlayerCall,
        /// Acknowledged after the call has been applied
        respond_to: oneshot::Sender<()>,
    },

    /// Get the tracking state of the current session.
    GetSnapshot {
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<SessionSnapshot>>,
    },

    /// One second of LIVE playback elapsed.
    ///
    /// Ticks from a ticker that has since been stopped are dropped.
    LiveTick {
        /// Generation of the ticker that produced this tick
        generation: u64,
    },

    /// The debounce window of a `seeked` call elapsed.
    SeekSettled,
}

/// Player lifecycle callbacks after `ready`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCall {
    AdImpression,
    Time { progress: f64, duration: f64 },
    Seek { offset: f64, duration: f64 },
    Seeked,
    Complete,
    Remove,
    /// The page is going away
    Unload,
}

impl PlayerCall {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AdImpression => "ad_impression",
            Self::Time { .. } => "time",
            Self::Seek { .. } => "seek",
            Self::Seeked => "seeked",
            Self::Complete => "complete",
            Self::Remove => "remove",
            Self::Unload => "unload",
        }
    }
}

// ============================================================================
// Tracker Errors
// ============================================================================

/// Errors that can occur when talking to a tracker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The actor has shut down.
    #[error("tracker channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_error_display() {
        assert_eq!(TrackerError::ChannelClosed.to_string(), "tracker channel closed");
    }

    #[test]
    fn test_player_call_names() {
        assert_eq!(PlayerCall::Time { progress: 1.0, duration: 2.0 }.name(), "time");
        assert_eq!(PlayerCall::Unload.name(), "unload");
    }

    #[tokio::test]
    async fn test_command_ack_pattern() {
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tx.send(()).ok();
        });
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_ack_is_an_error() {
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
