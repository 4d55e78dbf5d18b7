//! Messages exchanged with the host player bridge.
//!
//! The bridge opens one connection per page and writes one JSON object
//! per line. The first line must be a `connect`; after that each line is
//! a player lifecycle callback.

use pltx_core::Identity;
use serde::{Deserialize, Serialize};

/// Major protocol version; connections with a different major are rejected.
pub const PROTOCOL_VERSION: u16 = 1;

/// Message types sent by the bridge to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Handshake
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Player is ready; starts a new playback session
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bundle_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feed_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    /// An ad was shown
    AdImpression,

    /// Playback position tick
    Time { progress: f64, duration: f64 },

    /// User started seeking
    Seek { offset: f64, duration: f64 },

    /// Seek finished
    Seeked,

    /// Playback reached the end
    Complete,

    /// Player detached from the page
    Remove,

    /// Page is going away
    Unload,

    /// Liveness check
    Ping { seq: u64 },

    /// Bridge is closing the connection
    Disconnect,
}

impl MessageType {
    /// Identity carried by a `Ready` message.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::Ready {
                account_id,
                bundle_id,
                feed_id,
                media_id,
                title,
            } => Some(Identity {
                account_id: account_id.clone(),
                bundle_id: bundle_id.clone(),
                feed_id: feed_id.clone(),
                media_id: media_id.clone(),
                title: title.clone(),
            }),
            _ => None,
        }
    }

    /// Builds a `Ready` message from an identity.
    pub fn ready(identity: Identity) -> Self {
        Self::Ready {
            account_id: identity.account_id,
            bundle_id: identity.bundle_id,
            feed_id: identity.feed_id,
            media_id: identity.media_id,
            title: identity.title,
        }
    }
}

/// Message from bridge to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol major version
    pub protocol_version: u16,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a message with the current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            message,
        }
    }

    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }
}

/// Message from daemon to bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Handshake accepted
    Connected {
        client_id: String,
        protocol_version: u16,
    },

    /// Handshake refused; the daemon closes the connection
    Rejected { reason: String },

    /// Reply to `Ping`
    Pong { seq: u64 },

    /// A line could not be processed; the connection stays open
    Error { message: String },
}

impl DaemonMessage {
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            client_id,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
        }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_message() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"protocol_version":1,"type":"time","progress":10,"duration":40.5}"#)
                .unwrap();
        assert_eq!(msg.protocol_version, 1);
        assert_eq!(
            msg.message,
            MessageType::Time {
                progress: 10.0,
                duration: 40.5
            }
        );
    }

    #[test]
    fn test_parse_ready_with_missing_fields() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"protocol_version":1,"type":"ready","account_id":"acct","title":"Intro"}"#,
        )
        .unwrap();

        let identity = msg.message.identity().unwrap();
        assert_eq!(identity.account_id.as_deref(), Some("acct"));
        assert_eq!(identity.title.as_deref(), Some("Intro"));
        assert_eq!(identity.bundle_id, None);
    }

    #[test]
    fn test_unit_variants() {
        for (json, expected) in [
            (r#"{"type":"seeked"}"#, MessageType::Seeked),
            (r#"{"type":"complete"}"#, MessageType::Complete),
            (r#"{"type":"remove"}"#, MessageType::Remove),
            (r#"{"type":"unload"}"#, MessageType::Unload),
            (r#"{"type":"ad_impression"}"#, MessageType::AdImpression),
        ] {
            let parsed: MessageType = serde_json::from_str(json).unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"protocol_version":1,"type":"play"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_daemon_message_json() {
        let json = serde_json::to_string(&DaemonMessage::connected("page-1".to_string())).unwrap();
        assert_eq!(
            json,
            r#"{"type":"connected","client_id":"page-1","protocol_version":1}"#
        );

        let json = serde_json::to_string(&DaemonMessage::pong(7)).unwrap();
        assert_eq!(json, r#"{"type":"pong","seq":7}"#);
    }

    #[test]
    fn test_ready_identity_round_trip() {
        let identity = Identity {
            account_id: Some("a".to_string()),
            media_id: Some("m".to_string()),
            ..Identity::default()
        };
        let msg = MessageType::ready(identity.clone());
        assert_eq!(msg.identity(), Some(identity));
        assert_eq!(MessageType::Seeked.identity(), None);
    }
}
