//! pltx Protocol - Wire formats
//!
//! This crate provides:
//! - `beacon` - the collector URL and query string of an analytics ping
//! - `message` - JSON-lines messages exchanged with the host player bridge

pub mod beacon;
pub mod message;

pub use beacon::{beacon_url, collector_url, decode_beacon, encode_query, DEFAULT_COLLECTOR_HOST};
pub use message::{ClientMessage, DaemonMessage, MessageType, PROTOCOL_VERSION};
