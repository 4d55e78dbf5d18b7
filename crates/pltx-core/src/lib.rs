//! pltx Core - Domain types for playback telemetry
//!
//! This crate provides the playback session state machine and the
//! quantile math shared between the wire codec (pltx-protocol) and the
//! tracker runtime (pltxd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod event;
pub mod identity;
pub mod ping;
pub mod quantile;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use event::{Bucket, EventCode};
pub use identity::{CorrelationId, CorrelationIds, Identity};
pub use ping::PingParams;
pub use quantile::{progress_units, quantile_count, quantile_index, MAX_PROGRESS_UNITS};
pub use session::{Directive, Session, SessionSnapshot, StreamKind, LIVE_FLUSH_THRESHOLD_SECS};
