//! pltx Daemon - Playback tracker runtime
//!
//! This crate provides the runtime around the `pltx-core` session:
//! - `tracker` - Tracker actor owning one playback session, plus its timers
//! - `transport` - Fire-and-forget beacon delivery over HTTP
//! - `server` - Unix socket server bridging host players to trackers
//! - `config` - TOML/env configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Host player    │────▶│  TrackerActor   │────▶│ BeaconDispatcher │
//! │  (per page)     │     │ (session owner) │     │  (spawned GETs)  │
//! └─────────────────┘     └────────┬────────┘     └──────────────────┘
//!         │                    ▲   │                        │
//!         │ TrackerCommand     │   │ PingParams             ▼
//!         │ (mpsc channel)     │   │ (broadcast)      collector /v1/…
//!         ▼                    │   ▼
//!   ready/time/seek/…   LiveTick / SeekSettled
//!                       (ticker + debounce tasks)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod clock;
pub mod config;
pub mod ids;
pub mod server;
pub mod tracker;
pub mod transport;
