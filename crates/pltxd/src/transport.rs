//! Beacon delivery.
//!
//! Delivery is fire-and-forget: the dispatcher builds the URL, spawns the
//! request and returns immediately. Failures are logged and dropped; there
//! is no retry, queue or backoff.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Transport errors never propagate past the dispatcher

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use pltx_core::PingParams;
use pltx_protocol::beacon_url;

/// Errors a transport can report. The dispatcher only logs them.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("collector answered with status {status}")]
    Status { status: u16 },
}

/// Something that can carry a beacon URL to the collector.
#[async_trait]
pub trait BeaconTransport: Send + Sync {
    async fn deliver(&self, url: Url) -> Result<(), TransportError>;
}

/// GET-based delivery through a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Client` if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BeaconTransport for HttpTransport {
    async fn deliver(&self, url: Url) -> Result<(), TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
            })
        }
    }
}

/// Drops every beacon. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardTransport;

#[async_trait]
impl BeaconTransport for DiscardTransport {
    async fn deliver(&self, _url: Url) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Turns pings into best-effort sends.
#[derive(Clone)]
pub struct BeaconDispatcher {
    transport: Arc<dyn BeaconTransport>,
    collector_host: String,
}

impl BeaconDispatcher {
    pub fn new(transport: Arc<dyn BeaconTransport>, collector_host: impl Into<String>) -> Self {
        Self {
            transport,
            collector_host: collector_host.into(),
        }
    }

    pub fn collector_host(&self) -> &str {
        &self.collector_host
    }

    /// Sends a ping without waiting for, or reporting, the outcome.
    ///
    /// Pings without an account id are written to the log instead.
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, ping: &PingParams) {
        let url = match beacon_url(&self.collector_host, ping) {
            Ok(url) => url,
            Err(e) => {
                warn!(event = %ping.event, error = %e, "Failed to build beacon URL");
                return;
            }
        };

        if !ping.is_deliverable() {
            info!(event = %ping.event, url = %url, "No account id, beacon not sent");
            return;
        }

        let transport = Arc::clone(&self.transport);
        let event = ping.event;
        tokio::spawn(async move {
            if let Err(e) = transport.deliver(url).await {
                debug!(event = %event, error = %e, "Beacon delivery failed");
            }
        });
    }
}

impl std::fmt::Debug for BeaconDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconDispatcher")
            .field("collector_host", &self.collector_host)
            .finish_non_exhaustive()
    }
}
