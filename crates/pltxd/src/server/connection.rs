//! Connection handler for a single host player bridge.
//!
//! Each connection stands for one page and gets its own tracker. The
//! handler:
//! - Performs protocol version negotiation
//! - Parses incoming lifecycle messages and forwards them to the tracker
//! - Flushes the session (page unload) when the connection ends for any reason
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pltx_protocol::{ClientMessage, DaemonMessage, MessageType, PROTOCOL_VERSION};

use crate::tracker::{TrackerError, TrackerHandle};

/// Maximum message size (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read timeout for idle connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Unique identifier for this connection
type ClientId = String;

/// Handler for one bridge connection.
pub struct PlayerConnection {
    /// Buffered reader for incoming messages
    reader: BufReader<OwnedReadHalf>,

    /// Buffered writer for replies
    writer: BufWriter<OwnedWriteHalf>,

    /// Tracker owning this page's playback session
    tracker: TrackerHandle,

    /// Server shutdown signal
    cancel_token: CancellationToken,

    /// Unique client identifier (assigned after handshake)
    client_id: Option<ClientId>,

    /// Counter for generating client IDs
    connection_number: u64,
}

impl PlayerConnection {
    /// Creates a new connection handler.
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        tracker: TrackerHandle,
        cancel_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            tracker,
            cancel_token,
            client_id: None,
            connection_number,
        }
    }

    /// Runs the connection handler.
    ///
    /// Performs the handshake, processes messages until the connection
    /// ends, then runs the unload flush. Returns the client id if the
    /// handshake succeeded.
    pub async fn run(mut self) -> Option<ClientId> {
        debug!(connection = self.connection_number, "New bridge connected");

        if let Err(e) = self.handle_handshake().await {
            warn!(
                connection = self.connection_number,
                error = %e,
                "Handshake failed"
            );
            return None;
        }
        info!(client_id = ?self.client_id, "Bridge handshake completed");

        if let Err(e) = self.process_messages().await {
            debug!(
                client_id = ?self.client_id,
                error = %e,
                "Connection closed"
            );
        }

        // However the connection ended, the page is gone
        if let Err(e) = self.tracker.unload().await {
            debug!(client_id = ?self.client_id, error = %e, "Unload flush failed");
        }

        info!(client_id = ?self.client_id, "Bridge disconnected");
        self.client_id
    }

    /// Expects a `Connect` message with a compatible protocol version.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        if msg.protocol_version != PROTOCOL_VERSION {
            warn!(
                client_version = msg.protocol_version,
                server_version = PROTOCOL_VERSION,
                "Protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "Protocol version {} not compatible with server version {}",
                msg.protocol_version, PROTOCOL_VERSION
            )))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: msg.protocol_version,
                server: PROTOCOL_VERSION,
            });
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id =
                    client_id.unwrap_or_else(|| format!("page-{}", self.connection_number));
                self.client_id = Some(assigned_id.clone());
                self.send_message(DaemonMessage::connected(assigned_id)).await
            }
            other => {
                self.send_message(DaemonMessage::error(
                    "Expected Connect message for handshake",
                ))
                .await?;

                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    /// Main message processing loop.
    ///
    /// Returns `Ok(())` on a clean end (EOF, `Disconnect`, server shutdown).
    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        let cancel_token = self.cancel_token.clone();
        loop {
            let read = tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!(client_id = ?self.client_id, "Server shutting down");
                    return Ok(());
                }
                read = timeout(READ_TIMEOUT, self.read_message()) => read,
            };

            let msg = match read {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(client_id = ?self.client_id, "Bridge sent EOF");
                    return Ok(());
                }
                Ok(Err(ConnectionError::ParseError(e))) => {
                    // Line already consumed; report and keep going
                    let _ = self.send_message(DaemonMessage::error(&e)).await;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(client_id = ?self.client_id, "Connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            match self.handle_message(msg.message).await {
                Ok(()) => {}
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Forwards one message to the tracker.
    async fn handle_message(&mut self, message: MessageType) -> Result<(), ConnectionError> {
        match message {
            MessageType::Connect { .. } => {
                self.send_message(DaemonMessage::error("Already connected"))
                    .await?;
            }
            ready @ MessageType::Ready { .. } => {
                let identity = ready.identity().unwrap_or_default();
                let session_id = self.tracker.ready(identity).await?;
                debug!(client_id = ?self.client_id, session_id = %session_id, "Session ready");
            }
            MessageType::AdImpression => self.tracker.ad_impression().await?,
            MessageType::Time { progress, duration } => {
                self.tracker.time(progress, duration).await?;
            }
            MessageType::Seek { offset, duration } => {
                self.tracker.seek(offset, duration).await?;
            }
            MessageType::Seeked => self.tracker.seeked().await?,
            MessageType::Complete => self.tracker.complete().await?,
            MessageType::Remove => self.tracker.remove().await?,
            MessageType::Unload => self.tracker.unload().await?,
            MessageType::Ping { seq } => {
                self.send_message(DaemonMessage::pong(seq)).await?;
            }
            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "Bridge requested disconnect");
                return Err(ConnectionError::Eof);
            }
        }

        Ok(())
    }

    /// Reads a single message from the bridge.
    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage = serde_json::from_str(&line)
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    /// Sends a message to the bridge.
    async fn send_message(&mut self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        let writer = &mut self.writer;
        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    /// Returns the client ID (if connected).
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u16, server: u16 },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
}
