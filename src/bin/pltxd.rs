//! pltx Daemon - Playback telemetry tracker
//!
//! Accepts player lifecycle events from host bridges over a Unix socket
//! and turns them into analytics beacons.
//!
//! # Usage
//!
//! ```bash
//! # Run the bridge server (foreground)
//! pltxd serve
//!
//! # Run on a custom socket with a config file
//! pltxd serve --socket /run/pltx.sock --config ./pltx.toml
//!
//! # Print the beacons a recorded session would send
//! pltxd replay session.jsonl
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pltx_core::PingParams;
use pltx_protocol::{beacon_url, MessageType};
use pltxd::config::TrackerConfig;
use pltxd::server::TrackerServer;
use pltxd::tracker::{spawn_tracker, PlayerCall, TrackerDeps, TrackerHandle};
use pltxd::transport::{BeaconTransport, DiscardTransport, HttpTransport};

/// pltx daemon - playback telemetry tracker
#[derive(Parser, Debug)]
#[command(name = "pltxd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge server until SIGINT/SIGTERM
    Serve {
        /// Unix socket path (overrides config and PLTX_SOCKET)
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    /// Feed a JSON-lines file of player messages through one tracker
    Replay {
        /// File with one player message per line
        file: PathBuf,

        /// Deliver the beacons to the collector instead of only printing them
        #[arg(long)]
        send: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing()?;

    let config = TrackerConfig::load(args.config.as_deref()).context("Failed to load config")?;

    match args.command.unwrap_or(Command::Serve { socket: None }) {
        Command::Serve { socket } => run_server(config, socket),
        Command::Replay { file, send } => run_replay(config, &file, send),
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pltxd=info".parse()?)
                .add_directive("pltx_core=info".parse()?)
                .add_directive("pltx_protocol=info".parse()?),
        )
        .init();
    Ok(())
}

fn http_transport(config: &TrackerConfig) -> Result<Arc<dyn BeaconTransport>> {
    let transport = HttpTransport::new(config.request_timeout())
        .context("Failed to create HTTP transport")?;
    Ok(Arc::new(transport))
}

#[tokio::main]
async fn run_server(config: TrackerConfig, socket: Option<PathBuf>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "pltx daemon starting"
    );

    let socket_path = socket.unwrap_or_else(|| config.socket_path.clone());
    let deps = TrackerDeps::new(http_transport(&config)?, &config);
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let server = TrackerServer::new(&socket_path, deps, cancel_token);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("pltx daemon stopped");
    Ok(())
}

#[tokio::main]
async fn run_replay(config: TrackerConfig, file: &Path, send: bool) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let transport: Arc<dyn BeaconTransport> = if send {
        http_transport(&config)?
    } else {
        Arc::new(DiscardTransport)
    };
    let deps = TrackerDeps::new(transport, &config);
    let host = deps.dispatcher.collector_host().to_string();
    let debounce = deps.seek_debounce;

    let tracker = spawn_tracker(deps);
    let mut pings = tracker.subscribe();
    let mut out = std::io::stdout().lock();

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let message: MessageType = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(line = number + 1, error = %e, "Skipping malformed line");
                continue;
            }
        };

        replay_message(&tracker, message)
            .await
            .with_context(|| format!("Tracker stopped at line {}", number + 1))?;
        print_pings(&mut pings, &host, &mut out)?;
    }

    // Let pending seek debounces fire before the page goes away
    tokio::time::sleep(debounce).await;
    print_pings(&mut pings, &host, &mut out)?;

    tracker.unload().await.context("Tracker stopped before unload")?;
    print_pings(&mut pings, &host, &mut out)?;

    Ok(())
}

async fn replay_message(tracker: &TrackerHandle, message: MessageType) -> Result<()> {
    let call = match message {
        ready @ MessageType::Ready { .. } => {
            tracker.ready(ready.identity().unwrap_or_default()).await?;
            return Ok(());
        }
        MessageType::AdImpression => PlayerCall::AdImpression,
        MessageType::Time { progress, duration } => PlayerCall::Time { progress, duration },
        MessageType::Seek { offset, duration } => PlayerCall::Seek { offset, duration },
        MessageType::Seeked => PlayerCall::Seeked,
        MessageType::Complete => PlayerCall::Complete,
        MessageType::Remove => PlayerCall::Remove,
        MessageType::Unload => PlayerCall::Unload,
        MessageType::Connect { .. } | MessageType::Ping { .. } | MessageType::Disconnect => {
            return Ok(());
        }
    };
    tracker.call(call).await?;
    Ok(())
}

fn print_pings(
    pings: &mut broadcast::Receiver<PingParams>,
    host: &str,
    out: &mut impl Write,
) -> Result<()> {
    loop {
        match pings.try_recv() {
            Ok(ping) => match beacon_url(host, &ping) {
                Ok(url) => writeln!(out, "{url}")?,
                Err(e) => warn!(event = %ping.event, error = %e, "Could not encode ping"),
            },
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                warn!(missed, "Replay output fell behind");
            }
            Err(_) => return Ok(()),
        }
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
