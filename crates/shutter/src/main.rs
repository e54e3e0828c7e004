//! Shutter binary entry point.
//!
//! Usage: shutter [--watch-dir <dir>] [--server-host <host>] [--server-port <port>]
//!
//! Watches a directory for new images and relays them to
//! `ws://<host>:<port><path>`. Exits non-zero if the connection is lost for
//! good.

use anyhow::{bail, Context};
use clap::Parser;
use shutter::{CloseReason, ImageWatcher, RelayConfig, ShutterClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Shutter: relay new images to a remote endpoint over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "shutter")]
#[command(about = "Relays newly captured images to a remote endpoint over WebSocket")]
struct Args {
    /// Directory to watch (recursively) for new images.
    #[arg(long, env = "WATCH_DIRECTORY", default_value = "/images")]
    watch_dir: PathBuf,

    /// Remote host.
    #[arg(long, env = "SERVER_HOST", default_value = "localhost")]
    server_host: String,

    /// Remote port.
    #[arg(long, env = "SERVER_PORT", default_value = "8000")]
    server_port: u16,

    /// WebSocket path on the remote.
    #[arg(long, env = "URL_PATH", default_value = "/images")]
    url_path: String,

    /// Bearer token for the WebSocket handshake.
    #[arg(long, env = "SHUTTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Wait after a file appears before reading it, in milliseconds.
    #[arg(long, env = "SHUTTER_SETTLE_MS", default_value = "1000")]
    settle_ms: u64,

    /// Reconnect backoff unit in seconds.
    #[arg(long, env = "SHUTTER_RECONNECT_INTERVAL_SECS", default_value = "5")]
    reconnect_interval_secs: u64,

    /// Consecutive failed connection attempts before giving up.
    #[arg(long, env = "SHUTTER_MAX_RECONNECT_ATTEMPTS", default_value = "10")]
    max_reconnect_attempts: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also append JSONL logs to this file.
    #[arg(long, env = "SHUTTER_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "shutter".into(),
        default_level: args.log_level.clone(),
        log_path: args.log_file.clone(),
        also_stderr: true,
    });

    info!("Shutter starting...");

    let url = RelayConfig::endpoint_url(&args.server_host, args.server_port, &args.url_path)?;
    let mut config = RelayConfig::new(url);
    config.api_key = args.api_key;
    config.reconnect_interval = Duration::from_secs(args.reconnect_interval_secs);
    config.max_reconnect_attempts = args.max_reconnect_attempts;

    info!(
        url = %config.url,
        watch_dir = %args.watch_dir.display(),
        authenticated = config.api_key.is_some(),
        reconnect_interval_secs = args.reconnect_interval_secs,
        max_reconnect_attempts = config.max_reconnect_attempts,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&args.watch_dir)
        .with_context(|| format!("creating watch directory {}", args.watch_dir.display()))?;

    let client = Arc::new(ShutterClient::new(config)?);
    client.start();

    let watcher = ImageWatcher::new(args.watch_dir.clone(), Duration::from_millis(args.settle_ms))?;
    let watching = tokio::spawn(watcher.run(client.clone()));

    let reason = tokio::select! {
        reason = client.closed() => Some(reason),
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting...");
            None
        }
    };

    watching.abort();
    if let Err(e) = client.close().await {
        warn!(error = %e, "Client did not shut down cleanly");
    }

    if reason == Some(CloseReason::RetriesExhausted) {
        error!("Connection lost permanently");
        bail!("permanently disconnected from {}", args.server_host);
    }

    info!("Shutter stopped");
    Ok(())
}
