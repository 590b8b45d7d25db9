//! # pt-runner
//!
//! Main entry point for the price-tap system.
//!
//! Loads a JSON configuration file, builds one price cache per (venue, feed),
//! creates a venue adapter for each configured exchange, and manages their
//! lifecycle until Ctrl+C or until a connection gives up reconnecting.
//!
//! # Usage
//!
//! ```bash
//! pt-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use pt_core::Feed;
use pt_core::cache::{LogSink, PriceCache};
use pt_core::config::{AppConfig, CacheMode, VenueConfig};
use pt_core::ws::ConnectionEvent;
use pt_md::{FeedCaches, VenueAdapter};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Streaming price ingestion runner.
#[derive(Parser)]
#[command(name = "pt-runner", about = "Streaming price ingestion runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output. Overrides the config file.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = pt_core::config::load_config(&cli.config)?;

    // 2. Initialize logging (CLI flags win over the config file)
    let logging = config.logging.clone();
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let log_dir = cli.log_dir.clone().or_else(|| logging.as_ref().and_then(|l| l.log_path.clone()));
    let module_name = logging
        .as_ref()
        .and_then(|l| l.module_name.clone())
        .unwrap_or_else(|| "pt-runner".to_string());
    pt_core::logging::init_logging(&level, log_dir.as_deref(), &module_name);

    info!(
        "pt-runner starting, config={}, log_level={level}, venues={}, cache={:?}",
        cli.config.display(),
        config.venues.len(),
        config.cache.mode,
    );

    // 3. Create caches and adapters
    let mut caches: Vec<Arc<PriceCache>> = Vec::new();
    let mut adapters: Vec<Box<dyn VenueAdapter>> = Vec::new();
    for (idx, venue_cfg) in config.venues.iter().enumerate() {
        let feeds = build_caches(&config, venue_cfg);
        caches.extend(feeds.iter().map(|(_, c)| Arc::clone(c)));
        match pt_md::registry::create_adapter(venue_cfg, feeds) {
            Ok(adapter) => {
                info!("venue[{idx}]: created adapter '{}'", adapter.name());
                adapters.push(adapter);
            }
            Err(e) => error!("venue[{idx}]: failed to create adapter for '{}': {e:#}", venue_cfg.exchange),
        }
    }
    if adapters.is_empty() {
        bail!("no venue adapter could be created");
    }

    // 4. Watch lifecycle events, then start
    let (exhausted_tx, mut exhausted_rx) = mpsc::channel::<String>(8);
    for adapter in &adapters {
        for (label, mut events) in adapter.take_event_receivers() {
            let tx = exhausted_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        ConnectionEvent::ReconnectExhausted { attempts } => {
                            error!("[{label}] reconnection exhausted after {attempts} attempt(s)");
                            let _ = tx.send(label.clone()).await;
                        }
                        ConnectionEvent::Disconnected => warn!("[{label}] disconnected"),
                        other => info!("[{label}] {other:?}"),
                    }
                }
            });
        }
    }
    drop(exhausted_tx);

    let mut start_error = None;
    for adapter in &adapters {
        if let Err(e) = adapter.start().await {
            error!("{e:#}");
            start_error = Some(e);
            break;
        }
    }

    // 5. Wait for shutdown signal or a fatal connection event
    let mut failure = start_error.map(|e| e.context("startup failed"));
    if failure.is_none() {
        info!("all {} adapter(s) started, press Ctrl+C to stop", adapters.len());
        failure = wait_for_shutdown(tokio::signal::ctrl_c(), &mut exhausted_rx).await;
    }

    // 6. Stop adapters, then caches (final flush)
    for adapter in &adapters {
        info!("stopping adapter '{}'", adapter.name());
        if let Err(e) = adapter.stop().await {
            error!("error stopping '{}': {e}", adapter.name());
        }
    }
    for cache in &caches {
        cache.stop().await;
    }

    match failure {
        Some(e) => Err(e),
        None => {
            info!("all adapters stopped, goodbye");
            Ok(())
        }
    }
}

/// Resolve on Ctrl+C or on the first exhausted connection. A failing signal
/// listener is logged and treated as a shutdown request so the stop sequence
/// still runs.
async fn wait_for_shutdown(
    signal: impl Future<Output = std::io::Result<()>>,
    exhausted_rx: &mut mpsc::Receiver<String>,
) -> Option<anyhow::Error> {
    tokio::select! {
        r = signal => {
            match r {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!("failed to listen for Ctrl+C, shutting down: {e}"),
            }
            None
        }
        Some(label) = exhausted_rx.recv() => {
            Some(anyhow::anyhow!("connection {label} exhausted its reconnection attempts"))
        }
    }
}

/// One cache per feed of this venue, named `{venue}_{feed}`.
fn build_caches(config: &AppConfig, venue_cfg: &VenueConfig) -> FeedCaches {
    Feed::ALL.iter().fold(FeedCaches::new(), |caches, feed| {
        let name = format!("{}_{}", venue_cfg.exchange, feed);
        let cache = match config.cache.mode {
            CacheMode::Direct => PriceCache::direct(name),
            CacheMode::Batched => {
                let sink = Arc::new(LogSink::new(name.clone()));
                PriceCache::batched(name, config.cache.batch_config(), sink)
            }
        };
        caches.with(*feed, cache)
    })
}
