//! Provenance Daemon (`provenanced`)
//!
//! Headless ledger-sync daemon: subscribes to block-commit and
//! namespaced state-delta events and projects them into the
//! block-versioned read store. Transient platform and database
//! failures are retried indefinitely with a fixed wait.

use clap::Parser;
use provenance_batch::Signer;
use provenance_model::Config;
use provenance_net::{NetError, ValidatorClient};
use provenance_store::BlockStore;
use provenance_sync::{BlockEvent, DeltaQueue, DeltaQueueHandle};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "provenanced", version, about = "Provenance ledger-sync daemon")]
struct Args {
    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tracing::info!("provenanced v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    // The batcher identity is the server's identity; failing to load
    // it is fatal.
    let signer = Signer::from_hex(&config.private_key)?;
    tracing::info!("Batcher key: {}", &signer.public_key_hex()[..8]);

    let store = open_store(&config).await;
    let queue = DeltaQueue::spawn(store.clone());

    tokio::select! {
        result = sync_loop(&config, queue.clone()) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received...");
        }
    }

    queue.shutdown().await;
    tracing::info!("Daemon stopped");
    Ok(())
}

/// Open the read store, retrying until the database is available.
async fn open_store(config: &Config) -> Arc<BlockStore> {
    loop {
        match BlockStore::open(config.db_path()) {
            Ok(store) => {
                tracing::info!("Read store ready at {}", config.db_path().display());
                return Arc::new(store);
            }
            Err(err) => {
                tracing::warn!("Read store unavailable, retrying: {}", err);
                tokio::time::sleep(config.retry_wait).await;
            }
        }
    }
}

/// Connect, subscribe from the genesis anchor, and feed events into
/// the delta queue. Reconnects forever on transient failures; returns
/// an error only on the fatal cases (hard subscription rejection after
/// a successful handshake, or a failed block application).
async fn sync_loop(config: &Config, queue: DeltaQueueHandle) -> anyhow::Result<()> {
    let mut was_subscribed = false;

    loop {
        let client = match ValidatorClient::connect(&config.validator_url).await {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!("Validator unreachable: {}", err);
                tokio::time::sleep(config.retry_wait).await;
                continue;
            }
        };

        // No persisted cursor: the projection is idempotent, so the
        // stream always restarts from the genesis anchor.
        let mut events = match client.subscribe(vec![]).await {
            Ok(events) => events,
            Err(err @ NetError::Rejected(_)) if was_subscribed => {
                anyhow::bail!("subscription rejected: {}", err);
            }
            Err(err) => {
                tracing::warn!("Subscription failed: {}", err);
                tokio::time::sleep(config.retry_wait).await;
                continue;
            }
        };
        was_subscribed = true;
        tracing::info!("Subscribed to block events at {}", config.validator_url);

        while let Some(event_list) = events.recv().await {
            let event = BlockEvent::from(event_list);
            tracing::debug!(
                "Block {} with {} changes",
                event.block_num,
                event.changes.len()
            );
            if let Err(err) = queue.apply(event).await {
                // A half-applied block would corrupt the interval
                // bookkeeping on the next run; stop here.
                anyhow::bail!("block application failed: {}", err);
            }
        }

        tracing::warn!("Event stream ended, reconnecting");
        tokio::time::sleep(config.retry_wait).await;
    }
}

fn init_tracing(verbosity: u8) {
    let mut filter = EnvFilter::from_default_env();

    // Only apply defaults if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        let level = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        filter = filter.add_directive(level.parse().unwrap());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
    }
}
