//! Block relay.
//!
//! Follows a chain and hands each finalized block to one consumer, holding
//! the next block until the consumer acknowledges the current one.
//!
//! # Architecture Overview
//!
//! ```text
//!   JSON-RPC node                                   Consumer
//!        │                                     ┌──────────────┐
//!        ▼                                     │  /block   ◀──┼── records
//!  ┌────────────┐   ┌────────┐   ┌──────────┐  │              │
//!  │ blockchain │──▶│ driver │──▶│ delivery │──┤              │
//!  │  follower  │   │ facade │   │  engine  │  │ /acknowledge─┼──▶ block hash
//!  └────────────┘   └────────┘   └──────────┘  └──────────────┘
//!                                      ▲
//!                          http server │ (installs sender/receiver)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::task::{JoinError, JoinHandle};

use block_relay::block::BlockProcessor;
use block_relay::blockchain::{BlockFollower, BlockchainClient};
use block_relay::config::{load_config, RelayConfig};
use block_relay::delivery::DeliveryEngine;
use block_relay::driver::{Driver, DriverResult};
use block_relay::http::RelayServer;
use block_relay::lifecycle::{signals, Shutdown};
use block_relay::observability::{init_logging, init_metrics, DeliveryObserver, TracingObserver};

#[derive(Parser)]
#[command(name = "block-relay")]
#[command(about = "Relay finalized blocks to an acknowledging consumer", long_about = None)]
struct Args {
    /// Path to the TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

type FollowerTask = JoinHandle<DriverResult<u64>>;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "block-relay failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "block-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        send_route = %config.listener.send_route,
        ack_route = %config.listener.ack_route,
        retry_interval_ms = config.delivery.retry_interval_ms,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let observer: Arc<dyn DeliveryObserver> = Arc::new(TracingObserver);
    let engine = Arc::new(DeliveryEngine::new(&config.delivery, observer));

    let server = RelayServer::new(config.listener.clone(), engine.clone())
        .spawn()
        .await?;

    let driver = Arc::new(
        Driver::builder()
            .data_handler(Arc::new(BlockProcessor::new()))
            .engine(engine)
            .transport(Box::new(server))
            .build()?,
    );

    let shutdown = Shutdown::new();
    let mut follower = if config.source.enabled {
        let client = BlockchainClient::new(config.source.clone()).await?;
        let follower = BlockFollower::new(
            Arc::new(client),
            driver.clone(),
            &config.source,
            shutdown.clone(),
        );
        Some(tokio::spawn(follower.run()))
    } else {
        tracing::info!("Block source disabled, relay is idle until blocks are saved");
        None
    };

    let finished = tokio::select! {
        _ = signals::wait_for_signal() => None,
        result = follower_finished(&mut follower) => Some(result),
    };

    tracing::info!("Shutting down");
    shutdown.trigger();
    driver.shutdown().await?;

    let result = match (finished, follower) {
        (Some(result), _) => Some(result),
        (None, Some(task)) => Some(task.await),
        (None, None) => None,
    };

    if let Some(result) = result {
        let relayed = result??;
        tracing::info!(relayed, "Block follower finished");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn follower_finished(
    task: &mut Option<FollowerTask>,
) -> Result<DriverResult<u64>, JoinError> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}
