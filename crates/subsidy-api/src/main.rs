//! Subsidy API binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ledger_gateway::{ConnectionManager, InitOutcome};
use subsidy_api::{init_logging, CliArgs, SubsidyApiService};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = CliArgs::parse().into_config();

    init_logging(config.logging.format, &config.logging.level)
        .context("failed to initialise logging")?;
    config.validate().context("invalid configuration")?;

    let connections = Arc::new(ConnectionManager::http(config.ledger.client_timeouts()));
    match connections.initialize(&config.ledger) {
        InitOutcome::Failed(reason) => {
            warn!(%reason, "starting without a ledger connection; ledger routes will return 503")
        }
        outcome => info!(?outcome, network = %config.ledger.network, "ledger connection ready"),
    }

    let service = SubsidyApiService::new(config, connections)?;
    service.serve(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
