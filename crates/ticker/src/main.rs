//! NGO price ticker
//!
//! Keeps the watch-list prices refreshed and logs each update

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ngo_core::PriceFeedConfig;
use ngo_price_feed::{PriceService, PriceSource, RefreshScheduler};
use ngo_ticker::format_state;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting NGO price ticker v{}", env!("CARGO_PKG_VERSION"));

    let config = PriceFeedConfig::load().context("failed to load configuration")?;

    let refresh_interval = config.refresh.interval();
    let service = Arc::new(PriceService::new(config)?);

    match service.config().aggregator.usable_credentials() {
        Some(credentials) => {
            info!("Authenticated aggregator calls enabled (key {})", credentials.key_hint());
            if let Some(chains) = service.get_supported_chains().await {
                info!("Aggregator supports {} chains", chains.len());
            }
        }
        None => warn!("Aggregator credentials not configured, quotes use demo fallback"),
    }

    match refresh_interval {
        Some(interval) => info!("Refreshing prices every {:?}", interval),
        None => info!("Periodic refresh disabled, fetching once"),
    }

    let source: Arc<dyn PriceSource> = Arc::clone(&service) as Arc<dyn PriceSource>;
    let mut subscription = RefreshScheduler::new(source, refresh_interval).subscribe();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = subscription.changed() => {
                if !changed {
                    error!("Refresh task stopped unexpectedly");
                    break;
                }

                let state = subscription.state();
                if state.is_loading {
                    continue;
                }
                for line in format_state(&state).lines() {
                    info!("{}", line);
                }
            }
        }
    }

    subscription.shutdown().await;

    let stats = service.stats();
    info!(
        "Shutdown complete: {} cache hits, {} synthesized, {} live ok, {} live failed",
        stats.cache_hits, stats.synthesized, stats.live_success, stats.live_failed
    );
    Ok(())
}
