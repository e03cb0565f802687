//! Proxyvote - Entry Point
//!
//! Builds the proxy catalog and runs the request loop until it terminates
//! or a shutdown signal arrives.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proxyvote::catalog::{HttpGeoLookup, JsonFileSource, ProxyCatalog, ProxySource};
use proxyvote::config::{Config, LogConfig};
use proxyvote::engine::{ReqwestTransport, RequestLoop, SystemClock, WeightedUserAgents};

#[tokio::main]
async fn main() -> proxyvote::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting proxyvote against {}", config.target.url);

    // Acquire and filter proxies
    let source = JsonFileSource::new(&config.proxy.list_path);
    let raw = source.fetch().await?;

    let geo = HttpGeoLookup::new(&config.geo.lookup_url, config.geo_timeout())?;
    let built = ProxyCatalog::build_with_concurrency(
        raw,
        &geo,
        &config.filter_criteria(),
        config.geo.concurrency,
    )
    .await;
    if geo.rate_limited() > 0 {
        warn!(
            "{} geo lookups were rate limited; lower GEO_CONCURRENCY or use another GEO_LOOKUP_URL",
            geo.rate_limited()
        );
    }
    let catalog = built.inspect_err(|e| {
        if e.is_catalog_error() {
            error!("No usable proxies in {}: {}", config.proxy.list_path.display(), e);
        } else {
            error!("Catalog build failed: {}", e);
        }
    })?;
    info!("Loaded {} eligible proxies", catalog.len());

    let rotor = catalog.into_rotor()?;

    let request_loop = RequestLoop::new(
        rotor,
        config.loop_config(),
        Arc::new(ReqwestTransport::new(config.request_timeout())),
        Arc::new(WeightedUserAgents::builtin()?),
        Arc::new(SystemClock),
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let summary = request_loop.run(shutdown_rx).await;
    signal_task.abort();

    info!(
        "Run finished ({}): {} successes, {} failures",
        summary.reason, summary.counters.success_count, summary.counters.failure_count
    );
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("proxyvote={}", log.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
