//! Hot Pot dashboard daemon
//!
//! Hosts one dashboard session: a conversion batch engine and an order board
//! backed by the remote ledger, exposed to presentation layers over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use hotpot_dashboard_core::api::{self, AppState};
use hotpot_dashboard_core::backend::{guarded, Backend, HttpBackend};
use hotpot_dashboard_core::config::Settings;
use hotpot_dashboard_core::conversion::ConversionBatchEngine;
use hotpot_dashboard_core::domain::OrderFilter;
use hotpot_dashboard_core::lifecycle::OrderBoard;
use hotpot_dashboard_core::metrics::{self, MetricsServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; the output format is part of it
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(settings.logging.json);

    info!(
        "Starting Hot Pot dashboard v{} ({})",
        env!("CARGO_PKG_VERSION"),
        settings.service.instance_id
    );
    for warning in settings.warnings() {
        warn!("{}", warning);
    }

    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&settings.backend).context("Failed to create backend client")?);
    let request_timeout = settings.backend.request_timeout();

    let mut engine = ConversionBatchEngine::new(
        backend.clone(),
        settings.default_rate(),
        request_timeout,
    );
    match engine.refresh_holders().await {
        Ok(count) => info!("Loaded {} token holders", count),
        Err(e) => warn!("Initial holder fetch failed: {} - will retry on demand", e),
    }

    let board = OrderBoard::new(backend.clone(), request_timeout);
    match board.refresh(&OrderFilter::default()).await {
        Ok(count) => info!("Loaded {} orders", count),
        Err(e) => warn!("Initial order fetch failed: {} - will retry on demand", e),
    }

    let state = AppState::new(
        engine,
        board,
        settings.conversion.min_utility_for_participation,
    );

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = state.clone();
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Backend health check loop
    let health_handle = if settings.service.health_check_interval_secs > 0 {
        let backend = backend.clone();
        let interval = settings.service.health_check_interval_secs;
        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                let healthy = guarded("health_check", request_timeout, backend.fetch_holders())
                    .await
                    .is_ok();
                if !healthy {
                    warn!("Backend health check failed");
                }
                metrics::record_health_check(healthy);
            }
        }))
    } else {
        None
    };

    info!("Hot Pot dashboard is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }
    if let Some(h) = health_handle {
        h.abort();
    }

    info!("Hot Pot dashboard stopped");
    Ok(())
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,hotpot_dashboard_core=debug,hyper=warn,reqwest=warn")
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
