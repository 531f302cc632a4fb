//! `egain-exporter` -- Prometheus exporter for eGain indoor sensors.
//!
//! Polls every configured sensor once at startup and then once per
//! interval, and serves the latest readings on `/metrics`. See
//! [`egain_exporter::config`] for flags and environment variables.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use egain_client::{EgainClient, RateLimiter};
use egain_exporter::config::{Args, ExporterConfig};
use egain_exporter::metrics::MetricsPublisher;
use egain_exporter::poller::Poller;
use egain_exporter::routes;
use egain_exporter::scheduler::Scheduler;
use egain_exporter::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.log_json);

    // --- Configuration ---
    let config = ExporterConfig::from_args(args).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        sensors = config.sensors.len(),
        listen = %config.listen,
        base_url = %config.base_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        fetch_timeout_secs = config.fetch_timeout.as_secs(),
        rate_interval_secs = config.rate.interval.as_secs(),
        rate_burst = config.rate.burst,
        "Starting egain-exporter",
    );
    for sensor in config.sensors.sensors() {
        tracing::info!(sensor_id = sensor.id(), location = sensor.location(), "Registered sensor");
    }

    // --- Polling pipeline ---
    let publisher = Arc::new(MetricsPublisher::new().context("Failed to register metrics")?);
    let limiter = Arc::new(RateLimiter::new(config.rate.interval, config.rate.burst));
    let client = EgainClient::new(config.base_url.clone(), limiter, config.fetch_timeout);
    let poller = Arc::new(Poller::new(
        config.sensors.clone(),
        Arc::new(client),
        Arc::clone(&publisher),
    ));
    let scheduler = Arc::new(Scheduler::new(poller, config.poll_interval));

    let cancel = CancellationToken::new();
    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    // --- HTTP server ---
    let state = AppState {
        publisher,
        registry: config.sensors.clone(),
        scheduler_state: scheduler.subscribe(),
    };
    let app = routes::app(state);

    let served = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => {
            tracing::info!(addr = %config.listen, "Serving metrics");
            let shutdown = {
                let cancel = cancel.clone();
                async move {
                    tokio::select! {
                        () = shutdown_signal() => cancel.cancel(),
                        () = cancel.cancelled() => {}
                    }
                }
            };
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .context("Metrics server failed")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to bind {}", config.listen)),
    };

    // --- Shutdown ---
    cancel.cancel();
    match scheduler_handle.await {
        Ok(cycles) => tracing::info!(cycles, "Scheduler stopped"),
        Err(e) => tracing::error!(error = %e, "Scheduler task failed"),
    }

    served?;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "egain_exporter=info,egain_client=info,tower_http=info".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM.
///
/// If a handler cannot be installed that signal is never reported, and
/// the other one still stops the process.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
