// Scheduler binary entry point

use anyhow::{Context, Result};
use common::bootstrap;
use common::config::Settings;
use common::telemetry;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;

    info!("Starting page monitor scheduler");

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    info!(
        storage = ?settings.storage.backend,
        notifier = ?settings.notifier.kind,
        intervals = ?settings.scheduler.intervals,
        "Configuration loaded"
    );

    let monitor = bootstrap::build_monitor(&settings)?;

    // Storage init failure is fatal
    monitor.start().await.map_err(|e| {
        error!(error = %e, "Failed to start monitor");
        anyhow::anyhow!("Monitor start error: {}", e)
    })?;

    info!("Monitor is running. Press Ctrl+C to shutdown gracefully");
    wait_for_shutdown_signal().await;

    info!("Waiting for in-flight checks to complete");
    if let Err(e) = monitor.stop().await {
        error!(error = %e, "Error during monitor shutdown");
    }

    telemetry::shutdown_tracer();
    info!("Scheduler shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
