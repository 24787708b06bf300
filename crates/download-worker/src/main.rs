//! Viewer Download Worker
//!
//! Tracks PDF/EPUB generation on the TaskManager:
//! 1. Polls the status of waiting download jobs
//! 2. Stores status, queue position and failures
//! 3. Deletes expired jobs and their files
//!
//! Run with `once` to do a single pass and exit.

mod processor;

use crate::processor::{CircuitBreaker, DownloadProcessor};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use viewer_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    download::{DownloadService, TaskManagerClient},
    metrics, VERSION,
};

const MAX_FAILURES: u32 = 5;
const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    let config = Arc::new(config);

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }

    info!("Starting viewer download worker v{}", VERSION);

    // Metrics exporter on its own port
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);

    let task_manager = Arc::new(TaskManagerClient::new(&config.download)?);
    info!(url = %config.download.task_manager_url, "TaskManager client initialized");

    let downloads = DownloadService::new(repository.clone(), task_manager, &config.download);
    let processor = DownloadProcessor::new(repository, downloads);

    let once = std::env::args().nth(1).as_deref() == Some("once");
    if once {
        info!("Running a single pass...");
        processor.run_pass().await?;
        return Ok(());
    }

    let period = Duration::from_secs(config.download.poll_interval_secs.max(1));
    info!(interval_secs = period.as_secs(), "Download worker ready, starting polling...");

    let mut breaker = CircuitBreaker::new(MAX_FAILURES, CIRCUIT_BREAK_DURATION);
    let mut interval = tokio::time::interval(period);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Start polling loop
    loop {
        if let Some(pause) = breaker.check() {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => info!("Circuit breaker reset, resuming..."),
            }
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                match processor.run_pass().await {
                    Ok(summary) if summary.is_failure() => {
                        breaker.record_failure();
                        warn!(failures = breaker.failures(), "TaskManager unreachable for every pending job");
                    }
                    Ok(_) => breaker.record_success(),
                    Err(e) => {
                        breaker.record_failure();
                        error!(error = %e, failures = breaker.failures(), "Download pass failed");
                    }
                }
            }
        }
    }

    info!("Download worker shutting down");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
