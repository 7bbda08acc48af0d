// Monitor binary entry point

use anyhow::Context;
use common::config::Settings;
use common::ingest::{IngestEngine, MeasuredOrSimulated};
use common::notify::{DisabledMailer, Mailer, SmtpMailer};
use common::storage::{DbPool, PostgresStore, Store};
use common::trigger::{MonitorEngine, TriggerConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before logging so the log level is configurable
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    common::telemetry::init_logging(&settings.observability.log_level)?;
    info!("Starting line progress monitor");

    // Initialize database connection pool and schema
    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;
    let store = PostgresStore::new(db_pool.clone());
    store
        .ensure_schema()
        .await
        .context("Failed to bootstrap database schema")?;
    let store: Arc<dyn Store> = Arc::new(store);
    info!("Database initialized");

    // Outbound mail; deployments without SMTP run with dispatch disabled
    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&settings.smtp) {
        Some(mailer) => {
            info!("SMTP mailer configured");
            Arc::new(mailer)
        }
        None => {
            warn!("No SMTP host configured, email dispatch disabled");
            Arc::new(DisabledMailer)
        }
    };

    // Actual-count strategy: measured for the tracked customer, simulated
    // for the rest
    let provider = Arc::new(MeasuredOrSimulated::from_config(&settings.monitor));

    let engine = Arc::new(IngestEngine::new(
        settings.monitor.clone(),
        store,
        mailer,
        provider,
    ));

    let trigger_config = TriggerConfig {
        interval_seconds: settings.monitor.interval_seconds,
    };
    let monitor = Arc::new(MonitorEngine::new(trigger_config, engine));
    info!(
        interval_seconds = settings.monitor.interval_seconds,
        tracked_customer = %settings.monitor.tracked_customer_email,
        "Monitor engine created"
    );

    // Graceful shutdown on Ctrl+C
    let monitor_for_shutdown = monitor.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        monitor_for_shutdown.stop().await;
    });

    monitor.start().await;

    db_pool.close().await;
    info!("Monitor stopped");
    Ok(())
}
