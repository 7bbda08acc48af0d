// Monitor trigger: fires an ingestion cycle on a fixed wall-clock interval

use crate::errors::IngestError;
use crate::ingest::{CycleOutcome, IngestEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the monitor trigger
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Fixed interval between ingestion cycles (in seconds)
    pub interval_seconds: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
        }
    }
}

/// Periodic driver for the ingestion engine.
///
/// No cycle outcome is fatal to the loop: errors are logged and the next
/// tick fires as scheduled. A tick that lands while the previous cycle is
/// still in flight is skipped by the engine's guard.
pub struct MonitorEngine {
    config: TriggerConfig,
    engine: Arc<IngestEngine>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl MonitorEngine {
    pub fn new(config: TriggerConfig, engine: Arc<IngestEngine>) -> Self {
        let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel(1);
        Self {
            config,
            engine,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Start the trigger loop
    #[instrument(skip(self))]
    pub async fn start(&self) {
        info!(
            interval_seconds = self.config.interval_seconds,
            "Starting progress monitoring"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds));
        // The first tick of a tokio interval completes immediately; consume
        // it so the first cycle runs one full interval after startup.
        tick.tick().await;
        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Trigger fired, running ingestion cycle");
                    match self.engine.run_cycle().await {
                        Ok(CycleOutcome::NoData) => {
                            info!("Cycle completed with no measurement data");
                        }
                        Ok(CycleOutcome::Processed { projects_processed, emails_sent }) => {
                            info!(projects_processed, emails_sent, "Cycle completed");
                        }
                        Err(IngestError::CycleInFlight) => {
                            warn!("Previous cycle still running, tick skipped");
                        }
                        Err(e) => {
                            error!(error = %e, "Ingestion cycle failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping monitor");
                    break;
                }
            }
        }

        info!("Monitor stopped");
    }

    /// Stop the trigger loop gracefully
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        info!("Stopping monitor");
        let _ = self.shutdown_tx.send(());
        // Give an in-flight cycle a moment to wind down
        sleep(Duration::from_secs(2)).await;
        info!("Monitor stopped gracefully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_config_default_is_five_minutes() {
        let config = TriggerConfig::default();
        assert_eq!(config.interval_seconds, 300);
    }

    #[test]
    fn test_trigger_config_custom() {
        let config = TriggerConfig {
            interval_seconds: 60,
        };
        assert_eq!(config.interval_seconds, 60);
    }
}
