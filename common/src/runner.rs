// External measurement process invocation
//
// The measurement executable is a black box: it reads images from the
// directory given in IMAGES_DIR and appends records to the output file. The
// cycle waits for it to exit and then parses whatever is on disk, so a
// failed or crashed run degrades to a stale-data cycle rather than an error.

use crate::config::MonitorConfig;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// Spawns the configured measurement executable and waits for it to exit.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: String,
    args: Vec<String>,
    workdir: PathBuf,
    image_root: PathBuf,
}

impl ProcessRunner {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            command: config.process_command.clone(),
            args: config.process_args.clone(),
            workdir: config.process_workdir.clone(),
            image_root: config.image_root.clone(),
        }
    }

    /// Run the measurement process to completion.
    ///
    /// Any exit code is treated as "proceed to parse"; a spawn failure is
    /// logged and also proceeds, since the output file may still hold data
    /// from a previous run.
    #[instrument(skip(self), fields(command = %self.command))]
    pub async fn run(&self) {
        let result = Command::new(&self.command)
            .args(&self.args)
            .current_dir(&self.workdir)
            .env("IMAGES_DIR", &self.image_root)
            .status()
            .await;

        match result {
            Ok(status) if status.success() => {
                info!("Measurement process completed");
            }
            Ok(status) => {
                warn!(exit = ?status.code(), "Measurement process exited abnormally");
            }
            Err(e) => {
                warn!(error = %e, "Failed to spawn measurement process");
            }
        }
    }
}
