// Configuration management with layered configuration (defaults, file, env)
//
// All runtime knobs are read once at startup into an immutable Settings
// value that is passed explicitly into the engine and its collaborators.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub monitor: MonitorConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

/// Outbound mail transport configuration.
///
/// An unset `host` means mail delivery is disabled; the pipeline then skips
/// dispatch and leaves the email markers on progress records untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub from_address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Fixed trigger interval between ingestion cycles
    pub interval_seconds: u64,
    /// Measurement output file written by the external process
    pub output_path: PathBuf,
    /// Primary root containing source images referenced by the output file
    pub image_root: PathBuf,
    /// Ordered fallback roots searched when the primary root misses
    #[serde(default)]
    pub fallback_roots: Vec<PathBuf>,
    /// Serving directory that resolved artifacts are copied into
    pub uploads_dir: PathBuf,
    /// External measurement executable
    pub process_command: String,
    #[serde(default)]
    pub process_args: Vec<String>,
    /// Working directory the external process is spawned in
    pub process_workdir: PathBuf,
    /// Customer identity whose actuals come from genuine measurement
    pub tracked_customer_email: String,
    /// Expected units per cycle for the tracked customer, replacing the
    /// schedule-derived value
    pub baseline_expected_per_cycle: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.monitor.interval_seconds == 0 {
            return Err("Monitor interval_seconds must be greater than 0".to_string());
        }
        if self.monitor.output_path.as_os_str().is_empty() {
            return Err("Monitor output_path cannot be empty".to_string());
        }
        if self.monitor.process_command.is_empty() {
            return Err("Monitor process_command cannot be empty".to_string());
        }
        if self.monitor.tracked_customer_email.is_empty() {
            return Err("Monitor tracked_customer_email cannot be empty".to_string());
        }
        if self.monitor.baseline_expected_per_cycle < 0 {
            return Err("Monitor baseline_expected_per_cycle cannot be negative".to_string());
        }

        if self.smtp.from_address.is_empty() {
            return Err("SMTP from_address cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/line_monitor".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            smtp: SmtpConfig {
                host: None,
                port: 587,
                from_address: "progress-monitor@localhost".to_string(),
                username: None,
                password: None,
            },
            monitor: MonitorConfig {
                interval_seconds: 300,
                output_path: PathBuf::from("model_simulation/output/progress_data.json"),
                image_root: PathBuf::from("model_simulation/images"),
                fallback_roots: vec![PathBuf::from("model_simulation")],
                uploads_dir: PathBuf::from("uploads"),
                process_command: "python3".to_string(),
                process_args: vec!["runner_yolo.py".to_string()],
                process_workdir: PathBuf::from("model_simulation"),
                tracked_customer_email: "customer1@company.com".to_string(),
                baseline_expected_per_cycle: 7,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_empty_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_interval() {
        let mut settings = Settings::default();
        settings.monitor.interval_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_negative_baseline() {
        let mut settings = Settings::default();
        settings.monitor.baseline_expected_per_cycle = -1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_default_interval_is_five_minutes() {
        let settings = Settings::default();
        assert_eq!(settings.monitor.interval_seconds, 300);
    }
}
