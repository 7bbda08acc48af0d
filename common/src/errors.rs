// Error handling framework

use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

/// Artifact resolution and materialization errors
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact not found for reference '{0}'")]
    NotFound(String),

    #[error("Failed to copy artifact: {0}")]
    CopyFailed(String),

    #[error("Failed to create serving directory: {0}")]
    ServingDirFailed(String),
}

/// Email dispatch errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("Email address parse error: {0}")]
    Address(String),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Mail delivery is not configured")]
    NotConfigured,
}

/// Ingestion cycle errors
///
/// Most pipeline failures are soft and handled inside the cycle; these
/// variants cover the conditions that surface to the trigger loop.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Previous cycle still running, tick skipped")]
    CycleInFlight,

    #[error("Failed to list projects: {0}")]
    ProjectListFailed(String),
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

impl From<lettre::address::AddressError> for NotifyError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotifyError::Address(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => StorageError::QueryFailed(db_err.message().to_string()),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotFound("project 42".to_string());
        assert!(err.to_string().contains("project 42"));
    }

    #[test]
    fn test_artifact_error_display() {
        let err = ArtifactError::NotFound("images/frame.jpg".to_string());
        assert!(err.to_string().contains("images/frame.jpg"));
    }

    #[test]
    fn test_ingest_error_cycle_in_flight() {
        let err = IngestError::CycleInFlight;
        assert!(err.to_string().contains("tick skipped"));
    }
}
