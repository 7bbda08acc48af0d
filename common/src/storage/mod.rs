// Storage module: the progress/project/user store behind the pipeline
//
// The pipeline only ever talks to the Store trait; PostgresStore is the
// production backend and MemoryStore backs tests and demos.

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::MemoryStore;
pub use pool::DbPool;
pub use postgres::PostgresStore;

use crate::errors::StorageError;
use crate::models::{NewProgress, Progress, Project, SchedulePoint, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistence boundary for the ingestion pipeline.
///
/// Progress history is append-only: records are created once and only their
/// email markers may change afterwards, via `mark_email_sent`. The primary
/// owner is the owner with the earliest `created_at` (ties broken by id), so
/// resolution stays deterministic when several owners exist.
#[async_trait]
pub trait Store: Send + Sync {
    /// All known projects, in creation order.
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError>;

    /// Persist a freshly computed schedule onto a project.
    ///
    /// Schedule computation is pure; this is the explicit write step.
    async fn save_schedule(
        &self,
        project_id: Uuid,
        schedule: &[SchedulePoint],
    ) -> Result<(), StorageError>;

    /// Append a progress record and return it with its assigned identity.
    async fn create_progress(&self, new_progress: &NewProgress) -> Result<Progress, StorageError>;

    /// Record a successful email dispatch on an existing progress record.
    async fn mark_email_sent(
        &self,
        progress_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Most recent progress record for a project, by measurement time.
    async fn latest_progress(&self, project_id: Uuid) -> Result<Option<Progress>, StorageError>;

    /// Progress history for a project, newest first.
    async fn list_progress(
        &self,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Progress>, StorageError>;

    /// Mean deviation across a project's whole history; 0.0 when empty.
    async fn average_deviation(&self, project_id: Uuid) -> Result<f64, StorageError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StorageError>;

    /// The designated owner recipient for notifications.
    async fn find_primary_owner(&self) -> Result<Option<User>, StorageError>;
}
