// PostgreSQL-backed Store implementation

use crate::errors::StorageError;
use crate::models::{
    NewProgress, Progress, ProgressStatus, Project, Role, SchedulePoint, User,
};
use crate::storage::{DbPool, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

/// Store implementation over PostgreSQL.
///
/// Status and role are TEXT columns decoded through the enum FromStr impls;
/// schedules and metadata live in JSONB.
#[derive(Clone)]
pub struct PostgresStore {
    pool: DbPool,
}

#[derive(FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    total_units: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    schedule: Json<Vec<SchedulePoint>>,
    customer_id: Option<Uuid>,
    owner_email_notifications: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ProgressRow {
    id: Uuid,
    project_id: Uuid,
    timestamp: DateTime<Utc>,
    progress_count: i64,
    expected_count: i64,
    status: String,
    deviation: i64,
    image_path: Option<String>,
    metadata: Option<serde_json::Value>,
    email_sent: bool,
    email_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    role: String,
    email: String,
    email_notifications: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StorageError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            total_units: row.total_units,
            start_date: row.start_date,
            end_date: row.end_date,
            schedule: row.schedule.0,
            customer: row.customer_id,
            owner_email_notifications: row.owner_email_notifications,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<ProgressRow> for Progress {
    type Error = StorageError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let status: ProgressStatus = row
            .status
            .parse()
            .map_err(|e: String| StorageError::QueryFailed(e))?;
        Ok(Progress {
            id: row.id,
            project_id: row.project_id,
            timestamp: row.timestamp,
            progress_count: row.progress_count,
            expected_count: row.expected_count,
            status,
            deviation: row.deviation,
            image_path: row.image_path,
            metadata: row.metadata,
            email_sent: row.email_sent,
            email_sent_at: row.email_sent_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: String| StorageError::QueryFailed(e))?;
        Ok(User {
            id: row.id,
            name: row.name,
            role,
            email: row.email,
            email_notifications: row.email_notifications,
            created_at: row.created_at,
        })
    }
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create the backing tables when they do not exist yet.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                email_notifications BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.pool())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                total_units BIGINT NOT NULL CHECK (total_units > 0),
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                schedule JSONB NOT NULL DEFAULT '[]'::jsonb,
                customer_id UUID REFERENCES users(id),
                owner_email_notifications BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.pool())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                id UUID PRIMARY KEY,
                project_id UUID NOT NULL REFERENCES projects(id),
                timestamp TIMESTAMPTZ NOT NULL,
                progress_count BIGINT NOT NULL DEFAULT 0,
                expected_count BIGINT NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'on-time',
                deviation BIGINT NOT NULL DEFAULT 0,
                image_path TEXT,
                metadata JSONB,
                email_sent BOOLEAN NOT NULL DEFAULT FALSE,
                email_sent_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_progress_project_ts ON progress (project_id, timestamp DESC)",
        )
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, name, description, total_units, start_date, end_date,
                   schedule, customer_id, owner_email_notifications,
                   created_at, updated_at
            FROM projects
            ORDER BY created_at
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    #[instrument(skip(self, schedule), fields(points = schedule.len()))]
    async fn save_schedule(
        &self,
        project_id: Uuid,
        schedule: &[SchedulePoint],
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET schedule = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .bind(Json(schedule.to_vec()))
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("project {project_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, new_progress), fields(project_id = %new_progress.project_id))]
    async fn create_progress(&self, new_progress: &NewProgress) -> Result<Progress, StorageError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            INSERT INTO progress (
                id, project_id, timestamp, progress_count, expected_count,
                status, deviation, image_path, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, project_id, timestamp, progress_count, expected_count,
                      status, deviation, image_path, metadata,
                      email_sent, email_sent_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_progress.project_id)
        .bind(new_progress.timestamp)
        .bind(new_progress.progress_count)
        .bind(new_progress.expected_count)
        .bind(new_progress.status.to_string())
        .bind(new_progress.deviation)
        .bind(&new_progress.image_path)
        .bind(&new_progress.metadata)
        .fetch_one(self.pool.pool())
        .await?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn mark_email_sent(
        &self,
        progress_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE progress
            SET email_sent = TRUE, email_sent_at = $2
            WHERE id = $1
            "#,
        )
        .bind(progress_id)
        .bind(sent_at)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("progress {progress_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_progress(&self, project_id: Uuid) -> Result<Option<Progress>, StorageError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT id, project_id, timestamp, progress_count, expected_count,
                   status, deviation, image_path, metadata,
                   email_sent, email_sent_at, created_at
            FROM progress
            WHERE project_id = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(Progress::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_progress(
        &self,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Progress>, StorageError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT id, project_id, timestamp, progress_count, expected_count,
                   status, deviation, image_path, metadata,
                   email_sent, email_sent_at, created_at
            FROM progress
            WHERE project_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(Progress::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn average_deviation(&self, project_id: Uuid) -> Result<f64, StorageError> {
        let avg: f64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(AVG(deviation::float8), 0)
            FROM progress
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(avg)
    }

    #[instrument(skip(self))]
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, role, email, email_notifications, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_primary_owner(&self) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, role, email, email_notifications, created_at
            FROM users
            WHERE role = 'owner'
            ORDER BY created_at, id
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(User::try_from).transpose()
    }
}
