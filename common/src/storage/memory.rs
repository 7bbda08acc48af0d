// In-memory store backing tests and single-process demos

use crate::errors::StorageError;
use crate::models::{NewProgress, Progress, Project, SchedulePoint, User};
use crate::storage::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory Store implementation.
///
/// Not durable; mirrors the Postgres backend's semantics (append-only
/// progress, deterministic primary-owner ordering) so pipeline tests
/// exercise the same contract.
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<Vec<Project>>,
    progress: RwLock<Vec<Progress>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project; returns its id for convenience.
    pub async fn insert_project(&self, project: Project) -> Uuid {
        let id = project.id;
        self.projects.write().await.push(project);
        id
    }

    /// Seed a user; returns their id for convenience.
    pub async fn insert_user(&self, user: User) -> Uuid {
        let id = user.id;
        self.users.write().await.insert(id, user);
        id
    }

    /// Total number of progress records across all projects.
    pub async fn progress_count(&self) -> usize {
        self.progress.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        Ok(self.projects.read().await.clone())
    }

    async fn save_schedule(
        &self,
        project_id: Uuid,
        schedule: &[SchedulePoint],
    ) -> Result<(), StorageError> {
        let mut projects = self.projects.write().await;
        let project = projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| StorageError::NotFound(format!("project {project_id}")))?;
        project.schedule = schedule.to_vec();
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn create_progress(&self, new_progress: &NewProgress) -> Result<Progress, StorageError> {
        let progress = Progress {
            id: Uuid::new_v4(),
            project_id: new_progress.project_id,
            timestamp: new_progress.timestamp,
            progress_count: new_progress.progress_count,
            expected_count: new_progress.expected_count,
            status: new_progress.status,
            deviation: new_progress.deviation,
            image_path: new_progress.image_path.clone(),
            metadata: new_progress.metadata.clone(),
            email_sent: false,
            email_sent_at: None,
            created_at: Utc::now(),
        };
        self.progress.write().await.push(progress.clone());
        Ok(progress)
    }

    async fn mark_email_sent(
        &self,
        progress_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut progress = self.progress.write().await;
        let record = progress
            .iter_mut()
            .find(|p| p.id == progress_id)
            .ok_or_else(|| StorageError::NotFound(format!("progress {progress_id}")))?;
        record.email_sent = true;
        record.email_sent_at = Some(sent_at);
        Ok(())
    }

    async fn latest_progress(&self, project_id: Uuid) -> Result<Option<Progress>, StorageError> {
        let progress = self.progress.read().await;
        Ok(progress
            .iter()
            .filter(|p| p.project_id == project_id)
            .max_by_key(|p| p.timestamp)
            .cloned())
    }

    async fn list_progress(
        &self,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Progress>, StorageError> {
        let progress = self.progress.read().await;
        let mut records: Vec<Progress> = progress
            .iter()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn average_deviation(&self, project_id: Uuid) -> Result<f64, StorageError> {
        let progress = self.progress.read().await;
        let deviations: Vec<i64> = progress
            .iter()
            .filter(|p| p.project_id == project_id)
            .map(|p| p.deviation)
            .collect();
        if deviations.is_empty() {
            return Ok(0.0);
        }
        Ok(deviations.iter().sum::<i64>() as f64 / deviations.len() as f64)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_primary_owner(&self) -> Result<Option<User>, StorageError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| matches!(u.role, crate::models::Role::Owner))
            .min_by_key(|u| (u.created_at, u.id))
            .cloned())
    }
}
