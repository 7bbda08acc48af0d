// Read-side progress computations
//
// Pure-ish builders over store data for the dashboard/API collaborator:
// per-project stats and the portfolio overview. Schedules missing from the
// cache are computed on the fly here but never written back; persistence is
// the ingestion pipeline's job.

use crate::config::MonitorConfig;
use crate::errors::StorageError;
use crate::models::{ProgressStatus, Project, User};
use crate::schedule::{expected_count_at, generate_schedule};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub current_progress: i64,
    pub expected_progress: i64,
    pub completion_percentage: i64,
    /// None when the project has no progress history yet
    pub current_status: Option<ProgressStatus>,
    pub average_deviation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewRow {
    pub project_id: Uuid,
    pub project_name: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub total_units: i64,
    pub current_progress: i64,
    pub expected_progress: i64,
    pub completion_percentage: i64,
    pub status: Option<ProgressStatus>,
    pub deviation: i64,
    pub last_update: Option<DateTime<Utc>>,
    pub owner_email_notifications: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewSummary {
    pub total_projects: usize,
    pub on_track: usize,
    pub delayed: usize,
    pub average_completion: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioOverview {
    pub summary: OverviewSummary,
    pub projects: Vec<OverviewRow>,
}

fn completion_percentage(current: i64, total_units: i64) -> i64 {
    if total_units <= 0 {
        return 0;
    }
    (current as f64 / total_units as f64 * 100.0).round() as i64
}

fn expected_now(project: &Project, as_of: DateTime<Utc>) -> i64 {
    if project.schedule.is_empty() {
        let schedule = generate_schedule(project.total_units, project.start_date, project.end_date);
        expected_count_at(&schedule, as_of)
    } else {
        expected_count_at(&project.schedule, as_of)
    }
}

/// Stats for a single project as of `as_of`.
///
/// The tracked customer reads against the per-cycle baseline instead of the
/// cumulative schedule, mirroring the ingestion-side policy.
pub async fn project_stats(
    store: &dyn Store,
    config: &MonitorConfig,
    project: &Project,
    customer: Option<&User>,
    as_of: DateTime<Utc>,
) -> Result<ProjectStats, StorageError> {
    let latest = store.latest_progress(project.id).await?;
    let current = latest.as_ref().map(|p| p.progress_count).unwrap_or(0);

    let expected = match customer {
        Some(c) if c.email == config.tracked_customer_email => config.baseline_expected_per_cycle,
        _ => latest
            .as_ref()
            .map(|p| p.expected_count)
            .unwrap_or_else(|| expected_now(project, as_of)),
    };

    Ok(ProjectStats {
        current_progress: current,
        expected_progress: expected,
        completion_percentage: completion_percentage(current, project.total_units),
        current_status: latest.as_ref().map(|p| p.status),
        average_deviation: store.average_deviation(project.id).await?,
    })
}

/// Portfolio overview across all projects as of `as_of`.
///
/// Projects without history count as on-track, as does anything not
/// explicitly delayed.
pub async fn portfolio_overview(
    store: &dyn Store,
    as_of: DateTime<Utc>,
) -> Result<PortfolioOverview, StorageError> {
    let projects = store.list_projects().await?;
    let mut rows = Vec::with_capacity(projects.len());
    let mut on_track = 0;
    let mut delayed = 0;
    let mut total_completion = 0i64;

    for project in &projects {
        let latest = store.latest_progress(project.id).await?;
        let current = latest.as_ref().map(|p| p.progress_count).unwrap_or(0);
        let expected = expected_now(project, as_of);
        let completion = completion_percentage(current, project.total_units);
        let status = latest.as_ref().map(|p| p.status);

        if status == Some(ProgressStatus::Delayed) {
            delayed += 1;
        } else {
            on_track += 1;
        }
        total_completion += completion;

        let customer = match project.customer {
            Some(id) => store.find_user(id).await?,
            None => None,
        };

        rows.push(OverviewRow {
            project_id: project.id,
            project_name: project.name.clone(),
            customer_name: customer.as_ref().map(|c| c.name.clone()),
            customer_email: customer.as_ref().map(|c| c.email.clone()),
            total_units: project.total_units,
            current_progress: current,
            expected_progress: expected,
            completion_percentage: completion,
            status,
            deviation: latest.as_ref().map(|p| p.deviation).unwrap_or(0),
            last_update: latest.as_ref().map(|p| p.timestamp),
            owner_email_notifications: project.owner_email_notifications,
        });
    }

    let summary = OverviewSummary {
        total_projects: projects.len(),
        on_track,
        delayed,
        average_completion: if projects.is_empty() {
            0
        } else {
            ((total_completion as f64) / projects.len() as f64).round() as i64
        },
    };

    Ok(PortfolioOverview {
        summary,
        projects: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::{NewProgress, Role};
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn project(customer: Option<Uuid>) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Axle run".to_string(),
            description: None,
            total_units: 200,
            start_date: t0(),
            end_date: t0() + Duration::days(10),
            schedule: Vec::new(),
            customer,
            owner_email_notifications: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn progress(project_id: Uuid, count: i64, status: ProgressStatus, deviation: i64) -> NewProgress {
        NewProgress {
            project_id,
            timestamp: t0() + Duration::days(5),
            progress_count: count,
            expected_count: 100,
            status,
            deviation,
            image_path: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_stats_without_history_reads_schedule() {
        let store = MemoryStore::new();
        let config = Settings::default().monitor;
        let proj = project(None);
        store.insert_project(proj.clone()).await;

        let stats = project_stats(&store, &config, &proj, None, t0() + Duration::days(5))
            .await
            .unwrap();

        assert_eq!(stats.current_progress, 0);
        assert_eq!(stats.expected_progress, 100);
        assert_eq!(stats.completion_percentage, 0);
        assert!(stats.current_status.is_none());
    }

    #[tokio::test]
    async fn test_stats_for_tracked_customer_uses_baseline() {
        let store = MemoryStore::new();
        let config = Settings::default().monitor;
        let customer = User {
            id: Uuid::new_v4(),
            name: "Tracked".to_string(),
            role: Role::Customer,
            email: config.tracked_customer_email.clone(),
            email_notifications: true,
            created_at: Utc::now(),
        };
        let proj = project(Some(customer.id));
        store.insert_project(proj.clone()).await;
        store
            .create_progress(&progress(proj.id, 60, ProgressStatus::Ahead, 53))
            .await
            .unwrap();

        let stats = project_stats(&store, &config, &proj, Some(&customer), Utc::now())
            .await
            .unwrap();

        assert_eq!(stats.current_progress, 60);
        assert_eq!(stats.expected_progress, config.baseline_expected_per_cycle);
        assert_eq!(stats.completion_percentage, 30);
        assert_eq!(stats.current_status, Some(ProgressStatus::Ahead));
    }

    #[tokio::test]
    async fn test_overview_counts_delayed_projects() {
        let store = MemoryStore::new();
        let healthy = project(None);
        let behind = project(None);
        store.insert_project(healthy.clone()).await;
        store.insert_project(behind.clone()).await;
        store
            .create_progress(&progress(healthy.id, 100, ProgressStatus::OnTime, 0))
            .await
            .unwrap();
        store
            .create_progress(&progress(behind.id, 40, ProgressStatus::Delayed, -60))
            .await
            .unwrap();

        let overview = portfolio_overview(&store, t0() + Duration::days(5))
            .await
            .unwrap();

        assert_eq!(overview.summary.total_projects, 2);
        assert_eq!(overview.summary.on_track, 1);
        assert_eq!(overview.summary.delayed, 1);
        // 50% and 20% completion
        assert_eq!(overview.summary.average_completion, 35);
    }

    #[tokio::test]
    async fn test_overview_project_without_history_is_on_track() {
        let store = MemoryStore::new();
        store.insert_project(project(None)).await;

        let overview = portfolio_overview(&store, t0()).await.unwrap();
        assert_eq!(overview.summary.on_track, 1);
        assert!(overview.projects[0].status.is_none());
        assert!(overview.projects[0].last_update.is_none());
    }
}
