use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Project Models
// ============================================================================

/// A single point on a project's expected-progress curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePoint {
    pub timestamp: DateTime<Utc>,
    pub expected_count: i64,
}

/// Project represents a tracked manufacturing order.
///
/// `schedule` is the cached expected-progress curve; computing it is a pure
/// operation (see the schedule module) and writing the result back is an
/// explicit store call, never a side effect of a read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Immutable business target, always positive
    pub total_units: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub schedule: Vec<SchedulePoint>,
    pub customer: Option<Uuid>,
    /// Project-scoped override for owner alerts
    pub owner_email_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Progress Models
// ============================================================================

/// Tolerance-banded progress classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    Ahead,
    OnTime,
    Delayed,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressStatus::Ahead => "ahead",
            ProgressStatus::OnTime => "on-time",
            ProgressStatus::Delayed => "delayed",
        };
        f.write_str(s)
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ahead" => Ok(ProgressStatus::Ahead),
            "on-time" => Ok(ProgressStatus::OnTime),
            "delayed" => Ok(ProgressStatus::Delayed),
            other => Err(format!("Unknown progress status: {other}")),
        }
    }
}

/// Progress is one immutable snapshot per ingestion cycle per project.
///
/// `status` and `deviation` are fixed at creation time from the actual and
/// expected counts and never recomputed afterwards. Only the email markers
/// may be set later, and only after a successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Measurement time, not ingestion time
    pub timestamp: DateTime<Utc>,
    pub progress_count: i64,
    pub expected_count: i64,
    pub status: ProgressStatus,
    pub deviation: i64,
    /// Relative artifact reference under the serving directory
    pub image_path: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a progress record about to be persisted.
#[derive(Debug, Clone)]
pub struct NewProgress {
    pub project_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub progress_count: i64,
    pub expected_count: i64,
    pub status: ProgressStatus,
    pub deviation: i64,
    pub image_path: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// User Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => f.write_str("owner"),
            Role::Customer => f.write_str("customer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "customer" => Ok(Role::Customer),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub email: String,
    /// Global notification preference for this user
    pub email_notifications: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Measurement output
// ============================================================================

/// One record emitted by the external measurement process.
///
/// Older runner versions wrote `total_vehicles` instead of `progressCount`
/// and `image` instead of `imagePath`; both aliases are still accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "progressCount", alias = "total_vehicles", default)]
    pub progress_count: i64,
    #[serde(rename = "imagePath", alias = "image", default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_status_round_trip() {
        for status in [
            ProgressStatus::Ahead,
            ProgressStatus::OnTime,
            ProgressStatus::Delayed,
        ] {
            let parsed: ProgressStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_progress_status_wire_form() {
        assert_eq!(ProgressStatus::OnTime.to_string(), "on-time");
        assert!("onTime".parse::<ProgressStatus>().is_err());
    }

    #[test]
    fn test_measurement_record_accepts_legacy_aliases() {
        let record: MeasurementRecord =
            serde_json::from_str(r#"{"total_vehicles": 12, "image": "images/f.jpg"}"#).unwrap();
        assert_eq!(record.progress_count, 12);
        assert_eq!(record.image_path.as_deref(), Some("images/f.jpg"));
    }

    #[test]
    fn test_measurement_record_defaults_missing_count_to_zero() {
        let record: MeasurementRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record.progress_count, 0);
        assert!(record.image_path.is_none());
        assert!(record.timestamp.is_none());
    }
}
