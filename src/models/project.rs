//! Project model

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::schedule::{EventType, Schedule};
use crate::utils::errors::{Result, VolunteerHubError};

/// Lifecycle status of a project.
///
/// The stored value is a cache of the time-derived status and may lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Upcoming => "upcoming",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    /// Whether new signups may be admitted in this status
    pub fn accepts_signups(&self) -> bool {
        matches!(self, ProjectStatus::Upcoming | ProjectStatus::InProgress)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = VolunteerHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upcoming" => Ok(ProjectStatus::Upcoming),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            other => Err(VolunteerHubError::Integrity(format!("Unknown project status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub schedule: Schedule,
    pub status: ProjectStatus,
    pub pause_signups: bool,
    pub require_login: bool,
    pub restrict_to_org_domains: bool,
    pub allowed_domains: Vec<String>,
    pub utc_offset_minutes: i32,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn event_type(&self) -> EventType {
        self.schedule.event_type()
    }

    /// Offset used to turn slot dates and times into instants
    pub fn offset(&self) -> FixedOffset {
        utc_offset(self.utc_offset_minutes)
    }
}

/// Build a fixed offset from minutes east of UTC, falling back to UTC when out of range
pub fn utc_offset(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Row shape of the `projects` table
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub event_type: String,
    pub schedule: Json<Schedule>,
    pub status: String,
    pub pause_signups: bool,
    pub require_login: bool,
    pub restrict_to_org_domains: bool,
    pub allowed_domains: Vec<String>,
    pub utc_offset_minutes: i32,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = VolunteerHubError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let schedule = row.schedule.0;
        if row.event_type != schedule.event_type().as_str() {
            return Err(VolunteerHubError::Integrity(format!(
                "Project {} has event type {} but a {} schedule",
                row.id,
                row.event_type,
                schedule.event_type()
            )));
        }

        Ok(Project {
            id: row.id,
            title: row.title,
            created_by: row.created_by,
            schedule,
            status: row.status.parse()?,
            pause_signups: row.pause_signups,
            require_login: row.require_login,
            restrict_to_org_domains: row.restrict_to_org_domains,
            allowed_domains: row.allowed_domains,
            utc_offset_minutes: row.utc_offset_minutes,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub created_by: Uuid,
    pub schedule: Schedule,
    pub require_login: bool,
    pub restrict_to_org_domains: bool,
    pub allowed_domains: Vec<String>,
    pub utc_offset_minutes: Option<i32>,
}

/// A project record ready to be written, with its initial status already derived
#[derive(Debug, Clone)]
pub struct NewProject {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub schedule: Schedule,
    pub status: ProjectStatus,
    pub require_login: bool,
    pub restrict_to_org_domains: bool,
    pub allowed_domains: Vec<String>,
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
}
