//! Project repository implementation

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use crate::models::project::{NewProject, Project, ProjectRow, ProjectStatus};
use crate::utils::errors::VolunteerHubError;

const PROJECT_COLUMNS: &str = "id, title, created_by, event_type, schedule, status, pause_signups, require_login, \
    restrict_to_org_domains, allowed_domains, utc_offset_minutes, cancelled_at, cancellation_reason, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new project
    pub async fn create(&self, project: NewProject) -> Result<Project, VolunteerHubError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO projects (id, title, created_by, event_type, schedule, status, require_login,
                                  restrict_to_org_domains, allowed_domains, utc_offset_minutes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(project.id)
        .bind(&project.title)
        .bind(project.created_by)
        .bind(project.schedule.event_type().as_str())
        .bind(Json(&project.schedule))
        .bind(project.status.as_str())
        .bind(project.require_login)
        .bind(project.restrict_to_org_domains)
        .bind(&project.allowed_domains)
        .bind(project.utc_offset_minutes)
        .bind(project.created_at)
        .fetch_one(&self.pool)
        .await?;

        Project::try_from(row)
    }

    /// Find project by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, VolunteerHubError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Project::try_from).transpose()
    }

    /// Projects whose status can still move forward
    pub async fn list_reconcilable(&self) -> Result<Vec<Project>, VolunteerHubError> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {} FROM projects WHERE cancelled_at IS NULL AND status IN ('upcoming', 'in_progress') ORDER BY created_at ASC, id ASC",
            PROJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    /// Compare-and-set the stored status; cancelled projects are never touched
    pub async fn update_status_if(&self, id: Uuid, expected: ProjectStatus, status: ProjectStatus) -> Result<bool, VolunteerHubError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2 AND cancelled_at IS NULL
            "#
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel a project unless it is already cancelled
    pub async fn cancel(&self, id: Uuid, cancelled_at: DateTime<Utc>, reason: Option<String>) -> Result<bool, VolunteerHubError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET status = 'cancelled', cancelled_at = $2, cancellation_reason = $3, updated_at = $2
            WHERE id = $1 AND cancelled_at IS NULL
            "#
        )
        .bind(id)
        .bind(cancelled_at)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Pause or resume signups
    pub async fn set_pause_signups(&self, id: Uuid, paused: bool) -> Result<bool, VolunteerHubError> {
        let result = sqlx::query("UPDATE projects SET pause_signups = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(paused)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
