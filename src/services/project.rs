//! Project management service
//!
//! Creating projects, cancelling them inside the allowed window and pausing
//! signups. Cancellation never touches individual signups.

use std::collections::BTreeSet;
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::info;
use uuid::Uuid;
use crate::config::SignupConfig;
use crate::database::VolunteerStore;
use crate::models::{utc_offset, CreateProjectRequest, NewProject, Project, ProjectStatus, SignupStatus};
use crate::services::auth::AuthService;
use crate::services::notification::NotificationService;
use crate::services::status::{derive_status, time_until_start};
use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::logging::{log_dependency_failure, log_manager_action};

const MAX_OFFSET_MINUTES: i32 = 24 * 60;

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn VolunteerStore>,
    auth: AuthService,
    notifications: NotificationService,
    default_utc_offset_minutes: i32,
    cancellation_guard: Duration,
}

impl ProjectService {
    pub fn new(store: Arc<dyn VolunteerStore>, auth: AuthService, notifications: NotificationService, config: &SignupConfig) -> Self {
        Self {
            store,
            auth,
            notifications,
            default_utc_offset_minutes: config.default_utc_offset_minutes,
            cancellation_guard: Duration::hours(config.cancellation_guard_hours),
        }
    }

    /// Get project by ID
    pub async fn get_project(&self, project_id: Uuid) -> Result<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or(VolunteerHubError::ProjectNotFound { project_id })
    }

    /// Validate and store a new project
    pub async fn create_project(&self, request: CreateProjectRequest, now: DateTime<Utc>) -> Result<Project> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(VolunteerHubError::InvalidInput("Project title cannot be empty".to_string()));
        }

        request.schedule.validate()?;

        let utc_offset_minutes = request.utc_offset_minutes.unwrap_or(self.default_utc_offset_minutes);
        if utc_offset_minutes.abs() >= MAX_OFFSET_MINUTES {
            return Err(VolunteerHubError::InvalidInput(format!("UTC offset out of range: {} minutes", utc_offset_minutes)));
        }

        let allowed_domains: Vec<String> = request
            .allowed_domains
            .iter()
            .map(|domain| domain.trim().trim_start_matches('@').to_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        if request.restrict_to_org_domains && allowed_domains.is_empty() {
            return Err(VolunteerHubError::InvalidInput("Domain restriction needs at least one allowed domain".to_string()));
        }

        let status = derive_status(&request.schedule, utc_offset(utc_offset_minutes), None, now);
        if status == ProjectStatus::Completed {
            return Err(VolunteerHubError::InvalidInput("Schedule has already ended".to_string()));
        }

        let project = self
            .store
            .insert_project(NewProject {
                id: Uuid::new_v4(),
                title,
                created_by: request.created_by,
                schedule: request.schedule,
                status,
                require_login: request.require_login,
                restrict_to_org_domains: request.restrict_to_org_domains,
                allowed_domains,
                utc_offset_minutes,
                created_at: now,
            })
            .await?;

        info!(project_id = %project.id, event_type = %project.event_type(), created_by = %project.created_by, "Project created");
        Ok(project)
    }

    /// Cancel a project while its start is more than the guard window away.
    ///
    /// Signups stay as they are; everyone holding one is told by mail.
    pub async fn cancel_project(&self, manager_id: Uuid, project_id: Uuid, reason: Option<String>, now: DateTime<Utc>) -> Result<Project> {
        let project = self.get_project(project_id).await?;
        self.auth.require_manager(manager_id, &project).await?;

        if project.cancelled_at.is_some() {
            return Err(VolunteerHubError::CancellationWindowClosed("project is already cancelled".to_string()));
        }

        match time_until_start(&project.schedule, project.offset(), now) {
            Some(remaining) if remaining > self.cancellation_guard => {}
            _ => {
                return Err(VolunteerHubError::CancellationWindowClosed(format!(
                    "cancellation closes {} hours before the start",
                    self.cancellation_guard.num_hours()
                )))
            }
        }

        if !self.store.cancel_project(project_id, now, reason.clone()).await? {
            return Err(VolunteerHubError::CancellationWindowClosed("project is already cancelled".to_string()));
        }
        log_manager_action(manager_id, "cancel_project", project_id);

        let cancelled = self.get_project(project_id).await?;
        self.broadcast_cancellation(&cancelled, reason.as_deref()).await;
        Ok(cancelled)
    }

    async fn broadcast_cancellation(&self, project: &Project, reason: Option<&str>) {
        let signups = match self
            .store
            .list_signups(project.id, None, &[SignupStatus::Pending, SignupStatus::Approved])
            .await
        {
            Ok(signups) => signups,
            Err(e) => {
                log_dependency_failure("store", &e.to_string(), Some("cancellation broadcast recipients"));
                return;
            }
        };

        let lookups = join_all(signups.iter().map(|signup| self.auth.contact_email(&signup.identity))).await;

        let mut recipients = BTreeSet::new();
        for lookup in lookups {
            match lookup {
                Ok(Some(email)) => {
                    recipients.insert(email);
                }
                Ok(None) => {}
                Err(e) => log_dependency_failure("identity", &e.to_string(), Some("cancellation broadcast")),
            }
        }

        let recipients: Vec<String> = recipients.into_iter().collect();
        self.notifications.send_cancellation_broadcast(&recipients, project, reason).await;
    }

    /// Pause or resume signups for a project
    pub async fn set_pause_signups(&self, manager_id: Uuid, project_id: Uuid, paused: bool) -> Result<Project> {
        let project = self.get_project(project_id).await?;
        self.auth.require_manager(manager_id, &project).await?;

        self.store.set_pause_signups(project_id, paused).await?;
        log_manager_action(manager_id, if paused { "pause_signups" } else { "resume_signups" }, project_id);

        self.get_project(project_id).await
    }
}
