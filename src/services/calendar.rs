//! Calendar sync service implementation
//!
//! Pushes and removes calendar entries for approved signups through an HTTP
//! calendar API and builds "Add to Calendar" links. Sync is best effort:
//! callers log failures and carry on.

use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use crate::config::CalendarConfig;
use crate::models::{Project, Signup, Slot};
use crate::utils::errors::{CalendarError, CalendarResult, Result, VolunteerHubError};

/// Calendar entry for one signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub signup_id: Uuid,
    pub project_id: Uuid,
    pub summary: String,
    pub schedule_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn for_signup(signup: &Signup, project: &Project, slot: &Slot) -> Self {
        let offset = project.offset();
        Self {
            signup_id: signup.id,
            project_id: project.id,
            summary: format!("{} ({})", project.title, slot.schedule_id),
            schedule_id: slot.schedule_id.clone(),
            start: slot.starts_at(offset),
            end: slot.ends_at(offset),
        }
    }
}

/// Calendar collaborator keyed by signup id
#[async_trait]
pub trait CalendarSync: Send + Sync {
    async fn push_event(&self, event: &CalendarEvent) -> CalendarResult<()>;

    async fn remove_event(&self, signup_id: Uuid) -> CalendarResult<()>;
}

/// HTTP calendar sync
#[derive(Debug, Clone)]
pub struct CalendarService {
    enabled: bool,
    endpoint: Option<String>,
    http_client: reqwest::Client,
}

impl CalendarService {
    /// Create a new CalendarService instance
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("VolunteerHub/1.0")
            .build()
            .map_err(VolunteerHubError::Http)?;

        Ok(Self {
            enabled: config.enabled,
            endpoint: config.endpoint.clone(),
            http_client,
        })
    }

    /// Check if calendar sync is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.endpoint.is_some()
    }

    fn event_url(&self, signup_id: Uuid) -> CalendarResult<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| CalendarError::ApiError("Calendar endpoint not configured".to_string()))?;
        Ok(format!("{}/events/{}", endpoint.trim_end_matches('/'), signup_id))
    }

    /// Generate "Add to Calendar" URL for a slot
    pub fn add_to_calendar_url(project: &Project, slot: &Slot) -> String {
        let offset = project.offset();
        let start_time = slot.starts_at(offset).format("%Y%m%dT%H%M%SZ").to_string();
        let end_time = slot.ends_at(offset).format("%Y%m%dT%H%M%SZ").to_string();

        let mut url = "https://calendar.google.com/calendar/render?action=TEMPLATE".to_string();
        url.push_str(&format!("&text={}", urlencoding::encode(&project.title)));
        url.push_str(&format!("&dates={}/{}", start_time, end_time));
        url.push_str(&format!("&details={}", urlencoding::encode(&format!("Volunteer slot: {}", slot.schedule_id))));

        url
    }
}

#[async_trait]
impl CalendarSync for CalendarService {
    async fn push_event(&self, event: &CalendarEvent) -> CalendarResult<()> {
        if !self.is_enabled() {
            debug!(signup_id = %event.signup_id, "Calendar sync disabled, skipping push");
            return Ok(());
        }

        let response = self
            .http_client
            .put(self.event_url(event.signup_id)?)
            .json(event)
            .send()
            .await
            .map_err(|e| CalendarError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CalendarError::ApiError(format!("Calendar API returned {}", response.status())));
        }

        info!(signup_id = %event.signup_id, "Calendar event pushed");
        Ok(())
    }

    async fn remove_event(&self, signup_id: Uuid) -> CalendarResult<()> {
        if !self.is_enabled() {
            debug!(signup_id = %signup_id, "Calendar sync disabled, skipping removal");
            return Ok(());
        }

        let response = self
            .http_client
            .delete(self.event_url(signup_id)?)
            .send()
            .await
            .map_err(|e| CalendarError::ApiError(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                info!(signup_id = %signup_id, "Calendar event removed");
                Ok(())
            }
            reqwest::StatusCode::NOT_FOUND => Err(CalendarError::EventNotFound(signup_id.to_string())),
            status => Err(CalendarError::ApiError(format!("Calendar API returned {}", status))),
        }
    }
}
