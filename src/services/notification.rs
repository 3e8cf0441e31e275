//! Notification service implementation
//!
//! This service renders message templates and hands them to a mail transport.
//! Delivery is fire-and-forget from the signup core's point of view: callers
//! log failures and never undo a state transition because of them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use crate::config::MailConfig;
use crate::models::{AnonymousSignup, Project};
use crate::utils::errors::{MailError, MailResult, Result, VolunteerHubError};

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub template_key: String,
}

/// Something that can deliver a [`MailMessage`]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> MailResult<()>;
}

/// Transport that only writes messages to the log, used when mail is disabled
#[derive(Debug, Clone, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, message: &MailMessage) -> MailResult<()> {
        info!(to = %message.to, template_key = %message.template_key, subject = %message.subject, "Mail delivery disabled, message logged");
        Ok(())
    }
}

/// Transport that posts messages as JSON to an HTTP mail relay
#[derive(Debug, Clone)]
pub struct HttpMailTransport {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpMailTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("VolunteerHub/1.0")
            .build()
            .map_err(VolunteerHubError::Http)?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, message: &MailMessage) -> MailResult<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| MailError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        debug!(to = %message.to, status = status.as_u16(), "Mail relay accepted message");
        Ok(())
    }
}

/// Message template structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub key: String,
    pub subject: String,
    pub body: String,
}

/// Notification statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total_sent: u64,
    pub total_failed: u64,
    pub sent_by_template: HashMap<String, u64>,
}

/// Notification service for volunteer mail
#[derive(Clone)]
pub struct NotificationService {
    transport: Arc<dyn MailTransport>,
    from_address: String,
    templates: Arc<HashMap<String, MessageTemplate>>,
    stats: Arc<Mutex<NotificationStats>>,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(transport: Arc<dyn MailTransport>, from_address: impl Into<String>) -> Self {
        Self {
            transport,
            from_address: from_address.into(),
            templates: Arc::new(Self::load_default_templates()),
            stats: Arc::new(Mutex::new(NotificationStats::default())),
        }
    }

    /// Build the service with the transport the mail settings ask for
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let transport: Arc<dyn MailTransport> = match (&config.endpoint, config.enabled) {
            (Some(endpoint), true) => Arc::new(HttpMailTransport::new(
                endpoint.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?),
            _ => Arc::new(LogMailTransport),
        };

        Ok(Self::new(transport, config.from_address.clone()))
    }

    /// Render a template and deliver it to one recipient
    pub async fn send_templated(&self, to: &str, template_key: &str, parameters: &HashMap<String, String>) -> MailResult<()> {
        debug!(to = %to, template_key = %template_key, "Sending notification");

        let (subject, body) = self.format_message(template_key, parameters)?;
        let message = MailMessage {
            from: self.from_address.clone(),
            to: to.to_string(),
            subject,
            body,
            template_key: template_key.to_string(),
        };

        match self.transport.send(&message).await {
            Ok(()) => {
                self.update_stats_success(template_key).await;
                info!(to = %to, template_key = %template_key, "Notification sent successfully");
                Ok(())
            }
            Err(e) => {
                self.update_stats_failure().await;
                warn!(to = %to, template_key = %template_key, error = %e, "Failed to send notification");
                Err(e)
            }
        }
    }

    /// Send the confirmation link for an anonymous signup
    pub async fn send_confirmation_email(&self, anonymous: &AnonymousSignup, project: &Project, confirmation_url: &str) -> MailResult<()> {
        let parameters = HashMap::from([
            ("name".to_string(), anonymous.name.clone()),
            ("project_title".to_string(), project.title.clone()),
            ("confirmation_url".to_string(), confirmation_url.to_string()),
        ]);

        self.send_templated(&anonymous.email, "signup_confirmation", &parameters).await
    }

    /// Tell a volunteer their signup is approved
    pub async fn send_approval_notification(&self, to: &str, project: &Project, schedule_id: &str) -> MailResult<()> {
        let parameters = Self::slot_parameters(project, schedule_id);
        self.send_templated(to, "signup_approved", &parameters).await
    }

    /// Tell a volunteer their signup was rejected
    pub async fn send_rejection_notification(&self, to: &str, project: &Project, schedule_id: &str) -> MailResult<()> {
        let parameters = Self::slot_parameters(project, schedule_id);
        self.send_templated(to, "signup_rejected", &parameters).await
    }

    /// Announce a project cancellation to every recipient.
    ///
    /// Returns how many messages were delivered; individual failures are only logged.
    pub async fn send_cancellation_broadcast(&self, recipients: &[String], project: &Project, reason: Option<&str>) -> usize {
        info!(count = recipients.len(), project_id = %project.id, "Sending cancellation broadcast");

        let parameters = HashMap::from([
            ("project_title".to_string(), project.title.clone()),
            ("reason".to_string(), reason.unwrap_or("No reason given").to_string()),
        ]);

        let mut delivered = 0;
        for recipient in recipients {
            if self.send_templated(recipient, "project_cancelled", &parameters).await.is_ok() {
                delivered += 1;
            }
        }

        info!(total = recipients.len(), delivered = delivered, "Cancellation broadcast completed");
        delivered
    }

    fn slot_parameters(project: &Project, schedule_id: &str) -> HashMap<String, String> {
        HashMap::from([
            ("project_title".to_string(), project.title.clone()),
            ("schedule_id".to_string(), schedule_id.to_string()),
        ])
    }

    /// Format subject and body using template and parameters
    fn format_message(&self, template_key: &str, parameters: &HashMap<String, String>) -> MailResult<(String, String)> {
        let template = self
            .templates
            .get(template_key)
            .ok_or_else(|| MailError::TemplateNotFound(template_key.to_string()))?;

        let mut subject = template.subject.clone();
        let mut body = template.body.clone();

        // Replace parameters in the template
        for (key, value) in parameters {
            let placeholder = format!("{{{}}}", key);
            subject = subject.replace(&placeholder, value);
            body = body.replace(&placeholder, value);
        }

        Ok((subject, body))
    }

    async fn update_stats_success(&self, template_key: &str) {
        let mut stats = self.stats.lock().await;
        stats.total_sent += 1;
        *stats.sent_by_template.entry(template_key.to_string()).or_insert(0) += 1;
    }

    async fn update_stats_failure(&self) {
        self.stats.lock().await.total_failed += 1;
    }

    /// Get notification statistics
    pub async fn get_stats(&self) -> NotificationStats {
        self.stats.lock().await.clone()
    }

    /// Reset statistics
    pub async fn reset_stats(&self) {
        *self.stats.lock().await = NotificationStats::default();
    }

    /// Get available template keys
    pub fn get_template_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.templates.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Load default message templates
    fn load_default_templates() -> HashMap<String, MessageTemplate> {
        let defaults = [
            (
                "signup_confirmation",
                "Confirm your signup for {project_title}",
                "Hi {name},\n\nPlease confirm your spot for {project_title} by opening this link:\n{confirmation_url}\n\nIf you did not sign up, ignore this message.",
            ),
            (
                "signup_approved",
                "You're signed up for {project_title}",
                "Your signup for {project_title} ({schedule_id}) is confirmed. See you there!",
            ),
            (
                "signup_rejected",
                "Update on your signup for {project_title}",
                "The organizers of {project_title} could not accept your signup for {schedule_id}.",
            ),
            (
                "project_cancelled",
                "{project_title} has been cancelled",
                "{project_title} has been cancelled by its organizers.\n\nReason: {reason}",
            ),
        ];

        defaults
            .into_iter()
            .map(|(key, subject, body)| {
                (key.to_string(), MessageTemplate {
                    key: key.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                })
            })
            .collect()
    }
}
