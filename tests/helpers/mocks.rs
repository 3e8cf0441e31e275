//! Recording collaborators
//!
//! Stand-ins for the mail relay and the calendar that remember every call and
//! can be switched into a failing mode.

use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;
use VolunteerHub::services::{CalendarEvent, CalendarSync, MailMessage, MailTransport};
use VolunteerHub::utils::errors::{CalendarError, CalendarResult, MailError, MailResult};

/// Mail transport that keeps every message it was asked to send
#[derive(Debug, Default)]
pub struct RecordingMailTransport {
    messages: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail as if the relay were down
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn messages(&self) -> Vec<MailMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn messages_with_template(&self, template_key: &str) -> Vec<MailMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.template_key == template_key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send(&self, message: &MailMessage) -> MailResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Rejected(503));
        }
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

/// Calendar that tracks which signups currently have an event
#[derive(Debug, Default)]
pub struct RecordingCalendar {
    pushed: Mutex<Vec<CalendarEvent>>,
    removed: Mutex<Vec<Uuid>>,
    failing: AtomicBool,
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn pushed(&self) -> Vec<CalendarEvent> {
        self.pushed.lock().await.clone()
    }

    pub async fn removed(&self) -> Vec<Uuid> {
        self.removed.lock().await.clone()
    }
}

#[async_trait]
impl CalendarSync for RecordingCalendar {
    async fn push_event(&self, event: &CalendarEvent) -> CalendarResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CalendarError::ApiError("calendar unavailable".to_string()));
        }
        self.pushed.lock().await.push(event.clone());
        Ok(())
    }

    async fn remove_event(&self, signup_id: Uuid) -> CalendarResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CalendarError::ApiError("calendar unavailable".to_string()));
        }
        self.removed.lock().await.push(signup_id);
        Ok(())
    }
}
