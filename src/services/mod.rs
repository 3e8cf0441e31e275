//! Services module
//!
//! This module contains business logic services

pub mod auth;
pub mod calendar;
pub mod capacity;
pub mod confirmation;
pub mod notification;
pub mod project;
pub mod reconciler;
pub mod signup;
pub mod status;

// Re-export commonly used services
pub use auth::{AuthService, IdentityProvider, StaticIdentityProvider};
pub use calendar::{CalendarEvent, CalendarService, CalendarSync};
pub use capacity::{CapacityLedger, ReleaseReason};
pub use confirmation::ConfirmationService;
pub use notification::{NotificationService, MailTransport, MailMessage, LogMailTransport, HttpMailTransport, MessageTemplate, NotificationStats};
pub use project::ProjectService;
pub use reconciler::{StatusReconciler, ReconcileReport};
pub use signup::{SignupService, SignupOutcome};
pub use status::{derive_status, derive_project_status, project_window, time_until_start};

use std::sync::Arc;
use std::time::Duration;
use crate::config::Settings;
use crate::database::VolunteerStore;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub store: Arc<dyn VolunteerStore>,
    pub auth_service: AuthService,
    pub confirmation_service: ConfirmationService,
    pub notification_service: NotificationService,
    pub project_service: ProjectService,
    pub signup_service: SignupService,
    reconciler_interval: Duration,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with collaborators built from settings
    pub fn new(store: Arc<dyn VolunteerStore>, settings: &Settings, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let notification_service = NotificationService::from_config(&settings.mail)?;
        let calendar: Arc<dyn CalendarSync> = Arc::new(CalendarService::new(&settings.calendar)?);

        Ok(Self::with_collaborators(store, settings, identity, notification_service, calendar))
    }

    /// Create a ServiceFactory around explicitly supplied collaborators
    pub fn with_collaborators(
        store: Arc<dyn VolunteerStore>,
        settings: &Settings,
        identity: Arc<dyn IdentityProvider>,
        notification_service: NotificationService,
        calendar: Arc<dyn CalendarSync>,
    ) -> Self {
        let auth_service = AuthService::new(identity, &settings.auth);
        let confirmation_service = ConfirmationService::new(store.clone(), &settings.signups);
        let project_service = ProjectService::new(
            store.clone(),
            auth_service.clone(),
            notification_service.clone(),
            &settings.signups,
        );
        let signup_service = SignupService::new(
            store.clone(),
            confirmation_service.clone(),
            auth_service.clone(),
            notification_service.clone(),
            calendar,
        );

        Self {
            store,
            auth_service,
            confirmation_service,
            notification_service,
            project_service,
            signup_service,
            reconciler_interval: Duration::from_secs(settings.reconciler.interval_seconds),
        }
    }

    /// Build a status reconciler sharing this factory's store
    pub fn reconciler(&self) -> StatusReconciler {
        StatusReconciler::new(self.store.clone(), self.confirmation_service.clone(), self.reconciler_interval)
    }
}
