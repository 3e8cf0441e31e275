//! Test context for unified test setup
//!
//! Wires the services over an in-memory store with recording mail and
//! calendar collaborators, so a test can drive the full signup flow and then
//! inspect what was stored and what was sent.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use VolunteerHub::config::Settings;
use VolunteerHub::database::{MemoryStore, VolunteerStore};
use VolunteerHub::models::{AnonymousSignup, Project, Schedule};
use VolunteerHub::services::{CalendarSync, MailTransport, NotificationService, ServiceFactory, StaticIdentityProvider};

use super::mocks::{RecordingCalendar, RecordingMailTransport};
use super::test_data::{project_request, test_now};

/// Test configuration options
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub staff_user_ids: Vec<Uuid>,
    pub anonymous_token_ttl_hours: Option<i64>,
}

/// Unified test context that manages all test components
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub mail: Arc<RecordingMailTransport>,
    pub calendar: Arc<RecordingCalendar>,
    pub services: ServiceFactory,
    pub settings: Settings,
    /// Creator of every project made through [`TestContext::create_project`]
    pub manager_id: Uuid,
}

impl TestContext {
    pub fn new() -> Self {
        Self::new_with_config(TestConfig::default())
    }

    pub fn new_with_config(config: TestConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let mut settings = Settings::default();
        settings.auth.staff_user_ids = config.staff_user_ids;
        if let Some(ttl) = config.anonymous_token_ttl_hours {
            settings.signups.anonymous_token_ttl_hours = ttl;
        }

        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(StaticIdentityProvider::new());
        let mail = Arc::new(RecordingMailTransport::new());
        let calendar = Arc::new(RecordingCalendar::new());

        let transport: Arc<dyn MailTransport> = mail.clone();
        let notifications = NotificationService::new(transport, settings.mail.from_address.clone());
        let calendar_sync: Arc<dyn CalendarSync> = calendar.clone();
        let store_handle: Arc<dyn VolunteerStore> = store.clone();

        let services = ServiceFactory::with_collaborators(store_handle, &settings, identity.clone(), notifications, calendar_sync);

        Self {
            store,
            identity,
            mail,
            calendar,
            services,
            settings,
            manager_id: Uuid::new_v4(),
        }
    }

    /// Create a project owned by [`TestContext::manager_id`]
    pub async fn create_project(&self, schedule: Schedule) -> Project {
        self.services
            .project_service
            .create_project(project_request(self.manager_id, schedule), test_now())
            .await
            .expect("Failed to create project")
    }

    /// Register a user with one verified email
    pub async fn add_user(&self, email: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.identity.add_user(user_id, vec![email.to_string()]).await;
        user_id
    }

    pub async fn anonymous_signup(&self, anonymous_signup_id: Uuid) -> Option<AnonymousSignup> {
        self.store
            .get_anonymous_signup(anonymous_signup_id)
            .await
            .expect("Failed to read anonymous signup")
    }

    /// The token that was mailed for an anonymous signup
    pub async fn token_for(&self, anonymous_signup_id: Uuid) -> String {
        self.anonymous_signup(anonymous_signup_id)
            .await
            .expect("Anonymous signup not found")
            .token
    }

    pub async fn reserved(&self, project_id: Uuid, schedule_id: &str) -> i64 {
        self.store
            .reserved_count(project_id, schedule_id)
            .await
            .expect("Failed to read reservation count")
    }

    pub fn now(&self) -> DateTime<Utc> {
        test_now()
    }
}
