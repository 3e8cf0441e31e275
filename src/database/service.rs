//! Database service layer
//!
//! This module composes the repositories into the storage interface the services use

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::database::{AccountRepository, DatabasePool, ProjectRepository, SignupRepository};
use crate::database::store::{TokenRedemption, VolunteerStore};
use crate::models::*;
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub projects: ProjectRepository,
    pub signups: SignupRepository,
    pub accounts: AccountRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            projects: ProjectRepository::new(pool.clone()),
            signups: SignupRepository::new(pool.clone()),
            accounts: AccountRepository::new(pool),
        }
    }
}

#[async_trait]
impl VolunteerStore for DatabaseService {
    async fn insert_project(&self, project: NewProject) -> Result<Project> {
        self.projects.create(project).await
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        self.projects.find_by_id(project_id).await
    }

    async fn list_reconcilable_projects(&self) -> Result<Vec<Project>> {
        self.projects.list_reconcilable().await
    }

    async fn update_project_status(&self, project_id: Uuid, expected: ProjectStatus, status: ProjectStatus) -> Result<bool> {
        self.projects.update_status_if(project_id, expected, status).await
    }

    async fn cancel_project(&self, project_id: Uuid, cancelled_at: DateTime<Utc>, reason: Option<String>) -> Result<bool> {
        self.projects.cancel(project_id, cancelled_at, reason).await
    }

    async fn set_pause_signups(&self, project_id: Uuid, paused: bool) -> Result<bool> {
        self.projects.set_pause_signups(project_id, paused).await
    }

    async fn get_signup(&self, signup_id: Uuid) -> Result<Option<Signup>> {
        self.signups.find_by_id(signup_id).await
    }

    async fn list_signups(&self, project_id: Uuid, schedule_id: Option<&str>, statuses: &[SignupStatus]) -> Result<Vec<Signup>> {
        self.signups.list(project_id, schedule_id, statuses).await
    }

    async fn find_signup_for_identity(&self, project_id: Uuid, schedule_id: &str, identity: &IdentityKey) -> Result<Option<Signup>> {
        self.signups.find_for_identity(project_id, schedule_id, identity).await
    }

    async fn insert_signup(&self, signup: NewSignup, capacity: i32) -> Result<Signup> {
        self.signups.insert_admitted(signup, capacity).await
    }

    async fn insert_anonymous_signup(
        &self,
        signup: NewSignup,
        anonymous: NewAnonymousSignup,
        capacity: i32,
    ) -> Result<(Signup, AnonymousSignup)> {
        self.signups.insert_anonymous_admitted(signup, anonymous, capacity).await
    }

    async fn update_signup_status(
        &self,
        signup_id: Uuid,
        from: &[SignupStatus],
        status: SignupStatus,
        check_in_time: Option<DateTime<Utc>>,
    ) -> Result<Option<Signup>> {
        self.signups.update_status(signup_id, from, status, check_in_time).await
    }

    async fn reject_signup(&self, signup_id: Uuid) -> Result<Option<Signup>> {
        self.signups.reject(signup_id).await
    }

    async fn readmit_signup(&self, signup_id: Uuid, capacity: i32) -> Result<Option<Signup>> {
        self.signups.readmit(signup_id, capacity).await
    }

    async fn delete_signup(&self, signup_id: Uuid, from: &[SignupStatus]) -> Result<Option<Signup>> {
        self.signups.delete(signup_id, from).await
    }

    async fn get_anonymous_signup(&self, anonymous_signup_id: Uuid) -> Result<Option<AnonymousSignup>> {
        self.signups.find_anonymous(anonymous_signup_id).await
    }

    async fn get_anonymous_signup_for_signup(&self, signup_id: Uuid) -> Result<Option<AnonymousSignup>> {
        self.signups.find_anonymous_for_signup(signup_id).await
    }

    async fn redeem_anonymous_token(&self, anonymous_signup_id: Uuid, token: &str, confirmed_at: DateTime<Utc>) -> Result<TokenRedemption> {
        self.signups.redeem_token(anonymous_signup_id, token, confirmed_at).await
    }

    async fn list_stale_anonymous_signups(&self, created_before: DateTime<Utc>) -> Result<Vec<AnonymousSignup>> {
        self.signups.list_stale_anonymous(created_before).await
    }

    async fn reserved_count(&self, project_id: Uuid, schedule_id: &str) -> Result<i64> {
        self.signups.reserved_count(project_id, schedule_id).await
    }

    async fn account_email_exists(&self, email: &str) -> Result<bool> {
        self.accounts.email_exists(email).await
    }
}
