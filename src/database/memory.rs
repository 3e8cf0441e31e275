//! In-process store
//!
//! Keeps all state behind one async mutex. Each trait method takes the lock
//! once and never awaits while holding it, so every operation is atomic with
//! respect to the others, matching the transactional guarantees of the
//! PostgreSQL store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{TokenRedemption, VolunteerStore};
use crate::models::{
    AnonymousSignup, IdentityKey, NewAnonymousSignup, NewProject, NewSignup, Project, ProjectStatus, Signup,
    SignupIdentity, SignupStatus,
};
use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::helpers::{constant_time_eq, normalize_email};

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<Uuid, Project>,
    signups: HashMap<Uuid, Signup>,
    anonymous: HashMap<Uuid, AnonymousSignup>,
    reservations: HashMap<(Uuid, String), i64>,
    account_emails: HashSet<String>,
}

impl MemoryState {
    fn reserve(&mut self, project_id: Uuid, schedule_id: &str, capacity: i32) -> Result<()> {
        let reserved = self
            .reservations
            .entry((project_id, schedule_id.to_string()))
            .or_insert(0);
        if *reserved >= capacity as i64 {
            return Err(VolunteerHubError::CapacityExceeded { schedule_id: schedule_id.to_string() });
        }
        *reserved += 1;
        Ok(())
    }

    fn release(&mut self, project_id: Uuid, schedule_id: &str) {
        if let Some(reserved) = self.reservations.get_mut(&(project_id, schedule_id.to_string())) {
            *reserved = (*reserved - 1).max(0);
        }
    }

    fn has_record(&self, project_id: Uuid, schedule_id: &str, identity: &IdentityKey) -> bool {
        self.signups.values().any(|signup| {
            signup.project_id == project_id && signup.schedule_id == schedule_id && &signup.identity.key() == identity
        })
    }

    fn build_signup(new: NewSignup) -> Signup {
        Signup {
            id: new.id,
            project_id: new.project_id,
            schedule_id: new.schedule_id,
            identity: new.identity,
            status: new.status,
            check_in_time: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }
}

/// Store that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a registered account email
    pub async fn register_account(&self, email: &str) {
        self.state.lock().await.account_emails.insert(normalize_email(email));
    }

    /// Number of anonymous signup rows currently stored
    pub async fn anonymous_signup_count(&self) -> usize {
        self.state.lock().await.anonymous.len()
    }
}

#[async_trait]
impl VolunteerStore for MemoryStore {
    async fn insert_project(&self, project: NewProject) -> Result<Project> {
        let mut state = self.state.lock().await;
        if state.projects.contains_key(&project.id) {
            return Err(VolunteerHubError::InvalidInput(format!("Project {} already exists", project.id)));
        }

        let project = Project {
            id: project.id,
            title: project.title,
            created_by: project.created_by,
            schedule: project.schedule,
            status: project.status,
            pause_signups: false,
            require_login: project.require_login,
            restrict_to_org_domains: project.restrict_to_org_domains,
            allowed_domains: project.allowed_domains,
            utc_offset_minutes: project.utc_offset_minutes,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: project.created_at,
            updated_at: project.created_at,
        };
        state.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        Ok(self.state.lock().await.projects.get(&project_id).cloned())
    }

    async fn list_reconcilable_projects(&self) -> Result<Vec<Project>> {
        let state = self.state.lock().await;
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| p.cancelled_at.is_none() && !matches!(p.status, ProjectStatus::Completed | ProjectStatus::Cancelled))
            .cloned()
            .collect();
        projects.sort_by_key(|p| (p.created_at, p.id));
        Ok(projects)
    }

    async fn update_project_status(
        &self,
        project_id: Uuid,
        expected: ProjectStatus,
        status: ProjectStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.projects.get_mut(&project_id) {
            Some(project) if project.status == expected && project.cancelled_at.is_none() => {
                project.status = status;
                project.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_project(
        &self,
        project_id: Uuid,
        cancelled_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.projects.get_mut(&project_id) {
            Some(project) if project.cancelled_at.is_none() => {
                project.cancelled_at = Some(cancelled_at);
                project.cancellation_reason = reason;
                project.status = ProjectStatus::Cancelled;
                project.updated_at = cancelled_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_pause_signups(&self, project_id: Uuid, paused: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.projects.get_mut(&project_id) {
            Some(project) => {
                project.pause_signups = paused;
                project.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_signup(&self, signup_id: Uuid) -> Result<Option<Signup>> {
        Ok(self.state.lock().await.signups.get(&signup_id).cloned())
    }

    async fn list_signups(
        &self,
        project_id: Uuid,
        schedule_id: Option<&str>,
        statuses: &[SignupStatus],
    ) -> Result<Vec<Signup>> {
        let state = self.state.lock().await;
        let mut signups: Vec<Signup> = state
            .signups
            .values()
            .filter(|s| s.project_id == project_id)
            .filter(|s| schedule_id.map_or(true, |id| s.schedule_id == id))
            .filter(|s| statuses.is_empty() || statuses.contains(&s.status))
            .cloned()
            .collect();
        signups.sort_by_key(|s| (s.created_at, s.id));
        Ok(signups)
    }

    async fn find_signup_for_identity(
        &self,
        project_id: Uuid,
        schedule_id: &str,
        identity: &IdentityKey,
    ) -> Result<Option<Signup>> {
        let state = self.state.lock().await;
        Ok(state
            .signups
            .values()
            .find(|s| s.project_id == project_id && s.schedule_id == schedule_id && &s.identity.key() == identity)
            .cloned())
    }

    async fn insert_signup(&self, signup: NewSignup, capacity: i32) -> Result<Signup> {
        let mut state = self.state.lock().await;
        if state.has_record(signup.project_id, &signup.schedule_id, &signup.identity.key()) {
            return Err(VolunteerHubError::DuplicateActiveSignup { schedule_id: signup.schedule_id });
        }
        if signup.status.holds_reservation() {
            state.reserve(signup.project_id, &signup.schedule_id, capacity)?;
        }

        let signup = MemoryState::build_signup(signup);
        state.signups.insert(signup.id, signup.clone());
        Ok(signup)
    }

    async fn insert_anonymous_signup(
        &self,
        signup: NewSignup,
        anonymous: NewAnonymousSignup,
        capacity: i32,
    ) -> Result<(Signup, AnonymousSignup)> {
        let mut state = self.state.lock().await;
        if state.has_record(signup.project_id, &signup.schedule_id, &signup.identity.key()) {
            return Err(VolunteerHubError::DuplicateActiveSignup { schedule_id: signup.schedule_id });
        }
        state.reserve(signup.project_id, &signup.schedule_id, capacity)?;

        let anonymous = AnonymousSignup {
            id: anonymous.id,
            project_id: signup.project_id,
            signup_id: signup.id,
            email: normalize_email(&anonymous.email),
            name: anonymous.name,
            phone: anonymous.phone,
            token: anonymous.token,
            confirmed_at: None,
            created_at: signup.created_at,
        };
        let signup = MemoryState::build_signup(signup);
        state.signups.insert(signup.id, signup.clone());
        state.anonymous.insert(anonymous.id, anonymous.clone());
        Ok((signup, anonymous))
    }

    async fn update_signup_status(
        &self,
        signup_id: Uuid,
        from: &[SignupStatus],
        status: SignupStatus,
        check_in_time: Option<DateTime<Utc>>,
    ) -> Result<Option<Signup>> {
        let mut state = self.state.lock().await;
        let Some(signup) = state.signups.get(&signup_id).cloned() else {
            return Ok(None);
        };
        if !from.contains(&signup.status) {
            return Ok(None);
        }

        // Status changes through here must not change whether capacity is held
        if signup.status.holds_reservation() != status.holds_reservation() {
            return Err(VolunteerHubError::InvalidStateTransition {
                from: signup.status.to_string(),
                to: status.to_string(),
            });
        }

        let Some(stored) = state.signups.get_mut(&signup_id) else {
            return Ok(None);
        };
        stored.status = status;
        if check_in_time.is_some() {
            stored.check_in_time = check_in_time;
        }
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn reject_signup(&self, signup_id: Uuid) -> Result<Option<Signup>> {
        let mut state = self.state.lock().await;
        let Some(signup) = state.signups.get(&signup_id).cloned() else {
            return Ok(None);
        };
        if !signup.status.is_active() {
            return Ok(None);
        }

        state.release(signup.project_id, &signup.schedule_id);
        let Some(stored) = state.signups.get_mut(&signup_id) else {
            return Ok(None);
        };
        stored.status = SignupStatus::Rejected;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn readmit_signup(&self, signup_id: Uuid, capacity: i32) -> Result<Option<Signup>> {
        let mut state = self.state.lock().await;
        let Some(signup) = state.signups.get(&signup_id).cloned() else {
            return Ok(None);
        };
        if signup.status != SignupStatus::Rejected {
            return Ok(None);
        }

        state.reserve(signup.project_id, &signup.schedule_id, capacity)?;
        // An anonymous signup that was never confirmed still waits for its token
        let awaiting_token = state
            .anonymous
            .values()
            .any(|a| a.signup_id == signup_id && a.confirmed_at.is_none());
        let Some(stored) = state.signups.get_mut(&signup_id) else {
            return Ok(None);
        };
        stored.status = if awaiting_token { SignupStatus::Pending } else { SignupStatus::Approved };
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete_signup(&self, signup_id: Uuid, from: &[SignupStatus]) -> Result<Option<Signup>> {
        let mut state = self.state.lock().await;
        match state.signups.get(&signup_id) {
            Some(signup) if from.contains(&signup.status) => {}
            _ => return Ok(None),
        }
        let Some(signup) = state.signups.remove(&signup_id) else {
            return Ok(None);
        };
        if signup.status.holds_reservation() {
            state.release(signup.project_id, &signup.schedule_id);
        }
        if let SignupIdentity::Anonymous { anonymous_signup_id, .. } = &signup.identity {
            state.anonymous.remove(anonymous_signup_id);
        }
        Ok(Some(signup))
    }

    async fn get_anonymous_signup(&self, anonymous_signup_id: Uuid) -> Result<Option<AnonymousSignup>> {
        Ok(self.state.lock().await.anonymous.get(&anonymous_signup_id).cloned())
    }

    async fn get_anonymous_signup_for_signup(&self, signup_id: Uuid) -> Result<Option<AnonymousSignup>> {
        let state = self.state.lock().await;
        Ok(state.anonymous.values().find(|a| a.signup_id == signup_id).cloned())
    }

    async fn redeem_anonymous_token(
        &self,
        anonymous_signup_id: Uuid,
        token: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<TokenRedemption> {
        let mut state = self.state.lock().await;
        let Some(anonymous) = state.anonymous.get(&anonymous_signup_id).cloned() else {
            return Ok(TokenRedemption::Invalid);
        };
        if !constant_time_eq(&anonymous.token, token) {
            return Ok(TokenRedemption::Invalid);
        }
        if anonymous.confirmed_at.is_some() {
            return Ok(TokenRedemption::AlreadyConfirmed);
        }

        let signup = match state.signups.get_mut(&anonymous.signup_id) {
            Some(signup) if signup.status == SignupStatus::Pending => {
                signup.status = SignupStatus::Approved;
                signup.updated_at = confirmed_at;
                signup.clone()
            }
            Some(signup) => {
                return Err(VolunteerHubError::InvalidStateTransition {
                    from: signup.status.to_string(),
                    to: SignupStatus::Approved.to_string(),
                })
            }
            None => {
                return Err(VolunteerHubError::Integrity(format!(
                    "Anonymous signup {} has no linked signup",
                    anonymous_signup_id
                )))
            }
        };

        let Some(stored) = state.anonymous.get_mut(&anonymous_signup_id) else {
            return Ok(TokenRedemption::Invalid);
        };
        stored.confirmed_at = Some(confirmed_at);
        Ok(TokenRedemption::Confirmed { anonymous: stored.clone(), signup })
    }

    async fn list_stale_anonymous_signups(&self, created_before: DateTime<Utc>) -> Result<Vec<AnonymousSignup>> {
        let state = self.state.lock().await;
        let mut stale: Vec<AnonymousSignup> = state
            .anonymous
            .values()
            .filter(|a| a.confirmed_at.is_none() && a.created_at < created_before)
            .filter(|a| {
                state
                    .signups
                    .get(&a.signup_id)
                    .is_some_and(|signup| signup.status == SignupStatus::Pending)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|a| (a.created_at, a.id));
        Ok(stale)
    }

    async fn reserved_count(&self, project_id: Uuid, schedule_id: &str) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .get(&(project_id, schedule_id.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn account_email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.state.lock().await.account_emails.contains(&normalize_email(email)))
    }
}
