//! Signup service implementation
//!
//! Drives the per-identity signup state machine:
//! `pending -> approved -> attended`, `pending|approved -> rejected` (a ban
//! kept as a record), and cancellation which deletes the record. Every
//! capacity change goes through the [`CapacityLedger`].

use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;
use crate::database::VolunteerStore;
use crate::models::*;
use crate::services::calendar::{CalendarEvent, CalendarSync};
use crate::services::capacity::{CapacityLedger, ReleaseReason};
use crate::services::auth::AuthService;
use crate::services::confirmation::ConfirmationService;
use crate::services::notification::NotificationService;
use crate::services::status::derive_project_status;
use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::helpers::{constant_time_eq, domain_allowed, email_domain, is_valid_email, is_valid_phone, normalize_email};
use crate::utils::logging::{log_dependency_failure, log_integrity_violation, log_manager_action, log_signup_transition};

/// Result of a successful signup request
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub signup: Signup,
    /// Set for anonymous signups; the confirmation link is mailed, never returned
    pub anonymous_signup_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct SignupService {
    store: Arc<dyn VolunteerStore>,
    ledger: CapacityLedger,
    confirmation: ConfirmationService,
    auth: AuthService,
    notifications: NotificationService,
    calendar: Arc<dyn CalendarSync>,
}

impl SignupService {
    pub fn new(
        store: Arc<dyn VolunteerStore>,
        confirmation: ConfirmationService,
        auth: AuthService,
        notifications: NotificationService,
        calendar: Arc<dyn CalendarSync>,
    ) -> Self {
        Self {
            ledger: CapacityLedger::new(store.clone()),
            store,
            confirmation,
            auth,
            notifications,
            calendar,
        }
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    async fn load_project(&self, project_id: Uuid) -> Result<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or(VolunteerHubError::ProjectNotFound { project_id })
    }

    async fn load_signup(&self, signup_id: Uuid) -> Result<Signup> {
        self.store
            .get_signup(signup_id)
            .await?
            .ok_or(VolunteerHubError::SignupNotFound { signup_id })
    }

    /// Resolve the slot a stored signup points at. A miss is a broken invariant.
    fn stored_slot(project: &Project, signup: &Signup) -> Result<Slot> {
        project.schedule.resolve_slot(&signup.schedule_id).map_err(|_| {
            let detail = format!("Signup {} references unknown slot {}", signup.id, signup.schedule_id);
            log_integrity_violation(&detail, Some(project.id));
            VolunteerHubError::Integrity(detail)
        })
    }

    fn invalid_transition(from: SignupStatus, to: &str) -> VolunteerHubError {
        VolunteerHubError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Gates every new signup must pass, evaluated against the current time
    fn check_accepting(project: &Project, slot: &Slot, now: DateTime<Utc>) -> Result<()> {
        let status = derive_project_status(project, now);
        if !status.accepts_signups() {
            return Err(VolunteerHubError::ProjectNotAcceptingSignups { status: status.to_string() });
        }
        if project.pause_signups {
            return Err(VolunteerHubError::PauseActive);
        }
        if is_slot_time_elapsed(slot, project.offset(), now) {
            return Err(VolunteerHubError::SlotTimeElapsed { schedule_id: slot.schedule_id.clone() });
        }
        Ok(())
    }

    fn check_anonymous_details(project: &Project, details: &AnonymousDetails) -> Result<()> {
        if project.require_login {
            return Err(VolunteerHubError::LoginRequired);
        }
        if !is_valid_email(&details.email) {
            return Err(VolunteerHubError::InvalidInput(format!("Invalid email address: {}", details.email)));
        }
        if details.name.trim().is_empty() {
            return Err(VolunteerHubError::InvalidInput("Name cannot be empty".to_string()));
        }
        if let Some(phone) = &details.phone {
            if !is_valid_phone(phone) {
                return Err(VolunteerHubError::InvalidInput(format!("Invalid phone number: {}", phone)));
            }
        }
        if project.restrict_to_org_domains && !domain_allowed(&details.email, &project.allowed_domains) {
            return Err(VolunteerHubError::DomainNotAllowed {
                domain: email_domain(&details.email).unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Any existing record blocks a new one; a rejected record is a ban
    async fn check_existing(&self, project_id: Uuid, schedule_id: &str, identity: &IdentityKey) -> Result<()> {
        match self.store.find_signup_for_identity(project_id, schedule_id, identity).await? {
            Some(existing) if existing.status == SignupStatus::Rejected => {
                Err(VolunteerHubError::AlreadyRejectedBanned { schedule_id: schedule_id.to_string() })
            }
            Some(_) => Err(VolunteerHubError::DuplicateActiveSignup { schedule_id: schedule_id.to_string() }),
            None => Ok(()),
        }
    }

    /// Create a signup for a registered user (approved at once) or an
    /// anonymous volunteer (pending until the mailed token is redeemed).
    /// Both reserve capacity immediately.
    pub async fn create_signup(&self, request: CreateSignupRequest, now: DateTime<Utc>) -> Result<SignupOutcome> {
        let project = self.load_project(request.project_id).await?;
        let slot = project.schedule.resolve_slot(&request.schedule_id)?;
        Self::check_accepting(&project, &slot, now)?;

        match request.applicant {
            Applicant::User { user_id } => self.create_user_signup(&project, &slot, user_id, now).await,
            Applicant::Anonymous(details) => self.create_anonymous_signup(&project, &slot, details, now).await,
        }
    }

    async fn create_user_signup(&self, project: &Project, slot: &Slot, user_id: Uuid, now: DateTime<Utc>) -> Result<SignupOutcome> {
        self.auth.check_domain(user_id, project).await?;
        self.check_existing(project.id, &slot.schedule_id, &IdentityKey::User(user_id)).await?;

        let new_signup = NewSignup {
            id: Uuid::new_v4(),
            project_id: project.id,
            schedule_id: slot.schedule_id.clone(),
            identity: SignupIdentity::User { user_id },
            status: SignupStatus::Approved,
            created_at: now,
        };
        let signup = self.ledger.admit(new_signup, slot.capacity).await?;
        info!(signup_id = %signup.id, project_id = %project.id, schedule_id = %signup.schedule_id, user_id = %user_id, "Signup approved");

        self.notify_approved(project, &signup).await;
        self.push_calendar(project, slot, &signup).await;

        Ok(SignupOutcome { signup, anonymous_signup_id: None })
    }

    async fn create_anonymous_signup(
        &self,
        project: &Project,
        slot: &Slot,
        details: AnonymousDetails,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome> {
        Self::check_anonymous_details(project, &details)?;
        self.confirmation.check_email_collision(&details.email).await?;

        let email = normalize_email(&details.email);
        self.check_existing(project.id, &slot.schedule_id, &IdentityKey::Email(email.clone())).await?;

        let anonymous_signup_id = Uuid::new_v4();
        let token = self.confirmation.issue_token();
        let new_signup = NewSignup {
            id: Uuid::new_v4(),
            project_id: project.id,
            schedule_id: slot.schedule_id.clone(),
            identity: SignupIdentity::Anonymous { anonymous_signup_id, email: email.clone() },
            status: SignupStatus::Pending,
            created_at: now,
        };
        let new_anonymous = NewAnonymousSignup {
            id: anonymous_signup_id,
            email,
            name: details.name.trim().to_string(),
            phone: details.phone,
            token,
        };

        let (signup, anonymous) = self.ledger.admit_anonymous(new_signup, new_anonymous, slot.capacity).await?;
        info!(signup_id = %signup.id, project_id = %project.id, schedule_id = %signup.schedule_id, "Anonymous signup pending confirmation");

        match self.confirmation.confirmation_url(anonymous.id, &anonymous.token) {
            Ok(url) => {
                if let Err(e) = self.notifications.send_confirmation_email(&anonymous, project, &url).await {
                    log_dependency_failure("mail", &e.to_string(), Some("confirmation email"));
                }
            }
            Err(e) => log_dependency_failure("mail", &e.to_string(), Some("confirmation url")),
        }

        Ok(SignupOutcome { signup, anonymous_signup_id: Some(anonymous.id) })
    }

    /// Redeem an anonymous confirmation token
    pub async fn confirm_anonymous(&self, anonymous_signup_id: Uuid, token: &str, now: DateTime<Utc>) -> Result<Signup> {
        let (_, signup) = self.confirmation.confirm(anonymous_signup_id, token, now).await?;

        let project = self.load_project(signup.project_id).await?;
        let slot = Self::stored_slot(&project, &signup)?;
        self.notify_approved(&project, &signup).await;
        self.push_calendar(&project, &slot, &signup).await;

        Ok(signup)
    }

    /// Reject a pending or approved signup. The record stays as a ban.
    pub async fn reject(&self, manager_id: Uuid, signup_id: Uuid) -> Result<Signup> {
        let signup = self.load_signup(signup_id).await?;
        let project = self.load_project(signup.project_id).await?;
        self.auth.require_manager(manager_id, &project).await?;

        if !signup.status.is_active() {
            return Err(Self::invalid_transition(signup.status, SignupStatus::Rejected.as_str()));
        }

        let rejected = match self.ledger.release(signup_id, ReleaseReason::Rejected).await? {
            Some(rejected) => rejected,
            None => {
                let current = self.load_signup(signup_id).await?;
                return Err(Self::invalid_transition(current.status, SignupStatus::Rejected.as_str()));
            }
        };

        log_signup_transition(signup_id, &rejected.schedule_id, signup.status.as_str(), rejected.status.as_str());
        log_manager_action(manager_id, "reject_signup", signup_id);

        self.notify_rejected(&project, &rejected).await;
        if signup.status == SignupStatus::Approved {
            self.remove_calendar(signup_id).await;
        }
        Ok(rejected)
    }

    /// Lift a rejection, approving the signup again if the slot has room.
    ///
    /// An anonymous signup whose token was never redeemed returns to `pending`
    /// and still needs its confirmation link.
    pub async fn unreject(&self, manager_id: Uuid, signup_id: Uuid) -> Result<Signup> {
        let signup = self.load_signup(signup_id).await?;
        let project = self.load_project(signup.project_id).await?;
        self.auth.require_manager(manager_id, &project).await?;

        if signup.status != SignupStatus::Rejected {
            return Err(Self::invalid_transition(signup.status, SignupStatus::Approved.as_str()));
        }

        let slot = Self::stored_slot(&project, &signup)?;
        let readmitted = match self.ledger.readmit(signup_id, slot.capacity).await? {
            Some(readmitted) => readmitted,
            None => {
                let current = self.load_signup(signup_id).await?;
                return Err(Self::invalid_transition(current.status, SignupStatus::Approved.as_str()));
            }
        };

        log_signup_transition(signup_id, &readmitted.schedule_id, SignupStatus::Rejected.as_str(), readmitted.status.as_str());
        log_manager_action(manager_id, "unreject_signup", signup_id);

        if readmitted.status == SignupStatus::Approved {
            self.notify_approved(&project, &readmitted).await;
            self.push_calendar(&project, &slot, &readmitted).await;
        }
        Ok(readmitted)
    }

    /// Cancel a signup: the record is deleted and its capacity freed.
    ///
    /// The signup's own identity or a project manager may cancel, until the slot ends.
    pub async fn cancel_signup(&self, actor: &Actor, signup_id: Uuid, now: DateTime<Utc>) -> Result<Signup> {
        let signup = self.load_signup(signup_id).await?;
        let project = self.load_project(signup.project_id).await?;
        self.authorize_cancel(actor, &signup, &project).await?;

        if !signup.status.is_active() {
            return Err(Self::invalid_transition(signup.status, "cancelled"));
        }

        let slot = Self::stored_slot(&project, &signup)?;
        if is_slot_time_elapsed(&slot, project.offset(), now) {
            return Err(VolunteerHubError::SlotTimeElapsed { schedule_id: slot.schedule_id });
        }

        let cancelled = match self.ledger.release(signup_id, ReleaseReason::Cancelled).await? {
            Some(cancelled) => cancelled,
            None => {
                let current = self.load_signup(signup_id).await?;
                return Err(Self::invalid_transition(current.status, "cancelled"));
            }
        };

        log_signup_transition(signup_id, &cancelled.schedule_id, cancelled.status.as_str(), "cancelled");
        if cancelled.status == SignupStatus::Approved {
            self.remove_calendar(signup_id).await;
        }
        Ok(cancelled)
    }

    async fn authorize_cancel(&self, actor: &Actor, signup: &Signup, project: &Project) -> Result<()> {
        match actor {
            Actor::User(user_id) => {
                if signup.identity.user_id() == Some(*user_id) {
                    return Ok(());
                }
                self.auth.require_manager(*user_id, project).await
            }
            Actor::AnonymousHolder { anonymous_signup_id, token } => {
                let denied = || VolunteerHubError::PermissionDenied("Confirmation link does not match this signup".to_string());
                if signup.identity.anonymous_signup_id() != Some(*anonymous_signup_id) {
                    return Err(denied());
                }
                let anonymous = self
                    .store
                    .get_anonymous_signup(*anonymous_signup_id)
                    .await?
                    .ok_or_else(denied)?;
                if constant_time_eq(&anonymous.token, token) {
                    Ok(())
                } else {
                    Err(denied())
                }
            }
        }
    }

    /// Record attendance for an approved signup
    pub async fn mark_attended(&self, manager_id: Uuid, signup_id: Uuid, now: DateTime<Utc>) -> Result<Signup> {
        let signup = self.load_signup(signup_id).await?;
        let project = self.load_project(signup.project_id).await?;
        self.auth.require_manager(manager_id, &project).await?;

        let attended = self
            .store
            .update_signup_status(signup_id, &[SignupStatus::Approved], SignupStatus::Attended, Some(now))
            .await?;

        match attended {
            Some(attended) => {
                log_signup_transition(signup_id, &attended.schedule_id, SignupStatus::Approved.as_str(), attended.status.as_str());
                Ok(attended)
            }
            None => {
                let current = self.load_signup(signup_id).await?;
                Err(Self::invalid_transition(current.status, SignupStatus::Attended.as_str()))
            }
        }
    }

    /// Advisory per-slot counts for display
    pub async fn slot_availability(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<Vec<SlotAvailability>> {
        let project = self.load_project(project_id).await?;
        let offset = project.offset();

        let mut availability = Vec::new();
        for slot in project.schedule.enumerate_slots() {
            let reserved = self.ledger.current_count(project_id, &slot.schedule_id).await?;
            let committed = self.ledger.committed_count(project_id, &slot.schedule_id).await?;
            availability.push(SlotAvailability {
                remaining: (slot.capacity as i64 - reserved).max(0),
                elapsed: is_slot_time_elapsed(&slot, offset, now),
                schedule_id: slot.schedule_id,
                capacity: slot.capacity,
                reserved,
                committed,
            });
        }

        Ok(availability)
    }

    /// Signups of a project, optionally narrowed to a slot and statuses
    pub async fn list_signups(&self, project_id: Uuid, schedule_id: Option<&str>, statuses: &[SignupStatus]) -> Result<Vec<Signup>> {
        self.store.list_signups(project_id, schedule_id, statuses).await
    }

    async fn notify_approved(&self, project: &Project, signup: &Signup) {
        match self.auth.contact_email(&signup.identity).await {
            Ok(Some(to)) => {
                if let Err(e) = self.notifications.send_approval_notification(&to, project, &signup.schedule_id).await {
                    log_dependency_failure("mail", &e.to_string(), Some("approval notification"));
                }
            }
            Ok(None) => debug!(signup_id = %signup.id, "No contact email, approval notification skipped"),
            Err(e) => log_dependency_failure("identity", &e.to_string(), Some("approval notification")),
        }
    }

    async fn notify_rejected(&self, project: &Project, signup: &Signup) {
        match self.auth.contact_email(&signup.identity).await {
            Ok(Some(to)) => {
                if let Err(e) = self.notifications.send_rejection_notification(&to, project, &signup.schedule_id).await {
                    log_dependency_failure("mail", &e.to_string(), Some("rejection notification"));
                }
            }
            Ok(None) => debug!(signup_id = %signup.id, "No contact email, rejection notification skipped"),
            Err(e) => log_dependency_failure("identity", &e.to_string(), Some("rejection notification")),
        }
    }

    async fn push_calendar(&self, project: &Project, slot: &Slot, signup: &Signup) {
        let event = CalendarEvent::for_signup(signup, project, slot);
        if let Err(e) = self.calendar.push_event(&event).await {
            log_dependency_failure("calendar", &e.to_string(), Some("push event"));
        }
    }

    async fn remove_calendar(&self, signup_id: Uuid) {
        if let Err(e) = self.calendar.remove_event(signup_id).await {
            log_dependency_failure("calendar", &e.to_string(), Some("remove event"));
        }
    }
}
