//! The storage trait the signup core depends on.
//!
//! Every method is one atomic storage operation. Anything that must change
//! more than one row together (a signup and its capacity reservation, a
//! signup and its anonymous details) is a single method, so backends can run
//! it inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AnonymousSignup, IdentityKey, NewAnonymousSignup, NewProject, NewSignup, Project, ProjectStatus, Signup,
    SignupStatus,
};
use crate::utils::errors::Result;

/// Result of redeeming an anonymous confirmation token
#[derive(Debug, Clone)]
pub enum TokenRedemption {
    /// The token matched and had not been used; the linked signup is now approved
    Confirmed { anonymous: AnonymousSignup, signup: Signup },
    /// The token matched but was already redeemed
    AlreadyConfirmed,
    /// No anonymous signup with this id, or the token did not match
    Invalid,
}

#[async_trait]
pub trait VolunteerStore: Send + Sync {
    // ───────────────────────────── Projects ─────────────────────────────

    async fn insert_project(&self, project: NewProject) -> Result<Project>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>>;

    /// Projects whose stored status may still move forward (not cancelled, not completed)
    async fn list_reconcilable_projects(&self) -> Result<Vec<Project>>;

    /// Write a new status only if the stored status still equals `expected`
    /// and the project has not been cancelled. Returns whether a row changed.
    async fn update_project_status(
        &self,
        project_id: Uuid,
        expected: ProjectStatus,
        status: ProjectStatus,
    ) -> Result<bool>;

    /// Mark a project cancelled unless it already is. Returns whether a row changed.
    async fn cancel_project(
        &self,
        project_id: Uuid,
        cancelled_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<bool>;

    async fn set_pause_signups(&self, project_id: Uuid, paused: bool) -> Result<bool>;

    // ───────────────────────────── Signups ──────────────────────────────

    async fn get_signup(&self, signup_id: Uuid) -> Result<Option<Signup>>;

    /// List signups of a project, optionally restricted to one slot and a set of statuses.
    /// An empty status list means every status.
    async fn list_signups(
        &self,
        project_id: Uuid,
        schedule_id: Option<&str>,
        statuses: &[SignupStatus],
    ) -> Result<Vec<Signup>>;

    /// The record (of any status) held by an identity for one slot
    async fn find_signup_for_identity(
        &self,
        project_id: Uuid,
        schedule_id: &str,
        identity: &IdentityKey,
    ) -> Result<Option<Signup>>;

    /// Reserve one unit of capacity and insert the signup, or do neither.
    ///
    /// Fails with `CapacityExceeded` when the slot already holds `capacity`
    /// reservations, and with `DuplicateActiveSignup` when the identity already
    /// has a record for the slot.
    async fn insert_signup(&self, signup: NewSignup, capacity: i32) -> Result<Signup>;

    /// Like [`insert_signup`](Self::insert_signup), also writing the anonymous
    /// details. Either both rows and the reservation are written or nothing is.
    async fn insert_anonymous_signup(
        &self,
        signup: NewSignup,
        anonymous: NewAnonymousSignup,
        capacity: i32,
    ) -> Result<(Signup, AnonymousSignup)>;

    /// Move a signup to `status` if its current status is one of `from`.
    /// Returns `None` when the signup does not exist or is in another status.
    async fn update_signup_status(
        &self,
        signup_id: Uuid,
        from: &[SignupStatus],
        status: SignupStatus,
        check_in_time: Option<DateTime<Utc>>,
    ) -> Result<Option<Signup>>;

    /// Reject a pending or approved signup and release its reservation
    async fn reject_signup(&self, signup_id: Uuid) -> Result<Option<Signup>>;

    /// Re-acquire capacity for a rejected signup and approve it. An anonymous
    /// signup whose token was never redeemed goes back to `pending` instead.
    /// Fails with `CapacityExceeded` when the slot is full.
    async fn readmit_signup(&self, signup_id: Uuid, capacity: i32) -> Result<Option<Signup>>;

    /// Delete a signup (and its anonymous details) if its status is one of `from`,
    /// releasing its reservation if it held one
    async fn delete_signup(&self, signup_id: Uuid, from: &[SignupStatus]) -> Result<Option<Signup>>;

    // ──────────────────────── Anonymous signups ─────────────────────────

    async fn get_anonymous_signup(&self, anonymous_signup_id: Uuid) -> Result<Option<AnonymousSignup>>;

    /// The anonymous details linked to a signup, if it was made anonymously
    async fn get_anonymous_signup_for_signup(&self, signup_id: Uuid) -> Result<Option<AnonymousSignup>>;

    /// Compare `token` with the stored one and, if unused, set `confirmed_at`
    /// and approve the linked pending signup in the same operation.
    async fn redeem_anonymous_token(
        &self,
        anonymous_signup_id: Uuid,
        token: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<TokenRedemption>;

    /// Unconfirmed anonymous signups created before the cutoff whose signup is still pending
    async fn list_stale_anonymous_signups(&self, created_before: DateTime<Utc>) -> Result<Vec<AnonymousSignup>>;

    // ───────────────────────────── Capacity ─────────────────────────────

    /// Reservations currently held on a slot. Advisory only.
    async fn reserved_count(&self, project_id: Uuid, schedule_id: &str) -> Result<i64>;

    // ───────────────────────────── Accounts ─────────────────────────────

    /// Whether a registered account uses this email (case-insensitive)
    async fn account_email_exists(&self, email: &str) -> Result<bool>;
}
