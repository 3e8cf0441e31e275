//! Capacity ledger
//!
//! Admission is always a single capacity-checked store operation. The counts
//! exposed here are advisory and never gate an admission on their own.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use crate::database::VolunteerStore;
use crate::models::{AnonymousSignup, NewAnonymousSignup, NewSignup, Signup, SignupStatus};
use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::logging::log_admission;

/// Why a reservation is being given back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The signup is rejected and kept as a ban
    Rejected,
    /// The signup is removed entirely
    Cancelled,
    /// An unconfirmed anonymous signup outlived its token
    Expired,
}

#[derive(Clone)]
pub struct CapacityLedger {
    store: Arc<dyn VolunteerStore>,
}

impl CapacityLedger {
    pub fn new(store: Arc<dyn VolunteerStore>) -> Self {
        Self { store }
    }

    /// Atomically reserve capacity and record the signup
    pub async fn admit(&self, signup: NewSignup, capacity: i32) -> Result<Signup> {
        let project_id = signup.project_id;
        let schedule_id = signup.schedule_id.clone();

        let result = self.store.insert_signup(signup, capacity).await;
        Self::log_outcome(project_id, &schedule_id, capacity, &result);
        result
    }

    /// Atomically reserve capacity and record an anonymous signup pair
    pub async fn admit_anonymous(
        &self,
        signup: NewSignup,
        anonymous: NewAnonymousSignup,
        capacity: i32,
    ) -> Result<(Signup, AnonymousSignup)> {
        let project_id = signup.project_id;
        let schedule_id = signup.schedule_id.clone();

        let result = self.store.insert_anonymous_signup(signup, anonymous, capacity).await;
        Self::log_outcome(project_id, &schedule_id, capacity, &result);
        result
    }

    /// Re-acquire capacity for a rejected signup
    pub async fn readmit(&self, signup_id: Uuid, capacity: i32) -> Result<Option<Signup>> {
        let result = self.store.readmit_signup(signup_id, capacity).await;
        if let Err(VolunteerHubError::CapacityExceeded { schedule_id }) = &result {
            debug!(signup_id = %signup_id, schedule_id = %schedule_id, "Readmission refused: slot full");
        }
        result
    }

    /// Give back the reservation held by a signup
    pub async fn release(&self, signup_id: Uuid, reason: ReleaseReason) -> Result<Option<Signup>> {
        let released = match reason {
            ReleaseReason::Rejected => self.store.reject_signup(signup_id).await?,
            ReleaseReason::Cancelled => {
                self.store
                    .delete_signup(signup_id, &[SignupStatus::Pending, SignupStatus::Approved])
                    .await?
            }
            ReleaseReason::Expired => self.store.delete_signup(signup_id, &[SignupStatus::Pending]).await?,
        };

        if let Some(signup) = &released {
            debug!(signup_id = %signup_id, schedule_id = %signup.schedule_id, reason = ?reason, "Reservation released");
        }
        Ok(released)
    }

    /// Reservations currently held on a slot, pending anonymous signups included
    pub async fn current_count(&self, project_id: Uuid, schedule_id: &str) -> Result<i64> {
        self.store.reserved_count(project_id, schedule_id).await
    }

    /// Approved and attended signups on a slot
    pub async fn committed_count(&self, project_id: Uuid, schedule_id: &str) -> Result<i64> {
        let committed = self
            .store
            .list_signups(project_id, Some(schedule_id), &[SignupStatus::Approved, SignupStatus::Attended])
            .await?;
        Ok(committed.len() as i64)
    }

    fn log_outcome<T>(project_id: Uuid, schedule_id: &str, capacity: i32, result: &Result<T>) {
        match result {
            Ok(_) => log_admission(project_id, schedule_id, true, capacity),
            Err(VolunteerHubError::CapacityExceeded { .. }) => log_admission(project_id, schedule_id, false, capacity),
            Err(_) => {}
        }
    }
}
