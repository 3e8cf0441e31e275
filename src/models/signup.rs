//! Signup models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::helpers::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStatus {
    Pending,
    Approved,
    Rejected,
    Attended,
}

impl SignupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupStatus::Pending => "pending",
            SignupStatus::Approved => "approved",
            SignupStatus::Rejected => "rejected",
            SignupStatus::Attended => "attended",
        }
    }

    /// Pending and approved records are active
    pub fn is_active(&self) -> bool {
        matches!(self, SignupStatus::Pending | SignupStatus::Approved)
    }

    /// Whether a record in this status occupies a unit of slot capacity.
    ///
    /// Pending records only exist for anonymous signups, which reserve optimistically.
    pub fn holds_reservation(&self) -> bool {
        !matches!(self, SignupStatus::Rejected)
    }

    /// Statuses counted as committed for display purposes
    pub fn is_committed(&self) -> bool {
        matches!(self, SignupStatus::Approved | SignupStatus::Attended)
    }
}

impl std::fmt::Display for SignupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignupStatus {
    type Err = VolunteerHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SignupStatus::Pending),
            "approved" => Ok(SignupStatus::Approved),
            "rejected" => Ok(SignupStatus::Rejected),
            "attended" => Ok(SignupStatus::Attended),
            other => Err(VolunteerHubError::Integrity(format!("Unknown signup status: {}", other))),
        }
    }
}

/// Who a signup belongs to. A signup is either a registered user's or an anonymous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignupIdentity {
    User { user_id: Uuid },
    Anonymous { anonymous_signup_id: Uuid, email: String },
}

/// Key used to enforce one record per (project, schedule, identity)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    User(Uuid),
    Email(String),
}

impl IdentityKey {
    pub fn email(email: &str) -> Self {
        IdentityKey::Email(normalize_email(email))
    }
}

impl SignupIdentity {
    pub fn key(&self) -> IdentityKey {
        match self {
            SignupIdentity::User { user_id } => IdentityKey::User(*user_id),
            SignupIdentity::Anonymous { email, .. } => IdentityKey::email(email),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            SignupIdentity::User { user_id } => Some(*user_id),
            SignupIdentity::Anonymous { .. } => None,
        }
    }

    pub fn anonymous_signup_id(&self) -> Option<Uuid> {
        match self {
            SignupIdentity::User { .. } => None,
            SignupIdentity::Anonymous { anonymous_signup_id, .. } => Some(*anonymous_signup_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub id: Uuid,
    pub project_id: Uuid,
    pub schedule_id: String,
    pub identity: SignupIdentity,
    pub status: SignupStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `signups` table
#[derive(Debug, Clone, FromRow)]
pub struct SignupRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub schedule_id: String,
    pub user_id: Option<Uuid>,
    pub anonymous_signup_id: Option<Uuid>,
    pub anonymous_email: Option<String>,
    pub status: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SignupRow> for Signup {
    type Error = VolunteerHubError;

    fn try_from(row: SignupRow) -> Result<Self> {
        let identity = match (row.user_id, row.anonymous_signup_id, row.anonymous_email) {
            (Some(user_id), None, None) => SignupIdentity::User { user_id },
            (None, Some(anonymous_signup_id), Some(email)) => SignupIdentity::Anonymous { anonymous_signup_id, email },
            _ => {
                return Err(VolunteerHubError::Integrity(format!(
                    "Signup {} has an ambiguous identity",
                    row.id
                )))
            }
        };

        Ok(Signup {
            id: row.id,
            project_id: row.project_id,
            schedule_id: row.schedule_id,
            identity,
            status: row.status.parse()?,
            check_in_time: row.check_in_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnonymousSignup {
    pub id: Uuid,
    pub project_id: Uuid,
    pub signup_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub token: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Contact details an anonymous volunteer provides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymousDetails {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

/// A signup record ready to be written
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub id: Uuid,
    pub project_id: Uuid,
    pub schedule_id: String,
    pub identity: SignupIdentity,
    pub status: SignupStatus,
    pub created_at: DateTime<Utc>,
}

/// The anonymous half of an anonymous signup, written together with its [`NewSignup`]
#[derive(Debug, Clone)]
pub struct NewAnonymousSignup {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub token: String,
}

/// The person a new signup is for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Applicant {
    User { user_id: Uuid },
    Anonymous(AnonymousDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSignupRequest {
    pub project_id: Uuid,
    pub schedule_id: String,
    pub applicant: Applicant,
}

/// Who is asking for a signup operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated user
    User(Uuid),
    /// Someone holding an anonymous signup's confirmation link
    AnonymousHolder { anonymous_signup_id: Uuid, token: String },
}

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::User(user_id) => Some(*user_id),
            Actor::AnonymousHolder { .. } => None,
        }
    }
}

/// Advisory per-slot counts for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub schedule_id: String,
    pub capacity: i32,
    pub reserved: i64,
    pub committed: i64,
    pub remaining: i64,
    pub elapsed: bool,
}
