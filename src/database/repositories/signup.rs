//! Signup repository implementation

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use super::reservation;
use crate::database::store::TokenRedemption;
use crate::models::signup::{
    AnonymousSignup, IdentityKey, NewAnonymousSignup, NewSignup, Signup, SignupIdentity, SignupRow, SignupStatus,
};
use crate::utils::errors::VolunteerHubError;
use crate::utils::helpers::{constant_time_eq, normalize_email};

const SIGNUP_COLUMNS: &str =
    "id, project_id, schedule_id, user_id, anonymous_signup_id, anonymous_email, status, check_in_time, created_at, updated_at";

const ANONYMOUS_COLUMNS: &str = "id, project_id, signup_id, email, name, phone, token, confirmed_at, created_at";
const ANONYMOUS_SELECT_COLUMNS: &str =
    "a.id, a.project_id, a.signup_id, a.email, a.name, a.phone, a.token, a.confirmed_at, a.created_at";

fn status_strings(statuses: &[SignupStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Map a unique-index violation on insert to the duplicate-signup conflict
fn map_insert_error(error: sqlx::Error, schedule_id: &str) -> VolunteerHubError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            VolunteerHubError::DuplicateActiveSignup { schedule_id: schedule_id.to_string() }
        }
        _ => VolunteerHubError::Database(error),
    }
}

#[derive(Debug, Clone)]
pub struct SignupRepository {
    pool: PgPool,
}

impl SignupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(conn: &mut PgConnection, signup: &NewSignup) -> Result<Signup, VolunteerHubError> {
        let (user_id, anonymous_signup_id, anonymous_email) = match &signup.identity {
            SignupIdentity::User { user_id } => (Some(*user_id), None, None),
            SignupIdentity::Anonymous { anonymous_signup_id, email } => {
                (None, Some(*anonymous_signup_id), Some(normalize_email(email)))
            }
        };

        let row = sqlx::query_as::<_, SignupRow>(&format!(
            r#"
            INSERT INTO signups (id, project_id, schedule_id, user_id, anonymous_signup_id, anonymous_email, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            SIGNUP_COLUMNS
        ))
        .bind(signup.id)
        .bind(signup.project_id)
        .bind(&signup.schedule_id)
        .bind(user_id)
        .bind(anonymous_signup_id)
        .bind(anonymous_email)
        .bind(signup.status.as_str())
        .bind(signup.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_insert_error(e, &signup.schedule_id))?;

        Signup::try_from(row)
    }

    /// Find signup by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Signup>, VolunteerHubError> {
        let row = sqlx::query_as::<_, SignupRow>(&format!("SELECT {} FROM signups WHERE id = $1", SIGNUP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Signup::try_from).transpose()
    }

    /// List signups of a project, optionally for one slot and a set of statuses
    pub async fn list(&self, project_id: Uuid, schedule_id: Option<&str>, statuses: &[SignupStatus]) -> Result<Vec<Signup>, VolunteerHubError> {
        let rows = sqlx::query_as::<_, SignupRow>(&format!(
            r#"
            SELECT {}
            FROM signups
            WHERE project_id = $1
              AND ($2::TEXT IS NULL OR schedule_id = $2)
              AND (cardinality($3::TEXT[]) = 0 OR status = ANY($3))
            ORDER BY created_at ASC, id ASC
            "#,
            SIGNUP_COLUMNS
        ))
        .bind(project_id)
        .bind(schedule_id)
        .bind(status_strings(statuses))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Signup::try_from).collect()
    }

    /// Find the record an identity holds for a slot
    pub async fn find_for_identity(&self, project_id: Uuid, schedule_id: &str, identity: &IdentityKey) -> Result<Option<Signup>, VolunteerHubError> {
        let query = match identity {
            IdentityKey::User(_) => format!(
                "SELECT {} FROM signups WHERE project_id = $1 AND schedule_id = $2 AND user_id = $3",
                SIGNUP_COLUMNS
            ),
            IdentityKey::Email(_) => format!(
                "SELECT {} FROM signups WHERE project_id = $1 AND schedule_id = $2 AND anonymous_email = $3",
                SIGNUP_COLUMNS
            ),
        };

        let query = sqlx::query_as::<_, SignupRow>(&query)
            .bind(project_id)
            .bind(schedule_id);
        let query = match identity {
            IdentityKey::User(user_id) => query.bind(*user_id),
            IdentityKey::Email(email) => query.bind(normalize_email(email)),
        };

        let row = query.fetch_optional(&self.pool).await?;
        row.map(Signup::try_from).transpose()
    }

    /// Reserve capacity and insert a signup in one transaction
    pub async fn insert_admitted(&self, signup: NewSignup, capacity: i32) -> Result<Signup, VolunteerHubError> {
        let mut tx = self.pool.begin().await?;

        if signup.status.holds_reservation() {
            reservation::reserve(&mut tx, signup.project_id, &signup.schedule_id, capacity).await?;
        }
        let stored = Self::insert_row(&mut tx, &signup).await?;

        tx.commit().await?;
        Ok(stored)
    }

    /// Reserve capacity and insert an anonymous signup pair in one transaction
    pub async fn insert_anonymous_admitted(
        &self,
        signup: NewSignup,
        anonymous: NewAnonymousSignup,
        capacity: i32,
    ) -> Result<(Signup, AnonymousSignup), VolunteerHubError> {
        let mut tx = self.pool.begin().await?;

        reservation::reserve(&mut tx, signup.project_id, &signup.schedule_id, capacity).await?;
        let stored = Self::insert_row(&mut tx, &signup).await?;

        let anonymous = sqlx::query_as::<_, AnonymousSignup>(&format!(
            r#"
            INSERT INTO anonymous_signups (id, project_id, signup_id, email, name, phone, token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ANONYMOUS_COLUMNS
        ))
        .bind(anonymous.id)
        .bind(signup.project_id)
        .bind(signup.id)
        .bind(normalize_email(&anonymous.email))
        .bind(&anonymous.name)
        .bind(&anonymous.phone)
        .bind(&anonymous.token)
        .bind(signup.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((stored, anonymous))
    }

    /// Conditionally update a signup's status
    pub async fn update_status(
        &self,
        id: Uuid,
        from: &[SignupStatus],
        status: SignupStatus,
        check_in_time: Option<DateTime<Utc>>,
    ) -> Result<Option<Signup>, VolunteerHubError> {
        if let Some(source) = from.iter().find(|s| s.holds_reservation() != status.holds_reservation()) {
            return Err(VolunteerHubError::InvalidStateTransition {
                from: source.to_string(),
                to: status.to_string(),
            });
        }

        let row = sqlx::query_as::<_, SignupRow>(&format!(
            r#"
            UPDATE signups
            SET status = $3, check_in_time = COALESCE($4, check_in_time), updated_at = $5
            WHERE id = $1 AND status = ANY($2)
            RETURNING {}
            "#,
            SIGNUP_COLUMNS
        ))
        .bind(id)
        .bind(status_strings(from))
        .bind(status.as_str())
        .bind(check_in_time)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Signup::try_from).transpose()
    }

    /// Reject an active signup and release its reservation
    pub async fn reject(&self, id: Uuid) -> Result<Option<Signup>, VolunteerHubError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SignupRow>(&format!(
            r#"
            UPDATE signups
            SET status = 'rejected', updated_at = $2
            WHERE id = $1 AND status IN ('pending', 'approved')
            RETURNING {}
            "#,
            SIGNUP_COLUMNS
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let signup = Signup::try_from(row)?;
        reservation::release(&mut tx, signup.project_id, &signup.schedule_id).await?;

        tx.commit().await?;
        Ok(Some(signup))
    }

    /// Re-acquire capacity for a rejected signup. It returns to `approved`, or to
    /// `pending` when it is anonymous and its token was never redeemed.
    pub async fn readmit(&self, id: Uuid, capacity: i32) -> Result<Option<Signup>, VolunteerHubError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, SignupRow>(&format!(
            "SELECT {} FROM signups WHERE id = $1 AND status = 'rejected' FOR UPDATE",
            SIGNUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(None);
        };
        reservation::reserve(&mut tx, current.project_id, &current.schedule_id, capacity).await?;

        let row = sqlx::query_as::<_, SignupRow>(&format!(
            "UPDATE signups SET status = CASE WHEN EXISTS ( \
                 SELECT 1 FROM anonymous_signups WHERE signup_id = $1 AND confirmed_at IS NULL \
             ) THEN 'pending' ELSE 'approved' END, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            SIGNUP_COLUMNS
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Signup::try_from(row).map(Some)
    }

    /// Delete a signup in one of the given statuses and release its reservation
    pub async fn delete(&self, id: Uuid, from: &[SignupStatus]) -> Result<Option<Signup>, VolunteerHubError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SignupRow>(&format!(
            "DELETE FROM signups WHERE id = $1 AND status = ANY($2) RETURNING {}",
            SIGNUP_COLUMNS
        ))
        .bind(id)
        .bind(status_strings(from))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let signup = Signup::try_from(row)?;
        if signup.status.holds_reservation() {
            reservation::release(&mut tx, signup.project_id, &signup.schedule_id).await?;
        }

        tx.commit().await?;
        Ok(Some(signup))
    }

    /// Find anonymous signup by ID
    pub async fn find_anonymous(&self, id: Uuid) -> Result<Option<AnonymousSignup>, VolunteerHubError> {
        let anonymous = sqlx::query_as::<_, AnonymousSignup>(&format!(
            "SELECT {} FROM anonymous_signups WHERE id = $1",
            ANONYMOUS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(anonymous)
    }

    /// Find the anonymous details linked to a signup
    pub async fn find_anonymous_for_signup(&self, signup_id: Uuid) -> Result<Option<AnonymousSignup>, VolunteerHubError> {
        let anonymous = sqlx::query_as::<_, AnonymousSignup>(&format!(
            "SELECT {} FROM anonymous_signups WHERE signup_id = $1",
            ANONYMOUS_COLUMNS
        ))
        .bind(signup_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(anonymous)
    }

    /// Redeem a confirmation token and approve the linked signup
    pub async fn redeem_token(&self, id: Uuid, token: &str, confirmed_at: DateTime<Utc>) -> Result<TokenRedemption, VolunteerHubError> {
        let mut tx = self.pool.begin().await?;

        let anonymous = sqlx::query_as::<_, AnonymousSignup>(&format!(
            "SELECT {} FROM anonymous_signups WHERE id = $1 FOR UPDATE",
            ANONYMOUS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(anonymous) = anonymous else {
            return Ok(TokenRedemption::Invalid);
        };
        if !constant_time_eq(&anonymous.token, token) {
            return Ok(TokenRedemption::Invalid);
        }
        if anonymous.confirmed_at.is_some() {
            return Ok(TokenRedemption::AlreadyConfirmed);
        }

        let promoted = sqlx::query_as::<_, SignupRow>(&format!(
            r#"
            UPDATE signups
            SET status = 'approved', updated_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            SIGNUP_COLUMNS
        ))
        .bind(anonymous.signup_id)
        .bind(confirmed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(promoted) = promoted else {
            let status: Option<(String,)> = sqlx::query_as("SELECT status FROM signups WHERE id = $1")
                .bind(anonymous.signup_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match status {
                Some((status,)) => VolunteerHubError::InvalidStateTransition {
                    from: status,
                    to: SignupStatus::Approved.to_string(),
                },
                None => VolunteerHubError::Integrity(format!("Anonymous signup {} has no linked signup", id)),
            });
        };

        let confirmed = sqlx::query_as::<_, AnonymousSignup>(&format!(
            "UPDATE anonymous_signups SET confirmed_at = $2 WHERE id = $1 AND confirmed_at IS NULL RETURNING {}",
            ANONYMOUS_COLUMNS
        ))
        .bind(id)
        .bind(confirmed_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(TokenRedemption::Confirmed {
            anonymous: confirmed,
            signup: Signup::try_from(promoted)?,
        })
    }

    /// Unconfirmed anonymous signups created before the cutoff whose signup is still pending
    pub async fn list_stale_anonymous(&self, created_before: DateTime<Utc>) -> Result<Vec<AnonymousSignup>, VolunteerHubError> {
        let stale = sqlx::query_as::<_, AnonymousSignup>(&format!(
            "SELECT {} FROM anonymous_signups a \
             JOIN signups s ON s.id = a.signup_id AND s.status = 'pending' \
             WHERE a.confirmed_at IS NULL AND a.created_at < $1 \
             ORDER BY a.created_at ASC, a.id ASC",
            ANONYMOUS_SELECT_COLUMNS
        ))
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(stale)
    }

    /// Current reservation count of a slot
    pub async fn reserved_count(&self, project_id: Uuid, schedule_id: &str) -> Result<i64, VolunteerHubError> {
        reservation::reserved_count(&self.pool, project_id, schedule_id).await
    }
}
