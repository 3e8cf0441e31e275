//! Account repository implementation

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use crate::utils::errors::VolunteerHubError;
use crate::utils::helpers::normalize_email;

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register an account email
    pub async fn create(&self, email: &str) -> Result<Uuid, VolunteerHubError> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO accounts (id, email, created_at) VALUES ($1, $2, $3) RETURNING id"
        )
        .bind(Uuid::new_v4())
        .bind(normalize_email(email))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Check whether an account uses this email
    pub async fn email_exists(&self, email: &str) -> Result<bool, VolunteerHubError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE LOWER(email) = $1)"
        )
        .bind(normalize_email(email))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
