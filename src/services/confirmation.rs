//! Anonymous signup confirmation
//!
//! Tokens are random, single-use and bound to one anonymous signup row. The
//! confirmation link carries `(id, token)`; verification always re-reads the
//! row and compares the token server-side.

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;
use crate::config::SignupConfig;
use crate::database::{TokenRedemption, VolunteerStore};
use crate::models::{AnonymousSignup, Signup, SignupStatus};
use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::helpers::{constant_time_eq, generate_token};
use crate::utils::logging::{log_integrity_violation, log_signup_transition};

const ID_PARAM: &str = "id";
const TOKEN_PARAM: &str = "token";

#[derive(Clone)]
pub struct ConfirmationService {
    store: Arc<dyn VolunteerStore>,
    base_url: String,
    token_length: usize,
    token_ttl: Duration,
}

impl ConfirmationService {
    pub fn new(store: Arc<dyn VolunteerStore>, config: &SignupConfig) -> Self {
        Self {
            store,
            base_url: config.confirmation_base_url.clone(),
            token_length: config.token_length,
            token_ttl: Duration::hours(config.anonymous_token_ttl_hours),
        }
    }

    /// Fresh random confirmation token
    pub fn issue_token(&self) -> String {
        generate_token(self.token_length)
    }

    /// Link that confirms an anonymous signup
    pub fn confirmation_url(&self, anonymous_signup_id: Uuid, token: &str) -> Result<String> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair(ID_PARAM, &anonymous_signup_id.to_string())
            .append_pair(TOKEN_PARAM, token);
        Ok(url.to_string())
    }

    /// Extract `(anonymous_signup_id, token)` from a confirmation link
    pub fn parse_confirmation_url(confirmation_url: &str) -> Result<(Uuid, String)> {
        let url = Url::parse(confirmation_url).map_err(|_| VolunteerHubError::InvalidToken)?;

        let mut id = None;
        let mut token = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                ID_PARAM => id = Uuid::parse_str(&value).ok(),
                TOKEN_PARAM => token = Some(value.into_owned()),
                _ => {}
            }
        }

        match (id, token) {
            (Some(id), Some(token)) if !token.is_empty() => Ok((id, token)),
            _ => Err(VolunteerHubError::InvalidToken),
        }
    }

    /// Reject anonymous signups for an email that belongs to a registered account
    pub async fn check_email_collision(&self, email: &str) -> Result<()> {
        if self.store.account_email_exists(email).await? {
            debug!(email = %email, "Anonymous signup refused: email has an account");
            return Err(VolunteerHubError::EmailBelongsToAccount { email: email.to_string() });
        }
        Ok(())
    }

    /// Whether an unconfirmed signup's token has outlived its TTL
    pub fn is_expired(&self, anonymous: &AnonymousSignup, now: DateTime<Utc>) -> bool {
        anonymous.confirmed_at.is_none() && now - anonymous.created_at > self.token_ttl
    }

    /// Creation time before which unconfirmed signups are stale
    pub fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.token_ttl
    }

    /// Verify a token against the stored row and approve the linked signup.
    ///
    /// A token is redeemed at most once; redeeming it again fails with
    /// `AlreadyConfirmed` and changes nothing.
    pub async fn confirm(&self, anonymous_signup_id: Uuid, token: &str, now: DateTime<Utc>) -> Result<(AnonymousSignup, Signup)> {
        let anonymous = self
            .store
            .get_anonymous_signup(anonymous_signup_id)
            .await?
            .ok_or(VolunteerHubError::InvalidToken)?;

        if !constant_time_eq(&anonymous.token, token) {
            warn!(anonymous_signup_id = %anonymous_signup_id, "Confirmation token mismatch");
            return Err(VolunteerHubError::InvalidToken);
        }
        if anonymous.confirmed_at.is_some() {
            return Err(VolunteerHubError::AlreadyConfirmed);
        }
        if self.is_expired(&anonymous, now) {
            info!(anonymous_signup_id = %anonymous_signup_id, "Confirmation token expired");
            return Err(VolunteerHubError::TokenExpired);
        }

        let redemption = self.store.redeem_anonymous_token(anonymous_signup_id, token, now).await;
        match redemption {
            Ok(TokenRedemption::Confirmed { anonymous, signup }) => {
                log_signup_transition(signup.id, &signup.schedule_id, SignupStatus::Pending.as_str(), signup.status.as_str());
                Ok((anonymous, signup))
            }
            Ok(TokenRedemption::AlreadyConfirmed) => Err(VolunteerHubError::AlreadyConfirmed),
            Ok(TokenRedemption::Invalid) => Err(VolunteerHubError::InvalidToken),
            Err(VolunteerHubError::Integrity(detail)) => {
                log_integrity_violation(&detail, Some(anonymous.project_id));
                Err(VolunteerHubError::Integrity(detail))
            }
            Err(e) => Err(e),
        }
    }
}
