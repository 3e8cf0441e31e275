//! Authorization service implementation
//!
//! Identity and sessions live outside this crate. The service consults an
//! [`IdentityProvider`] for verified emails and organization admins and
//! combines that with the configured staff list and project ownership.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::config::AuthConfig;
use crate::models::{Project, SignupIdentity};
use crate::utils::errors::{Result, VolunteerHubError};
use crate::utils::helpers::{domain_allowed, email_domain, normalize_email};

/// Source of identity facts about registered users
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Emails the user has verified, primary first
    async fn verified_emails(&self, user_id: Uuid) -> Result<Vec<String>>;

    /// Whether the user administers the organization
    async fn is_org_admin(&self, user_id: Uuid) -> Result<bool>;
}

/// Identity provider backed by an in-process table
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    emails: RwLock<HashMap<Uuid, Vec<String>>>,
    admins: RwLock<HashSet<Uuid>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: Uuid, emails: Vec<String>) {
        let emails = emails.iter().map(|email| normalize_email(email)).collect();
        self.emails.write().await.insert(user_id, emails);
    }

    pub async fn add_admin(&self, user_id: Uuid) {
        self.admins.write().await.insert(user_id);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verified_emails(&self, user_id: Uuid) -> Result<Vec<String>> {
        Ok(self.emails.read().await.get(&user_id).cloned().unwrap_or_default())
    }

    async fn is_org_admin(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.admins.read().await.contains(&user_id))
    }
}

/// Authorization decisions for signup and project management
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    staff_user_ids: HashSet<Uuid>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn IdentityProvider>, config: &AuthConfig) -> Self {
        Self {
            provider,
            staff_user_ids: config.staff_user_ids.iter().copied().collect(),
        }
    }

    /// Check if user is configured staff
    pub fn is_staff(&self, user_id: Uuid) -> bool {
        self.staff_user_ids.contains(&user_id)
    }

    /// Project creator, staff and organization admins may manage a project
    pub async fn is_project_manager(&self, user_id: Uuid, project: &Project) -> Result<bool> {
        if project.created_by == user_id || self.is_staff(user_id) {
            return Ok(true);
        }
        self.provider.is_org_admin(user_id).await
    }

    /// Fail with `PermissionDenied` unless the user may manage the project
    pub async fn require_manager(&self, user_id: Uuid, project: &Project) -> Result<()> {
        if self.is_project_manager(user_id, project).await? {
            return Ok(());
        }

        warn!(user_id = %user_id, project_id = %project.id, "Manager permission denied");
        Err(VolunteerHubError::PermissionDenied(format!(
            "User {} cannot manage project {}",
            user_id, project.id
        )))
    }

    /// Verified emails of a registered user
    pub async fn verified_emails(&self, user_id: Uuid) -> Result<Vec<String>> {
        self.provider.verified_emails(user_id).await
    }

    /// Check the project's domain restriction against the user's verified emails
    pub async fn check_domain(&self, user_id: Uuid, project: &Project) -> Result<()> {
        if !project.restrict_to_org_domains {
            return Ok(());
        }

        let emails = self.verified_emails(user_id).await?;
        if emails.iter().any(|email| domain_allowed(email, &project.allowed_domains)) {
            debug!(user_id = %user_id, project_id = %project.id, "Domain restriction passed");
            return Ok(());
        }

        let domain = emails
            .first()
            .and_then(|email| email_domain(email))
            .unwrap_or_else(|| "none".to_string());
        Err(VolunteerHubError::DomainNotAllowed { domain })
    }

    /// Address to notify for a signup identity, if one is known
    pub async fn contact_email(&self, identity: &SignupIdentity) -> Result<Option<String>> {
        match identity {
            SignupIdentity::Anonymous { email, .. } => Ok(Some(email.clone())),
            SignupIdentity::User { user_id } => Ok(self.verified_emails(*user_id).await?.into_iter().next()),
        }
    }
}
