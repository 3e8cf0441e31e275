//! Error handling for VolunteerHub
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for VolunteerHub application
#[derive(Error, Debug)]
pub enum VolunteerHubError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Mail delivery error: {0}")]
    Mail(#[from] MailError),

    #[error("Calendar sync error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: Uuid },

    #[error("Signup not found: {signup_id}")]
    SignupNotFound { signup_id: Uuid },

    #[error("Slot not found: {schedule_id}")]
    SlotNotFound { schedule_id: String },

    #[error("Invalid confirmation token")]
    InvalidToken,

    #[error("Confirmation token expired")]
    TokenExpired,

    #[error("Capacity exceeded for slot {schedule_id}")]
    CapacityExceeded { schedule_id: String },

    #[error("Project is not accepting signups (status: {status})")]
    ProjectNotAcceptingSignups { status: String },

    #[error("Signups are paused for this project")]
    PauseActive,

    #[error("Slot {schedule_id} has already ended")]
    SlotTimeElapsed { schedule_id: String },

    #[error("This project requires an account to sign up")]
    LoginRequired,

    #[error("Email domain not allowed for this project: {domain}")]
    DomainNotAllowed { domain: String },

    #[error("Email belongs to a registered account: {email}")]
    EmailBelongsToAccount { email: String },

    #[error("Signup for slot {schedule_id} was rejected and cannot be repeated")]
    AlreadyRejectedBanned { schedule_id: String },

    #[error("Signup has already been confirmed")]
    AlreadyConfirmed,

    #[error("Already signed up for slot {schedule_id}")]
    DuplicateActiveSignup { schedule_id: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Project can no longer be cancelled: {0}")]
    CancellationWindowClosed(String),

    #[error("Data integrity violation: {0}")]
    Integrity(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Mail relay specific errors
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    RequestFailed(String),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}

/// Calendar sync specific errors
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar API error: {0}")]
    ApiError(String),

    #[error("Calendar event not found: {0}")]
    EventNotFound(String),
}

/// Result type alias for VolunteerHub operations
pub type Result<T> = std::result::Result<T, VolunteerHubError>;

/// Result type alias for mail operations
pub type MailResult<T> = std::result::Result<T, MailError>;

/// Result type alias for calendar operations
pub type CalendarResult<T> = std::result::Result<T, CalendarError>;

/// How callers are expected to treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input or unknown entity; returned to the caller, never retried
    Validation,
    /// Slot full, project closed, slot elapsed; surfaced verbatim, never auto-retried
    Admission,
    /// Terminal conflicts requiring human resolution
    StateConflict,
    /// Caller lacks the required role
    Authorization,
    /// Email or calendar failures; recovered locally
    Dependency,
    /// Broken invariant in stored data
    Integrity,
    /// Storage, configuration or runtime failures
    Infrastructure,
}

impl VolunteerHubError {
    /// Map the error onto the handling taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            VolunteerHubError::ProjectNotFound { .. }
            | VolunteerHubError::SignupNotFound { .. }
            | VolunteerHubError::SlotNotFound { .. }
            | VolunteerHubError::InvalidToken
            | VolunteerHubError::TokenExpired
            | VolunteerHubError::InvalidInput(_) => ErrorCategory::Validation,
            VolunteerHubError::CapacityExceeded { .. }
            | VolunteerHubError::ProjectNotAcceptingSignups { .. }
            | VolunteerHubError::PauseActive
            | VolunteerHubError::SlotTimeElapsed { .. }
            | VolunteerHubError::LoginRequired
            | VolunteerHubError::DomainNotAllowed { .. }
            | VolunteerHubError::EmailBelongsToAccount { .. } => ErrorCategory::Admission,
            VolunteerHubError::AlreadyRejectedBanned { .. }
            | VolunteerHubError::AlreadyConfirmed
            | VolunteerHubError::DuplicateActiveSignup { .. }
            | VolunteerHubError::InvalidStateTransition { .. }
            | VolunteerHubError::CancellationWindowClosed(_) => ErrorCategory::StateConflict,
            VolunteerHubError::PermissionDenied(_) => ErrorCategory::Authorization,
            VolunteerHubError::Mail(_) | VolunteerHubError::Calendar(_) => ErrorCategory::Dependency,
            VolunteerHubError::Integrity(_) => ErrorCategory::Integrity,
            VolunteerHubError::Database(_)
            | VolunteerHubError::Migration(_)
            | VolunteerHubError::Config(_)
            | VolunteerHubError::Http(_)
            | VolunteerHubError::Serialization(_)
            | VolunteerHubError::Io(_)
            | VolunteerHubError::UrlParse(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::Dependency => true,
            ErrorCategory::Infrastructure => matches!(
                self,
                VolunteerHubError::Http(_) | VolunteerHubError::Io(_)
            ),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Integrity => ErrorSeverity::Critical,
            ErrorCategory::Infrastructure => match self {
                VolunteerHubError::Http(_) | VolunteerHubError::Io(_) => ErrorSeverity::Error,
                _ => ErrorSeverity::Critical,
            },
            ErrorCategory::Authorization => ErrorSeverity::Warning,
            ErrorCategory::Dependency => ErrorSeverity::Warning,
            ErrorCategory::Validation
            | ErrorCategory::Admission
            | ErrorCategory::StateConflict => ErrorSeverity::Info,
        }
    }

    /// Message shown to the person who triggered the failure
    pub fn user_message(&self) -> String {
        match self {
            VolunteerHubError::CapacityExceeded { .. } => {
                "This slot just filled up. Please pick another slot.".to_string()
            }
            VolunteerHubError::ProjectNotAcceptingSignups { status } => {
                format!("This project is {} and is not accepting signups.", status)
            }
            VolunteerHubError::PauseActive => {
                "The organizer has paused signups for this project.".to_string()
            }
            VolunteerHubError::SlotTimeElapsed { .. } => {
                "This slot has already ended.".to_string()
            }
            VolunteerHubError::LoginRequired => {
                "Please log in to sign up for this project.".to_string()
            }
            VolunteerHubError::DomainNotAllowed { .. } => {
                "This project is limited to members of specific organizations.".to_string()
            }
            VolunteerHubError::EmailBelongsToAccount { .. } => {
                "An account already uses this email. Please log in instead.".to_string()
            }
            VolunteerHubError::AlreadyRejectedBanned { .. } => {
                "Your signup for this slot was declined by the organizer.".to_string()
            }
            VolunteerHubError::AlreadyConfirmed => {
                "This signup has already been confirmed.".to_string()
            }
            VolunteerHubError::DuplicateActiveSignup { .. } => {
                "You are already signed up for this slot.".to_string()
            }
            VolunteerHubError::InvalidToken => "This confirmation link is not valid.".to_string(),
            VolunteerHubError::TokenExpired => {
                "This confirmation link has expired. Please sign up again.".to_string()
            }
            VolunteerHubError::SlotNotFound { .. } => "This slot does not exist.".to_string(),
            VolunteerHubError::ProjectNotFound { .. } => "This project does not exist.".to_string(),
            VolunteerHubError::PermissionDenied(_) => {
                "You are not allowed to perform this action.".to_string()
            }
            VolunteerHubError::CancellationWindowClosed(_) => {
                "This project starts too soon to be cancelled.".to_string()
            }
            VolunteerHubError::InvalidInput(reason) => reason.clone(),
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_errors_are_not_retried() {
        let err = VolunteerHubError::CapacityExceeded { schedule_id: "oneTime".to_string() };
        assert_eq!(err.category(), ErrorCategory::Admission);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_user_messages_distinguish_conflicts() {
        let full = VolunteerHubError::CapacityExceeded { schedule_id: "a".to_string() }.user_message();
        let banned = VolunteerHubError::AlreadyRejectedBanned { schedule_id: "a".to_string() }.user_message();
        let duplicate = VolunteerHubError::DuplicateActiveSignup { schedule_id: "a".to_string() }.user_message();

        assert_ne!(full, banned);
        assert_ne!(banned, duplicate);
        assert_ne!(full, duplicate);
    }

    #[test]
    fn test_integrity_is_critical() {
        let err = VolunteerHubError::Integrity("orphaned anonymous signup".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Integrity);
    }

    #[test]
    fn test_dependency_failures_are_recoverable() {
        let err: VolunteerHubError = MailError::Rejected(503).into();
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }
}
