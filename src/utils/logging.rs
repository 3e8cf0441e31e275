//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the VolunteerHub application.

use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;
use crate::config::LoggingConfig;
use crate::utils::errors::{Result, VolunteerHubError};

/// Initialize logging based on configuration
///
/// The returned guard must be held for the lifetime of the process so the
/// file appender flushes on shutdown.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "volunteerhub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(stdout_layer)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| VolunteerHubError::Config(format!("Failed to install subscriber: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log a signup state transition
pub fn log_signup_transition(signup_id: Uuid, schedule_id: &str, from: &str, to: &str) {
    info!(
        signup_id = %signup_id,
        schedule_id = schedule_id,
        from = from,
        to = to,
        "Signup transitioned"
    );
}

/// Log an admission decision
pub fn log_admission(project_id: Uuid, schedule_id: &str, admitted: bool, capacity: i32) {
    if admitted {
        debug!(
            project_id = %project_id,
            schedule_id = schedule_id,
            capacity = capacity,
            "Admission granted"
        );
    } else {
        info!(
            project_id = %project_id,
            schedule_id = schedule_id,
            capacity = capacity,
            "Admission refused: slot full"
        );
    }
}

/// Log a reconciliation write-back
pub fn log_reconciliation(project_id: Uuid, stored: &str, derived: &str, written: bool) {
    if written {
        info!(
            project_id = %project_id,
            stored = stored,
            derived = derived,
            "Project status reconciled"
        );
    } else {
        debug!(
            project_id = %project_id,
            stored = stored,
            derived = derived,
            "Project status changed concurrently, skipped"
        );
    }
}

/// Log a failed call to an external collaborator
pub fn log_dependency_failure(collaborator: &str, error: &str, context: Option<&str>) {
    warn!(
        collaborator = collaborator,
        error = error,
        context = context,
        "Collaborator call failed"
    );
}

/// Log a broken data invariant
pub fn log_integrity_violation(detail: &str, project_id: Option<Uuid>) {
    error!(
        alert = true,
        project_id = ?project_id,
        detail = detail,
        "Data integrity violation"
    );
}

/// Log an action performed by a project manager
pub fn log_manager_action(user_id: Uuid, action: &str, target: Uuid) {
    warn!(
        user_id = %user_id,
        action = action,
        target = %target,
        "Manager action performed"
    );
}
