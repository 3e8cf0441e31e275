//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{VolunteerHubError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_logging_config(&settings.logging)?;
    validate_signup_config(&settings.signups)?;
    validate_reconciler_config(&settings.reconciler)?;
    validate_mail_config(&settings.mail)?;
    validate_calendar_config(&settings.calendar)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(VolunteerHubError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(VolunteerHubError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(VolunteerHubError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(VolunteerHubError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(VolunteerHubError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

/// Validate signup policy
fn validate_signup_config(config: &super::SignupConfig) -> Result<()> {
    // chrono's FixedOffset accepts strictly less than a day either way
    if config.default_utc_offset_minutes.abs() >= 24 * 60 {
        return Err(VolunteerHubError::Config(
            format!("Invalid default UTC offset: {} minutes", config.default_utc_offset_minutes)
        ));
    }

    if config.cancellation_guard_hours < 0 {
        return Err(VolunteerHubError::Config(
            "Cancellation guard cannot be negative".to_string()
        ));
    }

    if config.anonymous_token_ttl_hours <= 0 {
        return Err(VolunteerHubError::Config(
            "Anonymous token TTL must be greater than 0".to_string()
        ));
    }

    if config.token_length < 32 {
        return Err(VolunteerHubError::Config(
            "Confirmation tokens must be at least 32 characters".to_string()
        ));
    }

    url::Url::parse(&config.confirmation_base_url).map_err(|e| {
        VolunteerHubError::Config(format!("Invalid confirmation base URL: {}", e))
    })?;

    Ok(())
}

/// Validate reconciler configuration
fn validate_reconciler_config(config: &super::ReconcilerConfig) -> Result<()> {
    if config.enabled && config.interval_seconds == 0 {
        return Err(VolunteerHubError::Config(
            "Reconciler interval must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate mail relay configuration
fn validate_mail_config(config: &super::MailConfig) -> Result<()> {
    if config.enabled && config.endpoint.as_deref().map_or(true, str::is_empty) {
        return Err(VolunteerHubError::Config(
            "Mail endpoint is required when mail is enabled".to_string()
        ));
    }

    if config.from_address.is_empty() {
        return Err(VolunteerHubError::Config(
            "Mail from address is required".to_string()
        ));
    }

    Ok(())
}

/// Validate calendar sync configuration
fn validate_calendar_config(config: &super::CalendarConfig) -> Result<()> {
    if config.enabled && config.endpoint.as_deref().map_or(true, str::is_empty) {
        return Err(VolunteerHubError::Config(
            "Calendar endpoint is required when calendar sync is enabled".to_string()
        ));
    }

    Ok(())
}
