//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub signups: SignupConfig,
    pub reconciler: ReconcilerConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub calendar: CalendarConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    pub json: bool,
}

/// Signup and confirmation policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignupConfig {
    /// Offset applied to projects created without an explicit one
    pub default_utc_offset_minutes: i32,
    /// Projects can only be cancelled while their start is further away than this
    pub cancellation_guard_hours: i64,
    /// Unconfirmed anonymous signups older than this are swept
    pub anonymous_token_ttl_hours: i64,
    pub token_length: usize,
    pub confirmation_base_url: String,
}

/// Status reconciler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

/// Authorization configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Organization staff allowed to manage every project
    #[serde(default)]
    pub staff_user_ids: Vec<Uuid>,
}

/// Mail relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub from_address: String,
    pub timeout_seconds: u64,
}

/// Calendar sync configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("VOLUNTEERHUB").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::VolunteerHubError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            signups: SignupConfig::default(),
            reconciler: ReconcilerConfig::default(),
            auth: AuthConfig::default(),
            mail: MailConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/volunteerhub".to_string(),
            max_connections: 10,
            min_connections: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: "/var/log/volunteerhub".to_string(),
            json: false,
        }
    }
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            default_utc_offset_minutes: 0,
            cancellation_guard_hours: 24,
            anonymous_token_ttl_hours: 48,
            token_length: 48,
            confirmation_base_url: "http://localhost:3000/signups/confirm".to_string(),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            from_address: "no-reply@volunteerhub.local".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_seconds: 10,
        }
    }
}
