//! VolunteerHub
//!
//! Slot-capacity scheduling and signup state machine for volunteer projects.
//! Organizers publish projects with one of three schedule shapes; registered
//! and anonymous volunteers reserve slots without over-booking them.

#![allow(non_snake_case)]

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{VolunteerHubError, Result};

// Re-export main components for easy access
pub use database::{DatabaseService, MemoryStore, VolunteerStore};
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
