//! Database module
//!
//! This module handles database connections and the storage seam used by the services

pub mod connection;
pub mod repositories;
pub mod service;
pub mod store;
pub mod memory;

// Re-export commonly used database components
pub use connection::{DatabasePool, PoolOptions, create_pool, run_migrations, health_check};
pub use repositories::{ProjectRepository, SignupRepository, AccountRepository};
pub use service::DatabaseService;
pub use store::{VolunteerStore, TokenRedemption};
pub use memory::MemoryStore;
