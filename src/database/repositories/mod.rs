//! Database repositories module
//! 
//! This module contains all repository implementations for data access

pub mod project;
pub mod signup;
pub mod account;
pub mod reservation;

// Re-export repositories
pub use project::ProjectRepository;
pub use signup::SignupRepository;
pub use account::AccountRepository;
