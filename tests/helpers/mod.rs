//! Test helpers module
//!
//! Shared setup for the VolunteerHub integration tests: an in-memory test
//! context, recording collaborators and schedule fixtures.
#![allow(dead_code)]

pub mod mocks;
pub mod test_context;
pub mod test_data;

pub use mocks::*;
pub use test_context::*;
pub use test_data::*;
