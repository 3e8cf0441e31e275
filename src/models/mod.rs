//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod schedule;
pub mod project;
pub mod signup;

// Re-export commonly used models
pub use schedule::{EventType, Schedule, Slot, SlotKey, OneTimeSchedule, MultiDaySchedule, ScheduleDay, TimeSlot, SameDayMultiAreaSchedule, Role, ONE_TIME_SLOT_ID, is_slot_time_elapsed};
pub use project::{Project, ProjectStatus, ProjectRow, CreateProjectRequest, NewProject, utc_offset};
pub use signup::{Signup, SignupRow, SignupStatus, SignupIdentity, IdentityKey, AnonymousSignup, AnonymousDetails, Applicant, CreateSignupRequest, NewSignup, NewAnonymousSignup, Actor, SlotAvailability};
