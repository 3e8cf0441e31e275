//! Project status derivation
//!
//! A project's lifecycle status follows from its schedule and the wall clock.
//! The status stored on the project row is only a cache of [`derive_status`];
//! admission decisions always call it fresh.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use crate::models::{Project, ProjectStatus, Schedule};

/// Overall start and end instants of a schedule at the given offset
pub fn project_window(schedule: &Schedule, offset: FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    schedule.window(offset)
}

/// Derive the lifecycle status from the schedule, cancellation and current time.
///
/// A cancellation timestamp always wins. Otherwise the status is `upcoming`
/// before the earliest slot start, `in_progress` up to and including the latest
/// slot end, and `completed` afterwards. A schedule without slots never starts.
pub fn derive_status(
    schedule: &Schedule,
    offset: FixedOffset,
    cancelled_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ProjectStatus {
    if cancelled_at.is_some() {
        return ProjectStatus::Cancelled;
    }

    match project_window(schedule, offset) {
        Some((start, _)) if now < start => ProjectStatus::Upcoming,
        Some((_, end)) if now <= end => ProjectStatus::InProgress,
        Some(_) => ProjectStatus::Completed,
        None => ProjectStatus::Upcoming,
    }
}

/// [`derive_status`] for a stored project
pub fn derive_project_status(project: &Project, now: DateTime<Utc>) -> ProjectStatus {
    derive_status(&project.schedule, project.offset(), project.cancelled_at, now)
}

/// Time left until the schedule's first slot starts; negative once it has started
pub fn time_until_start(schedule: &Schedule, offset: FixedOffset, now: DateTime<Utc>) -> Option<Duration> {
    project_window(schedule, offset).map(|(start, _)| start - now)
}
