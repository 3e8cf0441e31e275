//! Test data helpers
//!
//! Schedules, projects requests and applicants used across the integration
//! tests. Every schedule lives in June 2030 and tests pass an explicit clock.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;
use VolunteerHub::models::{
    AnonymousDetails, Applicant, CreateProjectRequest, CreateSignupRequest, MultiDaySchedule, OneTimeSchedule, Role,
    SameDayMultiAreaSchedule, Schedule, ScheduleDay, TimeSlot,
};

/// Clock used by most tests: a month before any fixture schedule starts
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// `2030-06-01 09:00-12:00`
pub fn one_time_schedule(capacity: i32) -> Schedule {
    Schedule::OneTime(OneTimeSchedule {
        date: date(2030, 6, 1),
        start_time: time(9, 0),
        end_time: time(12, 0),
        capacity,
    })
}

/// Two days: `2030-06-01` with two slots, `2030-06-02` with one
pub fn multi_day_schedule() -> Schedule {
    Schedule::MultiDay(MultiDaySchedule {
        days: vec![
            ScheduleDay {
                date: date(2030, 6, 1),
                slots: vec![
                    TimeSlot { start_time: time(9, 0), end_time: time(12, 0), capacity: 2 },
                    TimeSlot { start_time: time(13, 0), end_time: time(15, 0), capacity: 2 },
                ],
            },
            ScheduleDay {
                date: date(2030, 6, 2),
                slots: vec![TimeSlot { start_time: time(9, 0), end_time: time(11, 0), capacity: 1 }],
            },
        ],
    })
}

/// Roles `Kitchen` (2 places) and `Registration` (1 place) on `2030-06-01`
pub fn roles_schedule() -> Schedule {
    Schedule::SameDayMultiArea(SameDayMultiAreaSchedule {
        date: date(2030, 6, 1),
        roles: vec![
            Role { name: "Kitchen".to_string(), start_time: time(8, 0), end_time: time(14, 0), capacity: 2 },
            Role { name: "Registration".to_string(), start_time: time(9, 0), end_time: time(11, 0), capacity: 1 },
        ],
    })
}

pub fn project_request(created_by: Uuid, schedule: Schedule) -> CreateProjectRequest {
    CreateProjectRequest {
        title: "Community garden build".to_string(),
        created_by,
        schedule,
        require_login: false,
        restrict_to_org_domains: false,
        allowed_domains: vec![],
        utc_offset_minutes: Some(0),
    }
}

pub fn anonymous_details(email: &str) -> AnonymousDetails {
    AnonymousDetails {
        email: email.to_string(),
        name: "Sam Volunteer".to_string(),
        phone: Some("+1 555 010 0100".to_string()),
    }
}

pub fn user_signup(project_id: Uuid, schedule_id: &str, user_id: Uuid) -> CreateSignupRequest {
    CreateSignupRequest {
        project_id,
        schedule_id: schedule_id.to_string(),
        applicant: Applicant::User { user_id },
    }
}

pub fn anonymous_signup(project_id: Uuid, schedule_id: &str, email: &str) -> CreateSignupRequest {
    CreateSignupRequest {
        project_id,
        schedule_id: schedule_id.to_string(),
        applicant: Applicant::Anonymous(anonymous_details(email)),
    }
}
