//! Schedule model
//!
//! A project carries exactly one of three schedule topologies. Every topology
//! is flattened into [`Slot`]s addressed by a stable schedule id:
//!
//! * `OneTime` has a single slot with id `"oneTime"`
//! * `MultiDay` slots are addressed as `"{YYYY-MM-DD}-{index}"`, the index being
//!   the zero-based position of the slot within its day
//! * `SameDayMultiArea` slots are addressed by role name
//!
//! Schedule ids appear in URLs and client state and must not change shape.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::errors::{Result, VolunteerHubError};

/// Schedule id of the single `OneTime` slot
pub const ONE_TIME_SLOT_ID: &str = "oneTime";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Event type discriminator persisted next to the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    OneTime,
    MultiDay,
    SameDayMultiArea,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OneTime => "oneTime",
            EventType::MultiDay => "multiDay",
            EventType::SameDayMultiArea => "sameDayMultiArea",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = VolunteerHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oneTime" => Ok(EventType::OneTime),
            "multiDay" => Ok(EventType::MultiDay),
            "sameDayMultiArea" => Ok(EventType::SameDayMultiArea),
            other => Err(VolunteerHubError::InvalidInput(format!("Unknown event type: {}", other))),
        }
    }
}

/// `HH:MM` wire format for slot times; `HH:MM:SS` is accepted on input.
mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeSchedule {
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub capacity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub capacity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDaySchedule {
    pub days: Vec<ScheduleDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub capacity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SameDayMultiAreaSchedule {
    pub date: NaiveDate,
    pub roles: Vec<Role>,
}

/// The three supported schedule topologies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum Schedule {
    OneTime(OneTimeSchedule),
    MultiDay(MultiDaySchedule),
    SameDayMultiArea(SameDayMultiAreaSchedule),
}

/// One reservable unit of a schedule. Derived, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub schedule_id: String,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub capacity: i32,
}

/// A parsed schedule id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKey {
    OneTime,
    Day { date: NaiveDate, index: usize },
    Role(String),
}

impl SlotKey {
    /// Parse a schedule id in the context of an event type.
    ///
    /// Day ids split on the last `-` only, since the date itself contains dashes.
    /// Anything malformed yields `None`.
    pub fn parse(event_type: EventType, schedule_id: &str) -> Option<Self> {
        match event_type {
            EventType::OneTime => (schedule_id == ONE_TIME_SLOT_ID).then_some(SlotKey::OneTime),
            EventType::MultiDay => {
                let (date, index) = schedule_id.rsplit_once('-')?;
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
                let index = index.parse::<usize>().ok()?;
                Some(SlotKey::Day { date, index })
            }
            EventType::SameDayMultiArea => {
                (!schedule_id.is_empty()).then(|| SlotKey::Role(schedule_id.to_string()))
            }
        }
    }
}

/// Build the schedule id of the `index`-th slot of a day
pub fn day_slot_id(date: NaiveDate, index: usize) -> String {
    format!("{}-{}", date.format(DATE_FORMAT), index)
}

fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = NaiveDateTime::new(date, time);
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

impl Slot {
    /// Start instant of the slot at the given project offset
    pub fn starts_at(&self, offset: FixedOffset) -> DateTime<Utc> {
        local_to_utc(self.date, self.start_time, offset)
    }

    /// End instant of the slot. A slot whose end is not after its start ends the next day.
    pub fn ends_at(&self, offset: FixedOffset) -> DateTime<Utc> {
        let end_date = if self.end_time <= self.start_time {
            self.date.succ_opt().unwrap_or(self.date)
        } else {
            self.date
        };
        local_to_utc(end_date, self.end_time, offset)
    }
}

impl Schedule {
    pub fn event_type(&self) -> EventType {
        match self {
            Schedule::OneTime(_) => EventType::OneTime,
            Schedule::MultiDay(_) => EventType::MultiDay,
            Schedule::SameDayMultiArea(_) => EventType::SameDayMultiArea,
        }
    }

    /// Enumerate every slot of the schedule.
    ///
    /// Ordering is deterministic: chronological for multi-day schedules (by date,
    /// then start time, then index), declaration order for roles.
    pub fn enumerate_slots(&self) -> Vec<Slot> {
        match self {
            Schedule::OneTime(one) => vec![Slot {
                schedule_id: ONE_TIME_SLOT_ID.to_string(),
                date: one.date,
                start_time: one.start_time,
                end_time: one.end_time,
                capacity: one.capacity,
            }],
            Schedule::MultiDay(multi) => {
                let mut days: Vec<&ScheduleDay> = multi.days.iter().collect();
                days.sort_by_key(|day| day.date);

                let mut slots = Vec::new();
                for day in days {
                    let mut indexed: Vec<(usize, &TimeSlot)> = day.slots.iter().enumerate().collect();
                    indexed.sort_by_key(|(index, slot)| (slot.start_time, *index));
                    slots.extend(indexed.into_iter().map(|(index, slot)| Slot {
                        schedule_id: day_slot_id(day.date, index),
                        date: day.date,
                        start_time: slot.start_time,
                        end_time: slot.end_time,
                        capacity: slot.capacity,
                    }));
                }
                slots
            }
            Schedule::SameDayMultiArea(area) => area
                .roles
                .iter()
                .map(|role| Slot {
                    schedule_id: role.name.clone(),
                    date: area.date,
                    start_time: role.start_time,
                    end_time: role.end_time,
                    capacity: role.capacity,
                })
                .collect(),
        }
    }

    /// Resolve a schedule id to its slot
    pub fn resolve_slot(&self, schedule_id: &str) -> Result<Slot> {
        let not_found = || VolunteerHubError::SlotNotFound { schedule_id: schedule_id.to_string() };
        let key = SlotKey::parse(self.event_type(), schedule_id).ok_or_else(not_found)?;

        let slot = match (self, key) {
            (Schedule::OneTime(_), SlotKey::OneTime) => self.enumerate_slots().into_iter().next(),
            (Schedule::MultiDay(multi), SlotKey::Day { date, index }) => multi
                .days
                .iter()
                .find(|day| day.date == date)
                .and_then(|day| day.slots.get(index))
                .map(|slot| Slot {
                    schedule_id: day_slot_id(date, index),
                    date,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    capacity: slot.capacity,
                }),
            (Schedule::SameDayMultiArea(area), SlotKey::Role(name)) => area
                .roles
                .iter()
                .find(|role| role.name == name)
                .map(|role| Slot {
                    schedule_id: role.name.clone(),
                    date: area.date,
                    start_time: role.start_time,
                    end_time: role.end_time,
                    capacity: role.capacity,
                }),
            _ => None,
        };

        slot.ok_or_else(not_found)
    }

    /// Earliest slot start and latest slot end, or `None` for an empty schedule
    pub fn window(&self, offset: FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let slots = self.enumerate_slots();
        let start = slots.iter().map(|slot| slot.starts_at(offset)).min()?;
        let end = slots.iter().map(|slot| slot.ends_at(offset)).max()?;
        Some((start, end))
    }

    /// Check structural rules a schedule must satisfy before it is stored
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(VolunteerHubError::InvalidInput(reason));

        match self {
            Schedule::OneTime(_) => {}
            Schedule::MultiDay(multi) => {
                if multi.days.is_empty() {
                    return invalid("Multi-day schedule needs at least one day".to_string());
                }
                let mut dates = HashSet::new();
                for day in &multi.days {
                    if !dates.insert(day.date) {
                        return invalid(format!("Duplicate schedule day: {}", day.date));
                    }
                    if day.slots.is_empty() {
                        return invalid(format!("Schedule day {} has no slots", day.date));
                    }
                }
            }
            Schedule::SameDayMultiArea(area) => {
                if area.roles.is_empty() {
                    return invalid("Multi-area schedule needs at least one role".to_string());
                }
                let mut names = HashSet::new();
                for role in &area.roles {
                    if role.name.trim().is_empty() {
                        return invalid("Role name cannot be empty".to_string());
                    }
                    if !names.insert(role.name.as_str()) {
                        return invalid(format!("Duplicate role name: {}", role.name));
                    }
                }
            }
        }

        for slot in self.enumerate_slots() {
            if slot.capacity <= 0 {
                return invalid(format!("Slot {} must have a positive capacity", slot.schedule_id));
            }
        }

        Ok(())
    }
}

/// Whether a slot's end instant has passed
pub fn is_slot_time_elapsed(slot: &Slot, offset: FixedOffset, now: DateTime<Utc>) -> bool {
    now > slot.ends_at(offset)
}
