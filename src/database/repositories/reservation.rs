//! Slot reservation counters
//!
//! These helpers run on a connection that is already inside a transaction so
//! the counter change commits or rolls back together with the signup row it
//! belongs to.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use crate::utils::errors::VolunteerHubError;

/// Take one unit of capacity on a slot.
///
/// The conditional increment locks the counter row, so concurrent admissions
/// for the same slot are serialized and the count can never pass `capacity`.
pub async fn reserve(conn: &mut PgConnection, project_id: Uuid, schedule_id: &str, capacity: i32) -> Result<(), VolunteerHubError> {
    sqlx::query(
        r#"
        INSERT INTO slot_reservations (project_id, schedule_id, reserved)
        VALUES ($1, $2, 0)
        ON CONFLICT (project_id, schedule_id) DO NOTHING
        "#
    )
    .bind(project_id)
    .bind(schedule_id)
    .execute(&mut *conn)
    .await?;

    let reserved: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE slot_reservations
        SET reserved = reserved + 1
        WHERE project_id = $1 AND schedule_id = $2 AND reserved < $3
        RETURNING reserved
        "#
    )
    .bind(project_id)
    .bind(schedule_id)
    .bind(capacity)
    .fetch_optional(&mut *conn)
    .await?;

    match reserved {
        Some(_) => Ok(()),
        None => Err(VolunteerHubError::CapacityExceeded { schedule_id: schedule_id.to_string() }),
    }
}

/// Give back one unit of capacity on a slot
pub async fn release(conn: &mut PgConnection, project_id: Uuid, schedule_id: &str) -> Result<(), VolunteerHubError> {
    sqlx::query(
        r#"
        UPDATE slot_reservations
        SET reserved = reserved - 1
        WHERE project_id = $1 AND schedule_id = $2 AND reserved > 0
        "#
    )
    .bind(project_id)
    .bind(schedule_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Current reservation count of a slot
pub async fn reserved_count(pool: &PgPool, project_id: Uuid, schedule_id: &str) -> Result<i64, VolunteerHubError> {
    let count: Option<(i32,)> = sqlx::query_as(
        "SELECT reserved FROM slot_reservations WHERE project_id = $1 AND schedule_id = $2"
    )
    .bind(project_id)
    .bind(schedule_id)
    .fetch_optional(pool)
    .await?;

    Ok(count.map(|(reserved,)| reserved as i64).unwrap_or(0))
}
