//! Intervention persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use ppfw_common::time::parse_rfc3339;
use ppfw_common::Result;

use super::{parse_uuid, to_u8};
use crate::models::{Intervention, InterventionStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT id, current_step, status, completion_percentage,
           client_id, vehicle_id, technician_id, version,
           created_at, updated_at
    FROM interventions
"#;

pub async fn insert(pool: &SqlitePool, intervention: &Intervention) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO interventions (
            id, current_step, status, completion_percentage,
            client_id, vehicle_id, technician_id, version,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(intervention.id.to_string())
    .bind(i64::from(intervention.current_step))
    .bind(intervention.status.as_str())
    .bind(intervention.completion_percentage)
    .bind(&intervention.client_id)
    .bind(&intervention.vehicle_id)
    .bind(&intervention.technician_id)
    .bind(intervention.version)
    .bind(intervention.created_at.to_rfc3339())
    .bind(intervention.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load(pool: &SqlitePool, id: Uuid) -> Result<Option<Intervention>> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(intervention_from_row).transpose()
}

/// Write `intervention` only if the stored version still equals `expected_version`
///
/// Returns false when another writer got there first; nothing is written then.
pub async fn compare_and_swap(
    conn: &mut SqliteConnection,
    intervention: &Intervention,
    expected_version: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE interventions
        SET current_step = ?, status = ?, completion_percentage = ?,
            version = ?, updated_at = ?
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(i64::from(intervention.current_step))
    .bind(intervention.status.as_str())
    .bind(intervention.completion_percentage)
    .bind(intervention.version)
    .bind(intervention.updated_at.to_rfc3339())
    .bind(intervention.id.to_string())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn intervention_from_row(row: &SqliteRow) -> Result<Intervention> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Intervention {
        id: parse_uuid("interventions.id", &id)?,
        current_step: to_u8("current_step", row.get("current_step"))?,
        status: InterventionStatus::from(status),
        completion_percentage: row.get("completion_percentage"),
        client_id: row.get("client_id"),
        vehicle_id: row.get("vehicle_id"),
        technician_id: row.get("technician_id"),
        version: row.get("version"),
        created_at: parse_rfc3339("created_at", &created_at)?,
        updated_at: parse_rfc3339("updated_at", &updated_at)?,
    })
}
