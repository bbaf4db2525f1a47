//! Override audit persistence

use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use ppfw_common::time::parse_rfc3339;
use ppfw_common::Result;

use super::{parse_uuid, to_u8};
use crate::models::AdvanceAuditEntry;

pub async fn insert(conn: &mut SqliteConnection, entry: &AdvanceAuditEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO advance_audit (
            id, intervention_id, caller, from_step, to_step,
            force_validation, supervisor_override, out_of_order, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.intervention_id.to_string())
    .bind(&entry.caller)
    .bind(i64::from(entry.from_step))
    .bind(i64::from(entry.to_step))
    .bind(entry.force_validation)
    .bind(entry.supervisor_override)
    .bind(entry.out_of_order)
    .bind(entry.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Audit entries for one intervention, oldest first
pub async fn list_for_intervention(
    pool: &SqlitePool,
    intervention_id: Uuid,
) -> Result<Vec<AdvanceAuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, intervention_id, caller, from_step, to_step,
               force_validation, supervisor_override, out_of_order, created_at
        FROM advance_audit
        WHERE intervention_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(intervention_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let intervention_id: String = row.get("intervention_id");
            let created_at: String = row.get("created_at");
            Ok(AdvanceAuditEntry {
                id: parse_uuid("advance_audit.id", &id)?,
                intervention_id: parse_uuid("advance_audit.intervention_id", &intervention_id)?,
                caller: row.get("caller"),
                from_step: to_u8("from_step", row.get("from_step"))?,
                to_step: to_u8("to_step", row.get("to_step"))?,
                force_validation: row.get("force_validation"),
                supervisor_override: row.get("supervisor_override"),
                out_of_order: row.get("out_of_order"),
                created_at: parse_rfc3339("created_at", &created_at)?,
            })
        })
        .collect()
}
