//! Stage record persistence and the advance commit

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use ppfw_common::time::{parse_rfc3339, parse_rfc3339_opt};
use ppfw_common::{Error, Result};

use super::{audit, from_json, interventions, parse_uuid, retry_on_lock, to_json, to_u8};
use crate::models::{AdvanceAuditEntry, Intervention, Stage, StepRecord, StepStatus};

/// All stage records of one intervention, ordered by step number
pub async fn list_for_intervention(pool: &SqlitePool, intervention_id: Uuid) -> Result<Vec<StepRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, intervention_id, step_number, step_type, status,
               collected_data, measurements, observations, photo_urls,
               notes, geolocation, completed_at, created_at, updated_at
        FROM intervention_steps
        WHERE intervention_id = ?
        ORDER BY step_number
        "#,
    )
    .bind(intervention_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(step_from_row).collect()
}

/// Insert or replace the record for (intervention, step_number)
pub async fn upsert(conn: &mut SqliteConnection, step: &StepRecord) -> Result<()> {
    let geolocation = step
        .geolocation
        .as_ref()
        .map(|g| to_json("geolocation", g))
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO intervention_steps (
            id, intervention_id, step_number, step_type, status,
            collected_data, measurements, observations, photo_urls,
            notes, geolocation, completed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(intervention_id, step_number) DO UPDATE SET
            step_type = excluded.step_type,
            status = excluded.status,
            collected_data = excluded.collected_data,
            measurements = excluded.measurements,
            observations = excluded.observations,
            photo_urls = excluded.photo_urls,
            notes = excluded.notes,
            geolocation = excluded.geolocation,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(step.id.to_string())
    .bind(step.intervention_id.to_string())
    .bind(i64::from(step.step_number))
    .bind(step.step_type.map(Stage::as_str))
    .bind(step.status.as_str())
    .bind(to_json("collected_data", &step.collected_data)?)
    .bind(to_json("measurements", &step.measurements)?)
    .bind(to_json("observations", &step.observations)?)
    .bind(to_json("photo_urls", &step.photo_urls)?)
    .bind(&step.notes)
    .bind(geolocation)
    .bind(step.completed_at.map(|dt| dt.to_rfc3339()))
    .bind(step.created_at.to_rfc3339())
    .bind(step.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persist one accepted advance atomically
///
/// The intervention row is swapped first; when its version no longer matches
/// `expected_version` the transaction is rolled back and `Ok(false)` returned,
/// leaving the stage record and audit trail untouched.
pub async fn commit_advance(
    pool: &SqlitePool,
    max_wait_ms: u64,
    intervention: &Intervention,
    expected_version: i64,
    step: &StepRecord,
    audit_entry: Option<&AdvanceAuditEntry>,
) -> Result<bool> {
    retry_on_lock("commit_advance", max_wait_ms, || {
        commit_advance_once(pool, intervention, expected_version, step, audit_entry)
    })
    .await
}

async fn commit_advance_once(
    pool: &SqlitePool,
    intervention: &Intervention,
    expected_version: i64,
    step: &StepRecord,
    audit_entry: Option<&AdvanceAuditEntry>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    if !interventions::compare_and_swap(&mut tx, intervention, expected_version).await? {
        tx.rollback().await?;
        return Ok(false);
    }

    upsert(&mut tx, step).await?;

    if let Some(entry) = audit_entry {
        audit::insert(&mut tx, entry).await?;
    }

    tx.commit().await?;
    Ok(true)
}

fn step_from_row(row: &SqliteRow) -> Result<StepRecord> {
    let id: String = row.get("id");
    let intervention_id: String = row.get("intervention_id");
    let step_type: Option<String> = row.get("step_type");
    let status: String = row.get("status");
    let collected_data: String = row.get("collected_data");
    let measurements: String = row.get("measurements");
    let observations: String = row.get("observations");
    let photo_urls: String = row.get("photo_urls");
    let geolocation: Option<String> = row.get("geolocation");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let status = StepStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown step status: {}", status)))?;

    Ok(StepRecord {
        id: parse_uuid("intervention_steps.id", &id)?,
        intervention_id: parse_uuid("intervention_steps.intervention_id", &intervention_id)?,
        step_number: to_u8("step_number", row.get("step_number"))?,
        // Unknown tags read back as untagged so the scorer can flag them
        step_type: step_type.as_deref().and_then(Stage::parse),
        status,
        collected_data: from_json("collected_data", &collected_data)?,
        measurements: from_json("measurements", &measurements)?,
        observations: from_json("observations", &observations)?,
        photo_urls: from_json("photo_urls", &photo_urls)?,
        notes: row.get("notes"),
        geolocation: geolocation
            .as_deref()
            .map(|g| from_json("geolocation", g))
            .transpose()?,
        completed_at: parse_rfc3339_opt("completed_at", row.get("completed_at"))?,
        created_at: parse_rfc3339("created_at", &created_at)?,
        updated_at: parse_rfc3339("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (SqlitePool, Intervention) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ppfw_common::db::init_schema(&pool).await.unwrap();
        let iv = Intervention::new(None, None, None);
        interventions::insert(&pool, &iv).await.unwrap();
        (pool, iv)
    }

    #[tokio::test]
    async fn test_commit_advance_writes_step_and_bumps_version() {
        let (pool, iv) = setup().await;
        let now = Utc::now();

        let mut step = StepRecord::new(iv.id, Stage::Inspection, now);
        step.collected_data.insert("paint_condition".into(), json!("good"));
        step.measurements.insert("film_thickness".into(), 0.2);
        step.status = StepStatus::Completed;
        step.completed_at = Some(now);

        let mut next = iv.clone();
        next.current_step = 2;
        next.version = 1;

        assert!(commit_advance(&pool, 1000, &next, 0, &step, None).await.unwrap());

        let steps = list_for_intervention(&pool, iv.id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_type, Some(Stage::Inspection));
        assert_eq!(steps[0].collected_data["paint_condition"], json!("good"));
        assert_eq!(steps[0].measurements["film_thickness"], 0.2);
        assert!(steps[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_stale_commit_leaves_no_trace() {
        let (pool, iv) = setup().await;
        let step = StepRecord::new(iv.id, Stage::Inspection, Utc::now());
        let mut next = iv.clone();
        next.version = 1;

        assert!(!commit_advance(&pool, 1000, &next, 7, &step, None).await.unwrap());
        assert!(list_for_intervention(&pool, iv.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_stage_row() {
        let (pool, iv) = setup().await;
        let now = Utc::now();
        let mut step = StepRecord::new(iv.id, Stage::Preparation, now);

        let mut conn = pool.acquire().await.unwrap();
        upsert(&mut conn, &step).await.unwrap();
        step.notes = Some("second pass".into());
        // A fresh id for the same stage must still land on the same row
        step.id = Uuid::new_v4();
        upsert(&mut conn, &step).await.unwrap();
        drop(conn);

        let steps = list_for_intervention(&pool, iv.id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].notes.as_deref(), Some("second pass"));
    }

    #[tokio::test]
    async fn test_untagged_legacy_row_reads_back_without_type() {
        let (pool, iv) = setup().await;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO intervention_steps (id, intervention_id, step_number, status, created_at, updated_at) \
             VALUES (?, ?, 1, 'in_progress', ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(iv.id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        let steps = list_for_intervention(&pool, iv.id).await.unwrap();
        assert_eq!(steps[0].step_type, None);
        assert!(steps[0].collected_data.is_empty());
        assert!(steps[0].photo_urls.is_empty());
    }
}
