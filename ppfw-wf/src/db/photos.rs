//! Photo evidence persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ppfw_common::time::parse_rfc3339;
use ppfw_common::Result;

use super::{parse_uuid, to_u8};
use crate::models::{GpsPoint, PhotoAngle, PhotoCategory, PhotoEvidence};

const SELECT_COLUMNS: &str = r#"
    SELECT id, intervention_id, step_number, angle, category,
           latitude, longitude, quality_score, notes,
           file_name, content_type, size_bytes, storage_key, created_at
    FROM photos
"#;

pub async fn insert(pool: &SqlitePool, photo: &PhotoEvidence) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO photos (
            id, intervention_id, step_number, angle, category,
            latitude, longitude, quality_score, notes,
            file_name, content_type, size_bytes, storage_key, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(photo.id.to_string())
    .bind(photo.intervention_id.to_string())
    .bind(i64::from(photo.step_number))
    .bind(photo.angle.as_str())
    .bind(photo.category.as_str())
    .bind(photo.gps.map(|g| g.latitude))
    .bind(photo.gps.map(|g| g.longitude))
    .bind(photo.quality_score.map(i64::from))
    .bind(&photo.notes)
    .bind(&photo.file_name)
    .bind(&photo.content_type)
    .bind(photo.size_bytes as i64)
    .bind(&photo.storage_key)
    .bind(photo.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Photos of one intervention, optionally restricted to one stage
pub async fn list_for_intervention(
    pool: &SqlitePool,
    intervention_id: Uuid,
    step_number: Option<u8>,
) -> Result<Vec<PhotoEvidence>> {
    let rows = match step_number {
        Some(step) => {
            let sql = format!(
                "{} WHERE intervention_id = ? AND step_number = ? ORDER BY created_at, rowid",
                SELECT_COLUMNS
            );
            sqlx::query(&sql)
                .bind(intervention_id.to_string())
                .bind(i64::from(step))
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!(
                "{} WHERE intervention_id = ? ORDER BY step_number, created_at, rowid",
                SELECT_COLUMNS
            );
            sqlx::query(&sql)
                .bind(intervention_id.to_string())
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(photo_from_row).collect()
}

/// Load a photo only if it belongs to `intervention_id`
pub async fn load_owned(
    pool: &SqlitePool,
    intervention_id: Uuid,
    photo_id: Uuid,
) -> Result<Option<PhotoEvidence>> {
    let sql = format!("{} WHERE id = ? AND intervention_id = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(photo_id.to_string())
        .bind(intervention_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(photo_from_row).transpose()
}

/// Returns false when no row matched
pub async fn delete(pool: &SqlitePool, intervention_id: Uuid, photo_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM photos WHERE id = ? AND intervention_id = ?")
        .bind(photo_id.to_string())
        .bind(intervention_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn photo_from_row(row: &SqliteRow) -> Result<PhotoEvidence> {
    let id: String = row.get("id");
    let intervention_id: String = row.get("intervention_id");
    let angle: String = row.get("angle");
    let category: String = row.get("category");
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let quality_score: Option<i64> = row.get("quality_score");
    let size_bytes: i64 = row.get("size_bytes");
    let created_at: String = row.get("created_at");

    let gps = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GpsPoint { latitude, longitude }),
        _ => None,
    };

    Ok(PhotoEvidence {
        id: parse_uuid("photos.id", &id)?,
        intervention_id: parse_uuid("photos.intervention_id", &intervention_id)?,
        step_number: to_u8("step_number", row.get("step_number"))?,
        angle: PhotoAngle::parse(&angle).unwrap_or(PhotoAngle::DEFAULT),
        category: PhotoCategory::parse(&category).unwrap_or(PhotoCategory::DEFAULT),
        gps,
        quality_score: quality_score.map(|q| to_u8("quality_score", q)).transpose()?,
        notes: row.get("notes"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        size_bytes: size_bytes.max(0) as u64,
        storage_key: row.get("storage_key"),
        created_at: parse_rfc3339("created_at", &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::interventions;
    use crate::models::Intervention;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    fn sample(intervention_id: Uuid, step_number: u8) -> PhotoEvidence {
        let id = Uuid::new_v4();
        PhotoEvidence {
            id,
            intervention_id,
            step_number,
            angle: PhotoAngle::Front,
            category: PhotoCategory::BeforeInstallation,
            gps: Some(GpsPoint { latitude: 48.85, longitude: 2.35 }),
            quality_score: Some(88),
            notes: None,
            file_name: "hood.jpg".into(),
            content_type: "image/jpeg".into(),
            size_bytes: 1024,
            storage_key: format!("{}/{}.jpg", intervention_id, id),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_step_and_delete_checks_owner() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ppfw_common::db::init_schema(&pool).await.unwrap();
        let iv = Intervention::new(None, None, None);
        let other = Intervention::new(None, None, None);
        interventions::insert(&pool, &iv).await.unwrap();
        interventions::insert(&pool, &other).await.unwrap();

        let first = sample(iv.id, 1);
        insert(&pool, &first).await.unwrap();
        insert(&pool, &sample(iv.id, 3)).await.unwrap();

        assert_eq!(list_for_intervention(&pool, iv.id, None).await.unwrap().len(), 2);
        let stage_one = list_for_intervention(&pool, iv.id, Some(1)).await.unwrap();
        assert_eq!(stage_one, vec![first.clone()]);

        assert!(!delete(&pool, other.id, first.id).await.unwrap());
        assert!(load_owned(&pool, other.id, first.id).await.unwrap().is_none());
        assert!(delete(&pool, iv.id, first.id).await.unwrap());
        assert!(!delete(&pool, iv.id, first.id).await.unwrap());
    }
}
