//! Fixed-window request counters shared by every process on the database

use async_trait::async_trait;
use sqlx::SqlitePool;

use ppfw_common::Result;

use crate::workflow::CounterStore;

/// [`CounterStore`] backed by the `request_counters` table
#[derive(Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn increment(&self, key: &str, window_start: i64) -> Result<u32> {
        let mut tx = self.pool.begin().await?;

        // Expired windows for this key are never read again
        sqlx::query("DELETE FROM request_counters WHERE counter_key = ? AND window_start < ?")
            .bind(key)
            .bind(window_start)
            .execute(&mut *tx)
            .await?;

        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO request_counters (counter_key, window_start, count)
            VALUES (?, ?, 1)
            ON CONFLICT(counter_key, window_start) DO UPDATE SET count = count + 1
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
