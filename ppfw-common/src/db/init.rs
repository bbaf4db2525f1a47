//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table the
//! workflow services need. All statements are idempotent, so this runs on
//! every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection settings, applied to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Apply connection pragmas and create all tables
///
/// Split from [`init_database`] so tests can run it against `sqlite::memory:`.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(pool).await?;

    create_settings_table(pool).await?;
    create_interventions_table(pool).await?;
    create_intervention_steps_table(pool).await?;
    create_photos_table(pool).await?;
    create_advance_audit_table(pool).await?;
    create_request_counters_table(pool).await?;

    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interventions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interventions (
            id TEXT PRIMARY KEY,
            current_step INTEGER NOT NULL DEFAULT 1 CHECK (current_step BETWEEN 1 AND 4),
            status TEXT NOT NULL,
            completion_percentage REAL NOT NULL DEFAULT 0,
            client_id TEXT,
            vehicle_id TEXT,
            technician_id TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_intervention_steps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS intervention_steps (
            id TEXT PRIMARY KEY,
            intervention_id TEXT NOT NULL REFERENCES interventions(id) ON DELETE CASCADE,
            step_number INTEGER NOT NULL CHECK (step_number BETWEEN 1 AND 4),
            step_type TEXT,
            status TEXT NOT NULL,
            collected_data TEXT NOT NULL DEFAULT '{}',
            measurements TEXT NOT NULL DEFAULT '{}',
            observations TEXT NOT NULL DEFAULT '[]',
            photo_urls TEXT NOT NULL DEFAULT '[]',
            notes TEXT,
            geolocation TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (intervention_id, step_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_photos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photos (
            id TEXT PRIMARY KEY,
            intervention_id TEXT NOT NULL REFERENCES interventions(id) ON DELETE CASCADE,
            step_number INTEGER NOT NULL CHECK (step_number BETWEEN 1 AND 4),
            angle TEXT NOT NULL,
            category TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            quality_score INTEGER CHECK (quality_score IS NULL OR quality_score BETWEEN 0 AND 100),
            notes TEXT,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            storage_key TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_photos_intervention_step ON photos (intervention_id, step_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_advance_audit_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS advance_audit (
            id TEXT PRIMARY KEY,
            intervention_id TEXT NOT NULL REFERENCES interventions(id) ON DELETE CASCADE,
            caller TEXT NOT NULL,
            from_step INTEGER NOT NULL,
            to_step INTEGER NOT NULL,
            force_validation INTEGER NOT NULL DEFAULT 0,
            supervisor_override INTEGER NOT NULL DEFAULT 0,
            out_of_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_request_counters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS request_counters (
            counter_key TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (counter_key, window_start)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
