//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every GroupSight
//! table idempotently. Safe to run on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create all tables and default settings (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_settings_table(pool).await?;
    create_sessions_table(pool).await?;
    create_criteria_table(pool).await?;
    create_assessment_progress_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            context TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_criteria_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS criteria (
            criterion_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            order_index INTEGER NOT NULL,
            description TEXT NOT NULL,
            rubric TEXT NOT NULL,
            UNIQUE(session_id, order_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_assessment_progress_table(pool: &SqlitePool) -> Result<()> {
    // quote is NULL exactly when status is GREY
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assessment_progress (
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            group_id TEXT NOT NULL,
            criterion_index INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('GREY', 'RED', 'GREEN')),
            quote TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (session_id, group_id, criterion_index),
            CHECK ((status = 'GREY') = (quote IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_session ON assessment_progress(session_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure every required setting exists with a default value
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "max_lock_wait_ms", "5000").await?;
    Ok(())
}

/// Insert a default for `key` if it is missing, or reset it if NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE tolerates two services initializing at once
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            warn!("Setting '{}' was NULL, resetting to default: {}", key, default_value);
            sqlx::query(
                "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?",
            )
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
