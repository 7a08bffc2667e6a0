//! Database access for groupsight-live
//!
//! Free functions over a `SqlitePool`. Schema creation lives in
//! `groupsight_common::db`; this module owns the queries.

pub mod criteria;
pub mod progress;
pub mod sessions;
pub mod settings;

use anyhow::Result;
use chrono::{DateTime, Utc};
use groupsight_common::Error;
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// Initialize database connection pool
///
/// Creates the database file and all tables if needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    let pool = groupsight_common::db::init_database(db_path).await?;
    tracing::info!("Database tables initialized (sessions, criteria, assessment_progress, settings)");
    Ok(pool)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> groupsight_common::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> groupsight_common::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
