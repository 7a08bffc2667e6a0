//! Assessment progress database operations
//!
//! One row per (session, group, criterion_index). Rows are created lazily:
//! a missing row reads as GREY.

use chrono::Utc;
use groupsight_common::{AssessmentRecord, CriterionStatus, Error, Evidence, Result};
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use super::{parse_timestamp, settings};
use crate::utils::retry_on_lock;

/// Get the stored records for one group, ordered by criterion index
///
/// Rows whose status and quote disagree are read back as GREY.
pub async fn get_progress(
    pool: &SqlitePool,
    session_id: Uuid,
    group_id: &str,
) -> Result<Vec<AssessmentRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT criterion_index, status, quote, updated_at
        FROM assessment_progress
        WHERE session_id = ? AND group_id = ?
        ORDER BY criterion_index ASC
        "#,
    )
    .bind(session_id.to_string())
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let criterion_index: i64 = row.get("criterion_index");
        let Ok(criterion_index) = u32::try_from(criterion_index) else {
            warn!(criterion_index, "Skipping progress row with invalid criterion index");
            continue;
        };

        let status: String = row.get("status");
        let status = status.parse::<CriterionStatus>().map_err(Error::Internal)?;
        let quote: Option<String> = row.get("quote");
        let updated_at: String = row.get("updated_at");

        records.push(AssessmentRecord {
            criterion_index,
            evidence: Evidence::from_parts(status, quote),
            updated_at: parse_timestamp("updated_at", &updated_at).unwrap_or_else(|_| Utc::now()),
        });
    }

    Ok(records)
}

/// Store entry point for a single record (`store.upsertProgress`)
///
/// Processing rounds persist all accepted records at once through
/// [`upsert_progress_batch`]; both share one write path.
pub async fn upsert_progress(
    pool: &SqlitePool,
    session_id: Uuid,
    group_id: &str,
    record: &AssessmentRecord,
) -> Result<()> {
    upsert_progress_batch(pool, session_id, group_id, std::slice::from_ref(record)).await
}

/// Insert or replace several records in one transaction
pub async fn upsert_progress_batch(
    pool: &SqlitePool,
    session_id: Uuid,
    group_id: &str,
    records: &[AssessmentRecord],
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let session_id = session_id.to_string();
    let max_wait_ms = settings::get_max_lock_wait_ms(pool).await?;

    retry_on_lock("upsert_progress", max_wait_ms, || async {
        let mut tx = pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO assessment_progress
                    (session_id, group_id, criterion_index, status, quote, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(session_id, group_id, criterion_index) DO UPDATE SET
                    status = excluded.status,
                    quote = excluded.quote,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&session_id)
            .bind(group_id)
            .bind(record.criterion_index as i64)
            .bind(record.status().as_str())
            .bind(record.quote())
            .bind(record.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await?;
        Ok(())
    })
    .await
}
