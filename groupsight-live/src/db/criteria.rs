//! Criteria database operations
//!
//! Criteria are immutable once inserted. `order_index` is unique per session.

use groupsight_common::{Criterion, Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_uuid, settings};
use crate::utils::retry_on_lock;

/// Insert a session's criteria in one transaction
pub async fn insert_criteria(
    pool: &SqlitePool,
    session_id: Uuid,
    criteria: &[Criterion],
) -> Result<()> {
    let session_id = session_id.to_string();
    let max_wait_ms = settings::get_max_lock_wait_ms(pool).await?;

    retry_on_lock("insert_criteria", max_wait_ms, || async {
        let mut tx = pool.begin().await?;

        for criterion in criteria {
            sqlx::query(
                r#"
                INSERT INTO criteria (criterion_id, session_id, order_index, description, rubric)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(criterion.criterion_id.to_string())
            .bind(&session_id)
            .bind(criterion.order_index as i64)
            .bind(&criterion.description)
            .bind(&criterion.rubric)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await?;
        Ok(())
    })
    .await
}

/// Get a session's criteria ordered by `order_index`
pub async fn get_criteria(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<Criterion>> {
    let rows = sqlx::query(
        r#"
        SELECT criterion_id, order_index, description, rubric
        FROM criteria
        WHERE session_id = ?
        ORDER BY order_index ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let criterion_id: String = row.get("criterion_id");
            let order_index: i64 = row.get("order_index");
            Ok(Criterion {
                criterion_id: parse_uuid("criterion_id", &criterion_id)?,
                description: row.get("description"),
                rubric: row.get("rubric"),
                order_index: u32::try_from(order_index).map_err(|_| {
                    Error::Internal(format!("Invalid order_index {} in database", order_index))
                })?,
            })
        })
        .collect()
}
