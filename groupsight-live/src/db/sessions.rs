//! Session database operations
//!
//! Sessions are created with their rubric, ended explicitly, and removed
//! only by whole-session cleanup.

use groupsight_common::{Error, Result, Session};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, settings};
use crate::utils::retry_on_lock;

/// Save a new session
pub async fn create_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    let session_id = session.session_id.to_string();
    let created_at = session.created_at.to_rfc3339();
    let ended_at = session.ended_at.map(|dt| dt.to_rfc3339());

    let max_wait_ms = settings::get_max_lock_wait_ms(pool).await?;

    retry_on_lock("create_session", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, title, context, created_at, ended_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(&session.title)
        .bind(&session.context)
        .bind(&created_at)
        .bind(&ended_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    })
    .await
}

/// Load a session by id
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, title, context, created_at, ended_at
        FROM sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let created_at: String = row.get("created_at");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(Some(Session {
        session_id,
        title: row.get("title"),
        context: row.get("context"),
        created_at: parse_timestamp("created_at", &created_at)?,
        ended_at: ended_at
            .map(|s| parse_timestamp("ended_at", &s))
            .transpose()?,
    }))
}

/// Mark a session ended
///
/// Returns false if the session does not exist. Ending twice keeps the
/// first end time.
pub async fn end_session(
    pool: &SqlitePool,
    session_id: Uuid,
    ended_at: chrono::DateTime<chrono::Utc>,
) -> Result<bool> {
    let session_id = session_id.to_string();
    let ended_at = ended_at.to_rfc3339();
    let max_wait_ms = settings::get_max_lock_wait_ms(pool).await?;

    retry_on_lock("end_session", max_wait_ms, || async {
        sqlx::query("UPDATE sessions SET ended_at = COALESCE(ended_at, ?) WHERE session_id = ?")
            .bind(&ended_at)
            .bind(&session_id)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sessions WHERE session_id = ?")
            .bind(&session_id)
            .fetch_optional(pool)
            .await
            .map_err(Error::Database)?;

        Ok(exists.is_some())
    })
    .await
}

/// Whole-session cleanup: progress, criteria and the session row
///
/// Returns false if the session did not exist.
pub async fn delete_session(pool: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let session_id = session_id.to_string();
    let max_wait_ms = settings::get_max_lock_wait_ms(pool).await?;

    retry_on_lock("delete_session", max_wait_ms, || async {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM assessment_progress WHERE session_id = ?")
            .bind(&session_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM criteria WHERE session_id = ?")
            .bind(&session_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(&session_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted > 0)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn test_create_and_load_session() {
        let pool = memory_pool().await;
        let session = Session::new("Titration lab", "Year 11 chemistry");

        create_session(&pool, &session).await.unwrap();

        let loaded = load_session(&pool, session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Titration lab");
        assert_eq!(loaded.context, "Year 11 chemistry");
        assert_eq!(loaded.created_at.timestamp(), session.created_at.timestamp());
        assert!(loaded.ended_at.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let pool = memory_pool().await;
        assert!(load_session(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_session_keeps_first_end_time() {
        let pool = memory_pool().await;
        let session = Session::new("Lab", "");
        create_session(&pool, &session).await.unwrap();

        let first = chrono::Utc::now();
        assert!(end_session(&pool, session.session_id, first).await.unwrap());
        let later = first + chrono::Duration::minutes(5);
        assert!(end_session(&pool, session.session_id, later).await.unwrap());

        let loaded = load_session(&pool, session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.ended_at.unwrap().timestamp(), first.timestamp());

        assert!(!end_session(&pool, Uuid::new_v4(), first).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_session() {
        let pool = memory_pool().await;
        assert!(!delete_session(&pool, Uuid::new_v4()).await.unwrap());
    }
}
