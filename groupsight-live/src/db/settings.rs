//! Settings database operations
//!
//! Key-value accessors for the `settings` table.

use groupsight_common::{Error, Result};
use sqlx::{Pool, Sqlite};

const ORACLE_API_KEY: &str = "oracle_api_key";
const MAX_LOCK_WAIT_MS: &str = "max_lock_wait_ms";
const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Get the oracle API key stored in the database
///
/// **Returns:** Some(key) if set, None otherwise
pub async fn get_oracle_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, ORACLE_API_KEY).await
}

pub async fn set_oracle_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, ORACLE_API_KEY, key).await
}

/// Upper bound on lock-retry time for writes
///
/// **Default:** 5000ms
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, MAX_LOCK_WAIT_MS)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS))
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await
            .map_err(Error::Database)?;

    match value.flatten() {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn test_oracle_api_key_roundtrip() {
        let db = memory_pool().await;

        assert_eq!(get_oracle_api_key(&db).await.unwrap(), None);

        set_oracle_api_key(&db, "sk-test".to_string()).await.unwrap();
        assert_eq!(get_oracle_api_key(&db).await.unwrap(), Some("sk-test".to_string()));

        set_oracle_api_key(&db, "sk-other".to_string()).await.unwrap();
        assert_eq!(get_oracle_api_key(&db).await.unwrap(), Some("sk-other".to_string()));
    }

    #[tokio::test]
    async fn test_max_lock_wait_default_seeded() {
        let db = memory_pool().await;
        assert_eq!(get_max_lock_wait_ms(&db).await.unwrap(), 5000);
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let db = memory_pool().await;
        set_setting(&db, MAX_LOCK_WAIT_MS, "soon").await.unwrap();

        let result = get_max_lock_wait_ms(&db).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
