//! Runtime configuration resolution for groupsight-live
//!
//! Oracle API key priority: Database → ENV → TOML. Whichever source wins,
//! a warning is logged when more than one source holds a key.

use groupsight_common::config::TomlConfig;
use groupsight_common::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::{DisabledOracle, HttpOracle, Oracle};

/// Environment variable holding the oracle API key
pub const ORACLE_API_KEY_ENV_VAR: &str = "GROUPSIGHT_ORACLE_API_KEY";

/// Resolve the oracle API key from the 3-tier configuration
///
/// A missing key is not an error: local oracle endpoints often need none.
pub async fn resolve_oracle_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_oracle_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(ORACLE_API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .oracle
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Oracle API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Oracle API key loaded from database");
        return Ok(Some(key));
    }
    if let Some(key) = env_key {
        info!("Oracle API key loaded from environment variable");
        return Ok(Some(key));
    }
    if let Some(key) = toml_key {
        info!("Oracle API key loaded from TOML config");
        return Ok(Some(key));
    }

    Ok(None)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Build the oracle from configuration
///
/// Without an endpoint every round is a logged no-op round.
pub async fn build_oracle(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Arc<dyn Oracle>> {
    let Some(endpoint) = toml_config
        .oracle
        .endpoint
        .as_deref()
        .filter(|e| !e.trim().is_empty())
    else {
        warn!("No oracle endpoint configured; transcript rounds will not produce evidence");
        return Ok(Arc::new(DisabledOracle));
    };

    let api_key = resolve_oracle_api_key(db, toml_config).await?;
    let oracle = HttpOracle::new(endpoint, &toml_config.oracle, api_key)
        .map_err(|e| groupsight_common::Error::Config(format!("Oracle client: {}", e)))?;

    info!(
        endpoint = %endpoint,
        model = %toml_config.oracle.model,
        "Oracle configured"
    );
    Ok(Arc::new(oracle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use serial_test::serial;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[tokio::test]
    #[serial]
    async fn test_database_key_wins() {
        let db = memory_pool().await;
        crate::db::settings::set_oracle_api_key(&db, "from-db".to_string())
            .await
            .unwrap();
        std::env::set_var(ORACLE_API_KEY_ENV_VAR, "from-env");

        let mut config = TomlConfig::default();
        config.oracle.api_key = Some("from-toml".to_string());

        let key = resolve_oracle_api_key(&db, &config).await.unwrap();
        std::env::remove_var(ORACLE_API_KEY_ENV_VAR);

        assert_eq!(key.as_deref(), Some("from-db"));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_beats_toml() {
        let db = memory_pool().await;
        std::env::set_var(ORACLE_API_KEY_ENV_VAR, "from-env");

        let mut config = TomlConfig::default();
        config.oracle.api_key = Some("from-toml".to_string());

        let key = resolve_oracle_api_key(&db, &config).await.unwrap();
        std::env::remove_var(ORACLE_API_KEY_ENV_VAR);

        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    #[serial]
    async fn test_blank_keys_ignored() {
        let db = memory_pool().await;
        std::env::set_var(ORACLE_API_KEY_ENV_VAR, "  ");

        let mut config = TomlConfig::default();
        config.oracle.api_key = Some("from-toml".to_string());

        let key = resolve_oracle_api_key(&db, &config).await.unwrap();
        std::env::remove_var(ORACLE_API_KEY_ENV_VAR);

        assert_eq!(key.as_deref(), Some("from-toml"));
    }

    #[tokio::test]
    #[serial]
    async fn test_no_key_anywhere() {
        let db = memory_pool().await;
        std::env::remove_var(ORACLE_API_KEY_ENV_VAR);
        let key = resolve_oracle_api_key(&db, &TomlConfig::default()).await.unwrap();
        assert!(key.is_none());
    }
}
