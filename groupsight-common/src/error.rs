//! Error type shared by the GroupSight store, configuration and services
//!
//! HTTP status mapping lives in the service crate; variants here only say
//! what went wrong.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite failure, including lock contention that outlived the retry budget
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable TOML bootstrap file or unusable oracle settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown session (or other addressed record)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected request: blank title or criterion, or an ended session
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn session_not_found(session_id: Uuid) -> Self {
        Error::NotFound(format!("session {}", session_id))
    }

    pub fn session_ended(session_id: Uuid) -> Self {
        Error::InvalidInput(format!("session {} has ended", session_id))
    }
}
