//! Clock helpers
//!
//! Every persisted timestamp is UTC and stored as RFC 3339 text.

use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Uptime in whole seconds for `/health`; never negative under clock skew
pub fn elapsed_seconds(since: DateTime<Utc>) -> u64 {
    now().signed_duration_since(since).num_seconds().max(0) as u64
}
