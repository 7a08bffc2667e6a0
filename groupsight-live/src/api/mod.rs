//! HTTP API handlers for groupsight-live
//!
//! REST for session, group and recording operations plus SSE streams for
//! session owners and groups.

pub mod groups;
pub mod health;
pub mod recording;
pub mod sessions;
pub mod sse;

pub use groups::group_routes;
pub use health::health_routes;
pub use recording::recording_routes;
pub use sessions::session_routes;
pub use sse::sse_routes;
