//! groupsight-live library interface
//!
//! Live assessment of group discussions against a session rubric. Exposes
//! the router and services for the binary and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use groupsight_common::config::TomlConfig;
use groupsight_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{
    AssessmentService, BroadcastCoordinator, EventBusTransport, Oracle, Transport,
};

/// Event bus capacity; slow SSE clients past this lag and skip events
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub service: AssessmentService,
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire the assessment service onto the event bus transport
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        oracle: Arc<dyn Oracle>,
        config: TomlConfig,
    ) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(EventBusTransport::new(event_bus.clone()));
        let coordinator = BroadcastCoordinator::new(
            Arc::clone(&transport),
            event_bus.clone(),
            config.broadcast.retry_interval(),
            config.broadcast.deadline(),
        );
        let service = AssessmentService::new(
            db.clone(),
            event_bus.clone(),
            oracle,
            transport,
            coordinator,
        );

        Self {
            db,
            event_bus,
            service,
            config: Arc::new(config),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for `/health` diagnostics
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::session_routes())
        .merge(api::recording_routes())
        .merge(api::group_routes())
        .merge(api::sse_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
