//! groupsight-live - Live group assessment service
//!
//! Accepts rolling transcripts from discussion groups, matches them against
//! the session rubric and pushes progress to the session owner and groups
//! over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use groupsight_common::config::{
    database_path, load_toml_config, resolve_config_path, resolve_data_folder,
};
use groupsight_common::events::EventBus;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groupsight_live::{AppState, EVENT_BUS_CAPACITY};

#[derive(Parser, Debug)]
#[command(name = "groupsight-live")]
#[command(about = "Live group assessment service for GroupSight")]
#[command(version)]
struct Args {
    /// Configuration file (overrides GROUPSIGHT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(short, long, env = "GROUPSIGHT_PORT")]
    port: Option<u16>,

    /// Data folder holding the database
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Database file (overrides the data folder)
    #[arg(long, env = "GROUPSIGHT_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "GROUPSIGHT_BIND")]
    bind: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "groupsight_live={level},groupsight_common={level},tower_http=info",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting groupsight-live v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    let db_path = match args.database {
        Some(path) => path,
        None => database_path(&resolve_data_folder(args.data_folder.as_deref(), &toml_config)),
    };
    info!("Database: {}", db_path.display());

    let db_pool = groupsight_live::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let oracle = groupsight_live::config::build_oracle(&db_pool, &toml_config)
        .await
        .context("Failed to configure oracle")?;

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let port = args.port.unwrap_or(toml_config.port);

    let state = AppState::new(db_pool, event_bus, oracle, toml_config);
    let app = groupsight_live::build_router(state);

    let addr = SocketAddr::new(args.bind, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
