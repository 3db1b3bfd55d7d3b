//! teamatlas-engine - Team data fusion service
//!
//! Serves fused per-country team datasets over HTTP and keeps them fresh with
//! the background update scheduler.
//!
//! Usage: `teamatlas-engine [ROOT_FOLDER]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use teamatlas_common::config::{
    default_config_path, RootFolderInitializer, RootFolderResolver, TeamAtlasConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use teamatlas_engine::{AppState, TeamAtlas};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = default_config_path();
    let config = TeamAtlasConfig::load_or_default(config_path.as_deref());

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting teamatlas-engine");
    info!(
        "Version: {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Step 1: Resolve root folder (CLI → ENV → TOML → default)
    let cli_root = std::env::args().nth(1).map(PathBuf::from);
    let root_folder = RootFolderResolver::new(&config).with_cli_arg(cli_root).resolve();

    // Step 2: Create root folder directory if missing
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = teamatlas_engine::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 4: Engine and background tasks
    let atlas = Arc::new(TeamAtlas::from_config(&config, Some(db_pool))?);
    let background = atlas.start_background();

    let app = teamatlas_engine::build_router(AppState::new(Arc::clone(&atlas)));

    let bind = config.server.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    background.shutdown().await;
    Ok(())
}
