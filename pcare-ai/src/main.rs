//! pcare-ai - Plant Identification & Care Research service
//!
//! **Module Identity:**
//! - Name: pcare-ai
//! - Default port: 5740
//!
//! Identifies a plant from a photo by consensus across several vision
//! providers, researches its care requirements from web sources, and records
//! the consolidated care profile once confirmed.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pcare_ai::AppState;
use pcare_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};

const MODULE_NAME: &str = "pcare-ai";
const DEFAULT_PORT: u16 = 5740;

#[derive(Debug, Parser)]
#[command(name = "pcare-ai", version, about = "Plant identification and care research service")]
struct Args {
    /// Root folder holding the database (overrides env and TOML)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// HTTP port (overrides TOML)
    #[arg(long, env = "PCARE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config(MODULE_NAME);

    // RUST_LOG wins over the TOML level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);

    info!("Starting pcare-ai (Plant Identification & Care Research)");
    info!(
        "Version: {} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Step 1: Resolve root folder
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .resolve();

    // Step 2: Create root folder directory if missing
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = pcare_ai::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 4: Sessions left mid-pipeline by a previous run can never finish
    let stale = pcare_ai::db::sessions::cleanup_stale_sessions(&db_pool).await?;
    if stale > 0 {
        warn!(count = stale, "Marked interrupted import sessions as failed");
    }

    // Step 5: Assemble providers and pipeline
    let orchestrator = pcare_ai::config::build_orchestrator(&db_pool, &toml_config)
        .await
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let state = AppState::new(db_pool, orchestrator);
    let app = pcare_ai::build_router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
