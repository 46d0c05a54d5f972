//! Database access for pcare-ai
//!
//! SQLite database in the root folder holding sessions, finished plant
//! records and settings.

pub mod plants;
pub mod sessions;
pub mod settings;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to `pcare.db` in the root folder, creating it if needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with all tables, for tests and dry runs
///
/// Pinned to a single connection that never expires; each new SQLite memory
/// connection would otherwise see an empty database.
pub async fn init_in_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create pcare-ai tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_sessions (
            session_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            image_url TEXT NOT NULL,
            identified_species TEXT,
            scientific_name TEXT,
            confidence REAL,
            suggestions TEXT,
            care_sources TEXT NOT NULL DEFAULT '[]',
            care_profile TEXT,
            error_message TEXT,
            plant_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plants (
            plant_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            common_name TEXT NOT NULL,
            scientific_name TEXT NOT NULL,
            identification_confidence REAL,
            watering_days INTEGER NOT NULL,
            fertilizing_days INTEGER NOT NULL,
            sunlight_level TEXT NOT NULL,
            humidity TEXT NOT NULL,
            temperature_range TEXT NOT NULL,
            care_notes TEXT NOT NULL,
            image_url TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, import_sessions, plants)");

    Ok(())
}
