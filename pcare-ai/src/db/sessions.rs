//! Import session database operations
//!
//! Every state transition is written as one guarded row update:
//! `UPDATE ... WHERE session_id = ? AND status = <status before the step>`.
//! Zero rows affected means the session was deleted (or moved on) underneath
//! the writer, and the caller must stop instead of re-inserting it.

use chrono::{DateTime, Utc};
use pcare_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::settings::get_max_lock_wait_ms;
use crate::models::{ImportSession, SessionStatus};
use crate::utils::retry_on_lock;

/// Message stored on sessions interrupted by a restart
pub const RESTART_MESSAGE: &str = "Import interrupted: pcare-ai was restarted";

const SELECT_COLUMNS: &str = r#"
    SELECT session_id, status, image_url, identified_species, scientific_name,
           confidence, suggestions, care_sources, care_profile, error_message,
           plant_id, created_at, updated_at
    FROM import_sessions
"#;

fn to_json<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn from_json<T: DeserializeOwned>(value: &str, what: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", what, e)))
}

fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", what, e)))
}

/// Column values of one session, prepared before touching the database
struct SessionRow {
    session_id: String,
    status: &'static str,
    image_url: String,
    identified_species: Option<String>,
    scientific_name: Option<String>,
    confidence: Option<f64>,
    suggestions: Option<String>,
    care_sources: String,
    care_profile: Option<String>,
    error_message: Option<String>,
    plant_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_session(session: &ImportSession) -> Result<Self> {
        Ok(Self {
            session_id: session.session_id.to_string(),
            status: session.status.as_str(),
            image_url: session.image_url.clone(),
            identified_species: session.identified_species.clone(),
            scientific_name: session.scientific_name.clone(),
            confidence: session.confidence,
            suggestions: session
                .suggestions
                .as_ref()
                .map(|s| to_json(s, "suggestions"))
                .transpose()?,
            care_sources: to_json(&session.care_sources, "care_sources")?,
            care_profile: session
                .care_profile
                .as_ref()
                .map(|p| to_json(p, "care_profile"))
                .transpose()?,
            error_message: session.error_message.clone(),
            plant_id: session.plant_id.map(|id| id.to_string()),
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
        })
    }
}

fn session_from_row(row: &SqliteRow) -> Result<ImportSession> {
    let session_id: String = row.get("session_id");
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|e| Error::Internal(format!("Failed to parse session_id: {}", e)))?;

    let status: String = row.get("status");
    let status: SessionStatus = status.parse().map_err(Error::Internal)?;

    let suggestions: Option<String> = row.get("suggestions");
    let care_sources: String = row.get("care_sources");
    let care_profile: Option<String> = row.get("care_profile");

    let plant_id: Option<String> = row.get("plant_id");
    let plant_id = plant_id
        .map(|id| Uuid::parse_str(&id))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse plant_id: {}", e)))?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(ImportSession {
        session_id,
        status,
        image_url: row.get("image_url"),
        identified_species: row.get("identified_species"),
        scientific_name: row.get("scientific_name"),
        confidence: row.get("confidence"),
        suggestions: suggestions
            .map(|s| from_json(&s, "suggestions"))
            .transpose()?,
        care_sources: from_json(&care_sources, "care_sources")?,
        care_profile: care_profile
            .map(|p| from_json(&p, "care_profile"))
            .transpose()?,
        error_message: row.get("error_message"),
        plant_id,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Insert a new session
pub async fn create_session(pool: &SqlitePool, session: &ImportSession) -> Result<()> {
    // Prepare all data BEFORE acquiring database connection
    let row = SessionRow::from_session(session)?;
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    retry_on_lock("create_session", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO import_sessions (
                session_id, status, image_url, identified_species, scientific_name,
                confidence, suggestions, care_sources, care_profile, error_message,
                plant_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.session_id)
        .bind(row.status)
        .bind(&row.image_url)
        .bind(&row.identified_species)
        .bind(&row.scientific_name)
        .bind(row.confidence)
        .bind(&row.suggestions)
        .bind(&row.care_sources)
        .bind(&row.care_profile)
        .bind(&row.error_message)
        .bind(&row.plant_id)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    })
    .await
}

/// Persist a transition of an existing session
///
/// Only updates the row while it is still in `expected` status. Returns
/// `false` when no row matched, i.e. the session is gone or another writer
/// already moved it.
///
/// Uses retry_on_lock to handle transient database lock contention.
pub async fn save_session(
    pool: &SqlitePool,
    session: &ImportSession,
    expected: SessionStatus,
) -> Result<bool> {
    let row = SessionRow::from_session(session)?;
    let expected = expected.as_str();
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    let rows_affected = retry_on_lock("save_session", max_wait_ms, || async {
        let result = sqlx::query(
            r#"
            UPDATE import_sessions SET
                status = ?,
                identified_species = ?,
                scientific_name = ?,
                confidence = ?,
                suggestions = ?,
                care_sources = ?,
                care_profile = ?,
                error_message = ?,
                plant_id = ?,
                updated_at = ?
            WHERE session_id = ? AND status = ?
            "#,
        )
        .bind(row.status)
        .bind(&row.identified_species)
        .bind(&row.scientific_name)
        .bind(row.confidence)
        .bind(&row.suggestions)
        .bind(&row.care_sources)
        .bind(&row.care_profile)
        .bind(&row.error_message)
        .bind(&row.plant_id)
        .bind(&row.updated_at)
        .bind(&row.session_id)
        .bind(expected)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    })
    .await?;

    Ok(rows_affected > 0)
}

/// Load import session from database
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<ImportSession>> {
    let row = sqlx::query(&format!("{} WHERE session_id = ?", SELECT_COLUMNS))
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Delete import session from database
///
/// Returns `false` if no such session existed.
pub async fn delete_session(pool: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM import_sessions WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent sessions, newest first
pub async fn list_sessions(pool: &SqlitePool, limit: u32) -> Result<Vec<ImportSession>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY created_at DESC LIMIT ?",
        SELECT_COLUMNS
    ))
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter().map(session_from_row).collect()
}

/// Fail sessions orphaned by a previous run
///
/// Sessions in a background-driven state (uploading, identifying, researching,
/// comparing) had their task die with the process and will never progress.
/// Sessions waiting on the user (needs_selection, confirming) are left alone.
pub async fn cleanup_stale_sessions(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE import_sessions
        SET status = 'failed',
            error_message = ?,
            updated_at = ?
        WHERE status IN ('uploading', 'identifying', 'researching', 'comparing')
        "#,
    )
    .bind(RESTART_MESSAGE)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
