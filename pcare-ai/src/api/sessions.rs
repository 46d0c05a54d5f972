//! Import session API handlers
//!
//! POST /sessions, GET /sessions, GET /sessions/:id, POST /sessions/:id/select,
//! POST /sessions/:id/confirm, DELETE /sessions/:id
//!
//! Long-running stages are spawned; clients poll GET /sessions/:id.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::sessions;
use crate::error::{ApiError, ApiResult};
use crate::models::{ImportSession, SessionStatus};
use crate::types::SpeciesRef;
use crate::AppState;

/// Default page size for GET /sessions
const DEFAULT_LIST_LIMIT: u32 = 50;

/// POST /sessions request
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Photo location: http(s) URL, data URL or local path
    pub image_url: String,
}

/// Response for requests that start background work
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionAccepted {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

/// POST /sessions/:id/select request
#[derive(Debug, Deserialize)]
pub struct SelectSpeciesRequest {
    pub common_name: String,
    pub scientific_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<u32>,
}

/// POST /sessions
///
/// Create a session and start identification in the background.
/// Returns 202 Accepted with the session id.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionAccepted>)> {
    let image_url = request.image_url.trim();
    if image_url.is_empty() {
        return Err(ApiError::BadRequest("image_url is required".to_string()));
    }

    let session = state.orchestrator.create(image_url).await?;
    let accepted = SessionAccepted {
        session_id: session.session_id,
        status: session.status,
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.run_pipeline(session).await;
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<ImportSession>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(sessions::list_sessions(&state.db, limit).await?))
}

/// GET /sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ImportSession>> {
    sessions::load_session(&state.db, session_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Session {}", session_id)))
}

/// POST /sessions/:id/select
///
/// Only valid in `needs_selection`; research starts in the background.
pub async fn select_species(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectSpeciesRequest>,
) -> ApiResult<(StatusCode, Json<SessionAccepted>)> {
    if request.common_name.trim().is_empty() || request.scientific_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "common_name and scientific_name are required".to_string(),
        ));
    }

    let species = SpeciesRef::new(request.common_name.trim(), request.scientific_name.trim());
    let session = state.orchestrator.select(session_id, &species).await?;
    let accepted = SessionAccepted {
        session_id: session.session_id,
        status: session.status,
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.run_research(session).await;
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// POST /sessions/:id/confirm
///
/// Only valid in `confirming`; creates the plant record.
pub async fn confirm_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ImportSession>> {
    let session = state.orchestrator.confirm(session_id).await?;
    Ok(Json(session))
}

/// DELETE /sessions/:id
///
/// A pipeline still running for this session stops at its next transition.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !sessions::delete_session(&state.db, session_id).await? {
        return Err(ApiError::NotFound(format!("Session {}", session_id)));
    }

    info!(session_id = %session_id, "Import session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/select", post(select_species))
        .route("/sessions/:id/confirm", post(confirm_session))
}
