//! Plant record API handlers

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::db::plants::{self, PlantRecord};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /plants
pub async fn list_plants(State(state): State<AppState>) -> ApiResult<Json<Vec<PlantRecord>>> {
    Ok(Json(plants::list_plants(&state.db).await?))
}

/// GET /plants/:id
pub async fn get_plant(
    State(state): State<AppState>,
    Path(plant_id): Path<Uuid>,
) -> ApiResult<Json<PlantRecord>> {
    plants::load_plant(&state.db, plant_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Plant {}", plant_id)))
}

pub fn plant_routes() -> Router<AppState> {
    Router::new()
        .route("/plants", get(list_plants))
        .route("/plants/:id", get(get_plant))
}
