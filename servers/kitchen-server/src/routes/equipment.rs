//! Equipment routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use common::{EquipmentStatus, KitchenError, StationType};
use serde::Deserialize;
use store::models::{CreateEquipment, Equipment, EquipmentQuery};
use utoipa::ToSchema;

use crate::state::AppState;

/// Create the equipment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_equipment).get(list_equipment))
        .route("/:id", get(get_equipment))
        .route("/:id/status", patch(update_status))
        .route("/:id/maintenance", post(schedule_maintenance))
}

/// List equipment query.
#[derive(Debug, Deserialize)]
pub struct ListEquipmentQuery {
    pub station_type: Option<StationType>,
    pub status: Option<EquipmentStatus>,
    pub available_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<&ListEquipmentQuery> for EquipmentQuery {
    fn from(q: &ListEquipmentQuery) -> Self {
        EquipmentQuery {
            station_type: q.station_type,
            status: q.status,
            available_only: q.available_only,
            limit: q.limit,
            offset: q.offset,
        }
    }
}

/// Status update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEquipmentStatusRequest {
    pub status: EquipmentStatus,
}

async fn create_equipment(
    State(state): State<AppState>,
    Json(payload): Json<CreateEquipment>,
) -> Result<(StatusCode, Json<Equipment>), KitchenError> {
    let equipment = state.service.create_equipment(payload).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

async fn list_equipment(
    State(state): State<AppState>,
    Query(query): Query<ListEquipmentQuery>,
) -> Result<Json<Vec<Equipment>>, KitchenError> {
    state
        .service
        .list_equipment(&(&query).into())
        .await
        .map(Json)
}

async fn get_equipment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Equipment>, KitchenError> {
    state.service.get_equipment(&id).await.map(Json)
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateEquipmentStatusRequest>,
) -> Result<Json<Equipment>, KitchenError> {
    state
        .service
        .update_equipment_status(&id, payload.status)
        .await
        .map(Json)
}

async fn schedule_maintenance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Equipment>, KitchenError> {
    state
        .service
        .schedule_equipment_maintenance(&id)
        .await
        .map(Json)
}
