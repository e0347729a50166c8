//! Staff routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use common::{KitchenError, StationType};
use serde::Deserialize;
use store::models::{CreateStaff, Staff, StaffQuery};
use utoipa::ToSchema;

use crate::state::AppState;

/// Create the staff router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_staff).get(list_staff))
        .route("/:id", get(get_staff))
        .route("/:id/availability", patch(update_availability))
        .route("/:id/skill", patch(update_skill))
}

/// List staff query.
#[derive(Debug, Deserialize)]
pub struct ListStaffQuery {
    pub specialization: Option<StationType>,
    pub available_only: Option<bool>,
    pub min_skill: Option<f64>,
}

/// Availability update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAvailabilityRequest {
    pub is_available: bool,
}

/// Skill update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSkillRequest {
    pub skill_level: f64,
}

async fn create_staff(
    State(state): State<AppState>,
    Json(payload): Json<CreateStaff>,
) -> Result<(StatusCode, Json<Staff>), KitchenError> {
    let staff = state.service.create_staff(payload).await?;
    Ok((StatusCode::CREATED, Json(staff)))
}

async fn list_staff(
    State(state): State<AppState>,
    Query(query): Query<ListStaffQuery>,
) -> Result<Json<Vec<Staff>>, KitchenError> {
    state
        .service
        .list_staff(&StaffQuery {
            specialization: query.specialization,
            available_only: query.available_only,
            min_skill: query.min_skill,
        })
        .await
        .map(Json)
}

async fn get_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Staff>, KitchenError> {
    state.service.get_staff(&id).await.map(Json)
}

async fn update_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Staff>, KitchenError> {
    state
        .service
        .update_staff_availability(&id, payload.is_available)
        .await
        .map(Json)
}

async fn update_skill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSkillRequest>,
) -> Result<Json<Staff>, KitchenError> {
    state
        .service
        .update_staff_skill(&id, payload.skill_level)
        .await
        .map(Json)
}
