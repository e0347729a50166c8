//! Order routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use common::{KitchenError, OrderPriority, OrderStatus};
use serde::Deserialize;
use store::models::{CreateOrder, Order};
use utoipa::ToSchema;

use crate::state::AppState;

/// Create the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(add_order))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_status))
        .route("/:id/priority", patch(update_priority))
        .route("/:id/assign", post(assign_to_staff))
        .route("/:id/start", post(start_order))
        .route("/:id/complete", post(complete_order))
}

/// Status update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Priority update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderPriorityRequest {
    pub priority: OrderPriority,
}

/// Assignment request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignOrderRequest {
    pub staff_id: String,
}

/// Add an order to the queue.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "Orders",
    request_body = CreateOrder,
    responses(
        (status = 201, description = "Order queued", body = Order),
        (status = 400, description = "Invalid order", body = common::ErrorResponse),
        (status = 409, description = "Duplicate order id", body = common::ErrorResponse)
    )
)]
pub async fn add_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrder>,
) -> Result<(StatusCode, Json<Order>), KitchenError> {
    let order = state.service.add_order(payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Fetch one order.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "Orders",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = Order),
        (status = 404, description = "Unknown order", body = common::ErrorResponse)
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, KitchenError> {
    state.service.get_order(&id).await.map(Json)
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, KitchenError> {
    state
        .service
        .update_order_status(&id, payload.status)
        .await
        .map(Json)
}

async fn update_priority(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderPriorityRequest>,
) -> Result<Json<Order>, KitchenError> {
    state
        .service
        .update_order_priority(&id, payload.priority)
        .await
        .map(Json)
}

async fn assign_to_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AssignOrderRequest>,
) -> Result<Json<Order>, KitchenError> {
    state
        .service
        .assign_order_to_staff(&id, &payload.staff_id)
        .await
        .map(Json)
}

async fn start_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, KitchenError> {
    state.service.start_order(&id).await.map(Json)
}

async fn complete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, KitchenError> {
    state.service.complete_order(&id).await.map(Json)
}
