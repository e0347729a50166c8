//! Queue routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::KitchenError;
use store::models::{Order, WorkflowOptimization};

use crate::services::QueueOverview;
use crate::state::AppState;

/// Create the queue router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(queue_status))
        .route("/next", get(next_order))
        .route("/optimize", post(optimize))
}

/// Current queue status with overdue orders and the next candidate.
#[utoipa::path(
    get,
    path = "/api/v1/queue/status",
    tag = "Queue",
    responses((status = 200, description = "Derived queue status", body = QueueOverview))
)]
pub async fn queue_status(State(state): State<AppState>) -> Result<Json<QueueOverview>, KitchenError> {
    state.service.queue_overview().await.map(Json)
}

/// The next ready order, or null when nothing is ready.
#[utoipa::path(
    get,
    path = "/api/v1/queue/next",
    tag = "Queue",
    responses((status = 200, description = "Next ready order, or null when none is ready"))
)]
pub async fn next_order(State(state): State<AppState>) -> Json<Option<Order>> {
    Json(state.service.next_order().await)
}

/// Run the workflow optimizer over the queue.
#[utoipa::path(
    post,
    path = "/api/v1/queue/optimize",
    tag = "Queue",
    responses(
        (status = 200, description = "Persisted workflow plan", body = WorkflowOptimization),
        (status = 422, description = "Queue is empty", body = common::ErrorResponse)
    )
)]
pub async fn optimize(
    State(state): State<AppState>,
) -> Result<Json<WorkflowOptimization>, KitchenError> {
    state.service.optimize_queue().await.map(Json)
}
