//! Analytics routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use common::KitchenError;
use serde::Deserialize;

use crate::services::{KitchenMetrics, PerformanceReport};
use crate::state::AppState;

/// Create the analytics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(kitchen_metrics))
        .route("/performance", get(performance_report))
}

/// Optional reporting window; defaults to the last 24 hours.
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

async fn kitchen_metrics(
    State(state): State<AppState>,
) -> Result<Json<KitchenMetrics>, KitchenError> {
    state.service.kitchen_metrics().await.map(Json)
}

async fn performance_report(
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<PerformanceReport>, KitchenError> {
    state
        .service
        .performance_report(period.from, period.to)
        .await
        .map(Json)
}
