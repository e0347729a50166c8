//! Kitchen server library surface, exposed for integration tests.

pub mod routes;
pub mod services;
pub mod state;

use axum::{
    http,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router over `state`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1/equipment", routes::equipment::router())
        .nest("/api/v1/staff", routes::staff::router())
        .nest("/api/v1/orders", routes::orders::router())
        .nest("/api/v1/queue", routes::queue::router())
        .nest("/api/v1/analytics", routes::analytics::router())
        .nest("/ws", routes::ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::PATCH,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers(Any),
        )
        .with_state(state)
}
