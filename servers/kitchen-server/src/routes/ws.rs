//! WebSocket push-channel route.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::services::push;
use crate::state::AppState;

/// Create the push-channel router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(upgrade))
}

async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        push::handle_socket(state.push.clone(), state.service.clone(), socket)
    })
}
