use axum::{Json, extract::State, response::IntoResponse};

use randping_types::api::InfoResponse;

use crate::AppState;

/// GET /info: what the client needs before subscribing to push.
pub async fn get_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        public_key: state.public_key.clone(),
        ping_cooldown: state.pings.cooldown().as_secs(),
    })
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
