use axum::{Json, extract::State};

use randping_core::PingRequest;
use randping_types::api::{OkResponse, RandomPingRequest, ReplyPingRequest};

use crate::AppState;
use crate::error::ApiError;

/// POST /ping/random
pub async fn random(
    State(state): State<AppState>,
    Json(req): Json<RandomPingRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .pings
        .create_ping(PingRequest::random(req.user_id, req.display_country_of_origin))
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /ping/reply. The reply goes back to whoever sent `reply_to`.
pub async fn reply(
    State(state): State<AppState>,
    Json(req): Json<ReplyPingRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .pings
        .create_ping(PingRequest::reply(req.user_id, req.reply_to))
        .await?;
    Ok(Json(OkResponse::ok()))
}
