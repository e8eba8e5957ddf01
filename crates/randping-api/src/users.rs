use std::net::{IpAddr, SocketAddr};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap},
};

use randping_types::api::{
    CountryInfo, OkResponse, RegisterResponse, UpdateSubscriptionRequest, UserRequest,
};

use crate::AppState;
use crate::error::ApiError;

/// POST /user/register. Creates a provisional account located by client IP.
pub async fn register(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<RegisterResponse>, ApiError> {
    let ip = client_ip(req.headers(), req.extensions(), state.trust_forwarded_for);
    let country = state.geo.country_for(ip);

    let account = state.accounts.create_account(country).await?;

    Ok(Json(RegisterResponse {
        user_id: account.user_id,
        country: CountryInfo::from(account.country.as_ref()),
    }))
}

/// POST /user/delete
pub async fn delete(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.accounts.delete_account(req.user_id).await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /user/update_notification_subscription_object
pub async fn update_subscription(
    State(state): State<AppState>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .accounts
        .set_notification_subscription(req.user_id, &req.subscription)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /user/finalize_creation. Succeeds only once a test notification
/// actually reached the stored subscription.
pub async fn finalize_creation(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.accounts.finalize_account(req.user_id).await?;
    Ok(Json(OkResponse::ok()))
}

fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
