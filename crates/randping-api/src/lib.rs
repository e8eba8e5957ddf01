pub mod error;
pub mod info;
pub mod pings;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use randping_core::geo::CountryLookup;
use randping_core::{Accounts, PingEngine};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub accounts: Accounts,
    pub pings: PingEngine,
    pub geo: Arc<dyn CountryLookup>,
    /// VAPID public key handed to browsers for `pushManager.subscribe`.
    pub public_key: String,
    /// Take the client address from `X-Forwarded-For` (behind a reverse proxy).
    pub trust_forwarded_for: bool,
}

/// All routes of the service, without transport layers (CORS, tracing).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/info", get(info::get_info))
        .route("/health", get(info::health))
        .route("/user/register", post(users::register))
        .route("/user/delete", post(users::delete))
        .route(
            "/user/update_notification_subscription_object",
            post(users::update_subscription),
        )
        .route("/user/finalize_creation", post(users::finalize_creation))
        .route("/ping/random", post(pings::random))
        .route("/ping/reply", post(pings::reply))
        .with_state(state)
}
