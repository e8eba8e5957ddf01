use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use randping_core::ServiceError;
use randping_types::api::ErrorResponse;

/// Handler error. Rule violations are a normal 200 answer with
/// `{ok: false, error}` so the client can show the message; only storage
/// faults become a 500.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_user_facing() {
            (StatusCode::OK, self.0.to_string())
        } else {
            error!("Internal error: {}", self.0);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
