use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::CountryCode;

// -- Info --

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub public_key: String,
    /// Seconds a user must wait between two pings.
    pub ping_cooldown: u64,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub country: CountryInfo,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountryInfo {
    pub iso: Option<String>,
    pub emoji: Option<String>,
}

impl From<Option<&CountryCode>> for CountryInfo {
    fn from(country: Option<&CountryCode>) -> Self {
        match country {
            Some(code) => Self {
                iso: Some(code.to_string()),
                emoji: Some(code.flag_emoji()),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSubscriptionRequest {
    pub user_id: Uuid,
    /// Opaque push subscription object as produced by the browser.
    pub subscription: serde_json::Value,
}

// -- Pings --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomPingRequest {
    pub user_id: Uuid,
    #[serde(default = "default_display_country")]
    pub display_country_of_origin: bool,
}

fn default_display_country() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyPingRequest {
    pub user_id: Uuid,
    pub reply_to: Uuid,
}

// -- Outcomes --

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
