//! Database row types. These map directly to SQLite rows and stay
//! independent of the HTTP models in randping-types.

use randping_types::models::PingState;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub creation_finalized: bool,
    pub country: Option<String>,
    pub notification_subscription: Option<String>,
    pub next_allowed_ping_timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct PingRow {
    pub id: String,
    pub from_user: Option<String>,
    pub to_user: Option<String>,
    pub reply_to: Option<String>,
    pub display_country_of_origin: bool,
    pub timestamp: i64,
    pub state: PingState,
}

pub struct NewPing<'a> {
    pub id: &'a str,
    pub from_user: &'a str,
    pub to_user: &'a str,
    pub reply_to: Option<&'a str>,
    pub display_country_of_origin: bool,
    pub timestamp: i64,
}

/// A waiting ping joined with what the dispatcher needs to deliver it.
#[derive(Debug, Clone)]
pub struct WaitingPing {
    pub id: String,
    pub to_user: Option<String>,
    pub reply_to: Option<String>,
    pub display_country_of_origin: bool,
    pub sender_country: Option<String>,
    pub recipient_subscription: Option<String>,
}
