pub mod accounts;
pub mod dispatcher;
pub mod error;
pub mod geo;
pub mod notification;
pub mod pings;
pub mod push;

pub use accounts::Accounts;
pub use dispatcher::{DispatchQueue, DispatchTrigger, Dispatcher};
pub use error::ServiceError;
pub use pings::{PingEngine, PingRequest};

/// Current time as epoch seconds.
pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
