use randping_db::DbError;
use thiserror::Error;

use crate::push::PushError;

/// Outcome of a rejected account or ping operation. The `Display` text is
/// what the client shows to the user.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("The server is busy, please try again in a moment.")]
    LockTimeout,

    #[error("User not found.")]
    UserNotFound,

    #[error("Ping not found.")]
    PingNotFound,

    #[error("The recipient of this ping no longer exists.")]
    RecipientNotFound,

    #[error("You must wait before sending another ping. ({0}s)")]
    Cooldown(i64),

    #[error("You have already replied to this ping.")]
    AlreadyReplied,

    #[error("Subscription object is too large ({size} bytes, max {max}).")]
    SubscriptionTooLarge { size: usize, max: usize },

    #[error("Could not deliver the test notification: {0}")]
    DeliveryFailed(#[from] PushError),

    #[error("Your account has not been finalized yet.")]
    SenderNotFinalized,

    #[error("Nobody is available to receive a ping right now.")]
    NoEligibleRecipient,

    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl ServiceError {
    /// Business-rule rejections and lock contention, as opposed to
    /// storage faults the client can do nothing about.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::LockTimeout(_) => Self::LockTimeout,
            other => Self::Storage(other),
        }
    }
}
