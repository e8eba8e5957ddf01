use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use randping_db::models::UserRow;
use randping_db::{Database, queries};
use randping_types::models::CountryCode;
use randping_types::notification::NotificationPayload;

use crate::error::ServiceError;
use crate::notification::WELCOME_TEXT;
use crate::push::{PushTransport, parse_subscription};

/// Largest serialized subscription object we store.
pub const MAX_SUBSCRIPTION_BYTES: usize = 1200;

/// Time-to-live handed to the push service for every notification.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub country: Option<CountryCode>,
}

/// Account lifecycle: provisional creation, finalization through a test
/// notification, subscription updates and deletion.
#[derive(Clone)]
pub struct Accounts {
    db: Database,
    transport: Arc<dyn PushTransport>,
    notification_ttl: Duration,
}

impl Accounts {
    pub fn new(db: Database, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            db,
            transport,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }

    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    pub async fn create_account(&self, country: Option<CountryCode>) -> Result<NewAccount, ServiceError> {
        let user_id = Uuid::new_v4();
        let id = user_id.to_string();
        let iso = country.as_ref().map(|c| c.to_string());

        self.db
            .with_transaction(move |tx| queries::insert_user(tx, &id, iso.as_deref()))
            .await?;

        info!(%user_id, country = ?country.as_ref().map(|c| c.as_str()), "Account created");
        Ok(NewAccount { user_id, country })
    }

    /// Remove the account. Deleting an unknown id is not an error; the
    /// return value tells whether a row was actually removed.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let id = user_id.to_string();
        let removed = self
            .db
            .with_transaction(move |tx| queries::delete_user(tx, &id))
            .await?;

        if removed > 0 {
            info!(%user_id, "Account deleted");
        }
        Ok(removed > 0)
    }

    pub async fn account(&self, user_id: Uuid) -> Result<Option<UserRow>, ServiceError> {
        let id = user_id.to_string();
        Ok(self
            .db
            .with_transaction(move |tx| queries::get_user(tx, &id))
            .await?)
    }

    pub async fn set_notification_subscription(
        &self,
        user_id: Uuid,
        subscription: &serde_json::Value,
    ) -> Result<(), ServiceError> {
        let serialized = subscription.to_string();
        if serialized.len() > MAX_SUBSCRIPTION_BYTES {
            return Err(ServiceError::SubscriptionTooLarge {
                size: serialized.len(),
                max: MAX_SUBSCRIPTION_BYTES,
            });
        }

        let id = user_id.to_string();
        let updated = self
            .db
            .with_transaction(move |tx| queries::set_subscription(tx, &id, &serialized))
            .await?;

        if updated == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    /// Prove the stored subscription works by delivering a welcome
    /// notification, then mark the account finalized.
    ///
    /// A failed delivery leaves the account provisional; it is not deleted.
    pub async fn finalize_account(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let id = user_id.to_string();
        let user = self
            .db
            .with_transaction(move |tx| queries::get_user(tx, &id))
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        // Deliver without holding the store lock.
        let subscription = parse_subscription(user.notification_subscription.as_deref())?;
        let payload = NotificationPayload::standalone(WELCOME_TEXT);
        if let Err(e) = self
            .transport
            .deliver(&subscription, &payload, self.notification_ttl)
            .await
        {
            warn!(%user_id, error = %e, "Welcome notification failed, account stays provisional");
            return Err(ServiceError::DeliveryFailed(e));
        }

        let id = user_id.to_string();
        let updated = self
            .db
            .with_transaction(move |tx| queries::mark_finalized(tx, &id))
            .await?;

        if updated == 0 {
            // Deleted while the welcome notification was in flight
            return Err(ServiceError::UserNotFound);
        }

        info!(%user_id, "Account finalized");
        Ok(())
    }
}

