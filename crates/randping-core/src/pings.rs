use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use randping_db::models::NewPing;
use randping_db::{Connection, Database, queries};

use crate::dispatcher::DispatchTrigger;
use crate::error::ServiceError;
use crate::now_ts;

/// Minimum interval between two pings from the same user.
pub const DEFAULT_PING_COOLDOWN: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct PingRequest {
    pub from_user: Uuid,
    /// Explicit recipient. Ignored for replies, which always go back to the
    /// sender of the original ping.
    pub to_user: Option<Uuid>,
    pub reply_to: Option<Uuid>,
    pub display_country_of_origin: bool,
    pub ignore_reply_uniqueness: bool,
    pub ignore_cooldown: bool,
}

impl PingRequest {
    pub fn random(from_user: Uuid, display_country_of_origin: bool) -> Self {
        Self {
            from_user,
            to_user: None,
            reply_to: None,
            display_country_of_origin,
            ignore_reply_uniqueness: false,
            ignore_cooldown: false,
        }
    }

    pub fn reply(from_user: Uuid, reply_to: Uuid) -> Self {
        Self {
            reply_to: Some(reply_to),
            ..Self::random(from_user, true)
        }
    }

    pub fn to(mut self, to_user: Uuid) -> Self {
        self.to_user = Some(to_user);
        self
    }

    pub fn ignoring_cooldown(mut self) -> Self {
        self.ignore_cooldown = true;
        self
    }

    pub fn ignoring_reply_uniqueness(mut self) -> Self {
        self.ignore_reply_uniqueness = true;
        self
    }
}

/// Validates and records pings, then wakes the dispatcher.
#[derive(Clone)]
pub struct PingEngine {
    db: Database,
    trigger: DispatchTrigger,
    cooldown: Duration,
}

impl PingEngine {
    pub fn new(db: Database, trigger: DispatchTrigger) -> Self {
        Self {
            db,
            trigger,
            cooldown: DEFAULT_PING_COOLDOWN,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Create a ping in the `waiting` state and queue a dispatch pass.
    ///
    /// Reply lookup, uniqueness and cooldown checks, recipient selection,
    /// the insert and the cooldown update all run in one transaction.
    pub async fn create_ping(&self, req: PingRequest) -> Result<Uuid, ServiceError> {
        let ping_id = Uuid::new_v4();
        let cooldown = self.cooldown.as_secs() as i64;
        let id = ping_id.to_string();
        let from_user = req.from_user;

        let to_user = self
            .db
            .with_transaction(move |tx| -> Result<String, ServiceError> {
                let now = now_ts();
                let from = req.from_user.to_string();
                let reply_to = req.reply_to.map(|p| p.to_string());
                let mut to_user = req.to_user.map(|u| u.to_string());

                if let Some(reply_to) = reply_to.as_deref() {
                    let original = queries::get_ping(tx, reply_to)?.ok_or(ServiceError::PingNotFound)?;
                    if !req.ignore_reply_uniqueness && queries::count_replies(tx, reply_to)? >= 1 {
                        return Err(ServiceError::AlreadyReplied);
                    }
                    to_user = Some(original.from_user.ok_or(ServiceError::RecipientNotFound)?);
                }

                let sender = queries::get_user(tx, &from)?.ok_or(ServiceError::SenderNotFinalized)?;
                if !req.ignore_cooldown && sender.next_allowed_ping_timestamp > now {
                    return Err(ServiceError::Cooldown(sender.next_allowed_ping_timestamp - now));
                }
                if !sender.creation_finalized {
                    return Err(ServiceError::SenderNotFinalized);
                }

                let to_user = match to_user {
                    Some(to_user) => {
                        if queries::get_user(tx, &to_user)?.is_none() {
                            return Err(ServiceError::RecipientNotFound);
                        }
                        to_user
                    }
                    None => pick_random_recipient(tx)?,
                };

                queries::insert_ping(
                    tx,
                    &NewPing {
                        id: &id,
                        from_user: &from,
                        to_user: &to_user,
                        reply_to: reply_to.as_deref(),
                        display_country_of_origin: req.display_country_of_origin,
                        timestamp: now,
                    },
                )?;
                queries::set_next_allowed_ping(tx, &from, now + cooldown)?;

                Ok(to_user)
            })
            .await?;

        info!(%ping_id, %from_user, %to_user, "Ping created");
        self.trigger.notify();
        Ok(ping_id)
    }
}

/// Uniform choice among finalized users. Self-pings are allowed.
fn pick_random_recipient(conn: &Connection) -> Result<String, ServiceError> {
    let eligible = queries::count_finalized_users(conn)?;
    if eligible == 0 {
        return Err(ServiceError::NoEligibleRecipient);
    }

    let offset = rand::rng().random_range(0..eligible);
    debug!(eligible, offset, "Picked random recipient");
    queries::finalized_user_at(conn, offset)?.ok_or(ServiceError::NoEligibleRecipient)
}
