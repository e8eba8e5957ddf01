use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use randping_db::models::WaitingPing;
use randping_db::{Database, DbError, queries};
use randping_types::models::{CountryCode, PingState};
use randping_types::notification::NotificationPayload;

use crate::accounts::{Accounts, DEFAULT_NOTIFICATION_TTL};
use crate::error::ServiceError;
use crate::notification::ping_text;
use crate::push::{PushTransport, parse_subscription};

/// How long a pass waits for a previous pass to finish before giving up.
pub const DEFAULT_PASS_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Another dispatch pass held the lock for more than {0:?}")]
    Busy(Duration),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub pass_lock_timeout: Duration,
    pub notification_ttl: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pass_lock_timeout: DEFAULT_PASS_LOCK_TIMEOUT,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }
}

/// What one dispatch pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub scanned: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Recipients deleted because their subscription failed.
    pub reaped: usize,
    /// Pings whose outcome could not be recorded; they stay waiting.
    pub errors: usize,
}

enum Outcome {
    Delivered,
    Failed { reaped: bool },
}

// -- Trigger queue --

/// Handle used to ask for a dispatch pass. Cheap to clone.
#[derive(Clone)]
pub struct DispatchTrigger {
    tx: mpsc::Sender<()>,
}

/// Receiving end of the trigger queue, consumed by the dispatch worker.
pub struct DispatchQueue {
    rx: mpsc::Receiver<()>,
}

impl DispatchTrigger {
    /// The queue holds at most one pending trigger: a burst of pings while a
    /// pass is running collapses into a single follow-up pass.
    pub fn channel() -> (DispatchTrigger, DispatchQueue) {
        let (tx, rx) = mpsc::channel(1);
        (DispatchTrigger { tx }, DispatchQueue { rx })
    }

    /// Queue a pass without waiting.
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) => debug!("Dispatch pass queued"),
            Err(mpsc::error::TrySendError::Full(())) => debug!("Dispatch pass already pending"),
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Dispatch worker is gone, pings stay waiting until restart")
            }
        }
    }
}

impl DispatchQueue {
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Take a pending trigger if there is one.
    pub fn try_next(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

// -- Dispatcher --

/// Delivers waiting pings. Only one pass runs at a time.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    db: Database,
    accounts: Accounts,
    transport: Arc<dyn PushTransport>,
    config: DispatcherConfig,

    /// Held for the whole pass
    pass_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        accounts: Accounts,
        transport: Arc<dyn PushTransport>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                db,
                accounts,
                transport,
                config,
                pass_lock: Mutex::new(()),
            }),
        }
    }

    /// Start the long-lived worker: one pass per received trigger.
    pub fn spawn_worker(&self, mut queue: DispatchQueue) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while queue.next().await.is_some() {
                match dispatcher.run_pass().await {
                    Ok(report) => debug!(?report, "Dispatch pass finished"),
                    Err(e) => warn!("Dispatch pass abandoned: {}", e),
                }
            }
            info!("Dispatch queue closed, worker exiting");
        })
    }

    /// Deliver every waiting ping once.
    ///
    /// Each ping is handled on its own: a failure is logged and the pass
    /// moves on. Outcomes are written in their own short transactions and
    /// delivery never holds the store lock.
    pub async fn run_pass(&self) -> Result<PassReport, DispatchError> {
        let timeout = self.inner.config.pass_lock_timeout;
        let _pass = tokio::time::timeout(timeout, self.inner.pass_lock.lock())
            .await
            .map_err(|_| DispatchError::Busy(timeout))?;

        let waiting = self
            .inner
            .db
            .with_transaction(|tx| queries::waiting_pings(tx))
            .await?;

        let mut report = PassReport {
            scanned: waiting.len(),
            ..PassReport::default()
        };

        for ping in &waiting {
            match self.dispatch_one(ping).await {
                Ok(Outcome::Delivered) => report.delivered += 1,
                Ok(Outcome::Failed { reaped }) => {
                    report.failed += 1;
                    if reaped {
                        report.reaped += 1;
                    }
                }
                Err(e) => {
                    error!(ping_id = %ping.id, "Could not record ping outcome: {}", e);
                    report.errors += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                delivered = report.delivered,
                failed = report.failed,
                reaped = report.reaped,
                "Dispatch pass complete"
            );
        }
        Ok(report)
    }

    async fn dispatch_one(&self, ping: &WaitingPing) -> Result<Outcome, ServiceError> {
        let Some(recipient) = ping.to_user.as_deref() else {
            warn!(ping_id = %ping.id, "Recipient no longer exists");
            self.record(&ping.id, PingState::Failed).await?;
            return Ok(Outcome::Failed { reaped: false });
        };

        let origin = ping
            .sender_country
            .as_deref()
            .and_then(|c| c.parse::<CountryCode>().ok());
        let text = ping_text(
            ping.reply_to.is_some(),
            ping.display_country_of_origin,
            origin.as_ref(),
        );
        let payload = match ping.id.parse::<Uuid>() {
            Ok(id) => NotificationPayload::for_ping(id, text),
            Err(_) => NotificationPayload::standalone(text),
        };

        debug!(ping_id = %ping.id, "Sending ping");
        let delivery = match parse_subscription(ping.recipient_subscription.as_deref()) {
            Ok(subscription) => {
                self.inner
                    .transport
                    .deliver(&subscription, &payload, self.inner.config.notification_ttl)
                    .await
            }
            Err(e) => Err(e),
        };

        match delivery {
            Ok(()) => {
                self.record(&ping.id, PingState::Success).await?;
                debug!(ping_id = %ping.id, "Sent ping");
                Ok(Outcome::Delivered)
            }
            Err(e) => {
                warn!(ping_id = %ping.id, recipient, "Delivery failed, reaping recipient: {}", e);

                // Reap before marking: if the delete fails the ping stays
                // waiting and the next pass retries it.
                let reaped = match recipient.parse::<Uuid>() {
                    Ok(user_id) => self.inner.accounts.delete_account(user_id).await?,
                    Err(_) => {
                        error!(recipient, "Recipient id is not a UUID, not reaping");
                        false
                    }
                };
                self.record(&ping.id, PingState::Failed).await?;
                Ok(Outcome::Failed { reaped })
            }
        }
    }

    async fn record(&self, ping_id: &str, state: PingState) -> Result<(), ServiceError> {
        let id = ping_id.to_string();
        let updated = self
            .inner
            .db
            .with_transaction(move |tx| queries::set_ping_state(tx, &id, state))
            .await?;

        if updated == 0 {
            warn!(ping_id, %state, "Ping was no longer waiting");
        }
        Ok(())
    }
}
