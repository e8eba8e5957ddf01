#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use randping_core::dispatcher::{DispatcherConfig, PassReport};
use randping_core::push::{PushError, PushTransport};
use randping_core::{Accounts, DispatchQueue, DispatchTrigger, Dispatcher, PingEngine};
use randping_db::models::PingRow;
use randping_db::{Database, DbError, queries};
use randping_types::notification::NotificationPayload;

/// Push transport that records deliveries and fails for "dead" endpoints.
#[derive(Default)]
pub struct StubTransport {
    dead: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, NotificationPayload)>>,
    delay: Duration,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn kill(&self, endpoint: &str) {
        self.dead.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn sent(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, endpoint: &str) -> Vec<NotificationPayload> {
        self.sent()
            .into_iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, p)| p)
            .collect()
    }
}

#[async_trait]
impl PushTransport for StubTransport {
    async fn deliver(
        &self,
        subscription: &serde_json::Value,
        payload: &NotificationPayload,
        _ttl: Duration,
    ) -> Result<(), PushError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let endpoint = subscription["endpoint"].as_str().unwrap_or_default().to_string();
        if self.dead.lock().unwrap().contains(&endpoint) {
            return Err(PushError::Rejected("410 Gone".into()));
        }

        self.sent.lock().unwrap().push((endpoint, payload.clone()));
        Ok(())
    }
}

/// Fails every delivery. The first failure also leaves the store locked
/// for `hold`, so whatever the caller writes next times out.
pub struct LockingTransport {
    db: Database,
    hold: Duration,
    armed: AtomicBool,
}

impl LockingTransport {
    pub fn new(db: Database, hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            db,
            hold,
            armed: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl PushTransport for LockingTransport {
    async fn deliver(
        &self,
        _subscription: &serde_json::Value,
        _payload: &NotificationPayload,
        _ttl: Duration,
    ) -> Result<(), PushError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let (locked_tx, locked_rx) = tokio::sync::oneshot::channel();
            let db = self.db.clone();
            let hold = self.hold;
            tokio::spawn(async move {
                db.with_transaction(move |_| {
                    let _ = locked_tx.send(());
                    std::thread::sleep(hold);
                    Ok::<_, DbError>(())
                })
                .await
            });
            let _ = locked_rx.await;
        }
        Err(PushError::Rejected("410 Gone".into()))
    }
}

pub fn subscription(endpoint: &str) -> serde_json::Value {
    serde_json::json!({
        "endpoint": endpoint,
        "expirationTime": null,
        "keys": { "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA", "auth": "tBHItJI5svbpez7KI4CCXg" }
    })
}

pub struct Harness {
    pub db: Database,
    pub transport: Arc<StubTransport>,
    pub accounts: Accounts,
    pub engine: PingEngine,
    pub dispatcher: Dispatcher,
    pub queue: DispatchQueue,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transport(StubTransport::new(), DispatcherConfig::default())
    }

    pub fn with_transport(transport: Arc<StubTransport>, config: DispatcherConfig) -> Self {
        let db = Database::open_in_memory().unwrap();
        let (trigger, queue) = DispatchTrigger::channel();
        let accounts = Accounts::new(db.clone(), transport.clone());
        let engine = PingEngine::new(db.clone(), trigger);
        let dispatcher = Dispatcher::new(db.clone(), accounts.clone(), transport.clone(), config);

        Self {
            db,
            transport,
            accounts,
            engine,
            dispatcher,
            queue,
        }
    }

    /// Register, subscribe and finalize a user whose endpoint is `endpoint`.
    pub async fn finalized_user(&self, endpoint: &str, country: Option<&str>) -> Uuid {
        let user_id = self.provisional_user(endpoint, country).await;
        self.accounts.finalize_account(user_id).await.unwrap();
        user_id
    }

    pub async fn provisional_user(&self, endpoint: &str, country: Option<&str>) -> Uuid {
        let country = country.map(|c| c.parse().unwrap());
        let account = self.accounts.create_account(country).await.unwrap();
        self.accounts
            .set_notification_subscription(account.user_id, &subscription(endpoint))
            .await
            .unwrap();
        account.user_id
    }

    pub async fn ping(&self, id: Uuid) -> Option<PingRow> {
        let id = id.to_string();
        self.db
            .with_transaction(move |tx| queries::get_ping(tx, &id))
            .await
            .unwrap()
    }

    pub async fn run_pass(&self) -> PassReport {
        self.dispatcher.run_pass().await.unwrap()
    }

    pub async fn count_pings(&self) -> i64 {
        self.db
            .with_transaction(|tx| {
                Ok::<_, DbError>(tx.query_row("SELECT COUNT(*) FROM pings", [], |r| r.get(0))?)
            })
            .await
            .unwrap()
    }
}
