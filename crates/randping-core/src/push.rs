use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use randping_types::notification::NotificationPayload;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("no push subscription registered")]
    NoSubscription,

    #[error("stored subscription is not valid JSON: {0}")]
    InvalidSubscription(String),

    #[error("push service rejected the notification: {0}")]
    Rejected(String),

    #[error("push transport error: {0}")]
    Transport(String),
}

/// Delivers one notification to one subscription. A single attempt: any
/// error means the notification was not delivered.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(
        &self,
        subscription: &serde_json::Value,
        payload: &NotificationPayload,
        ttl: Duration,
    ) -> Result<(), PushError>;
}

/// Parse a stored subscription descriptor.
pub fn parse_subscription(raw: Option<&str>) -> Result<serde_json::Value, PushError> {
    let raw = raw.ok_or(PushError::NoSubscription)?;
    serde_json::from_str(raw).map_err(|e| PushError::InvalidSubscription(e.to_string()))
}

/// Transport that only logs. Used in development when no relay is configured.
pub struct TracingTransport;

#[async_trait]
impl PushTransport for TracingTransport {
    async fn deliver(
        &self,
        subscription: &serde_json::Value,
        payload: &NotificationPayload,
        ttl: Duration,
    ) -> Result<(), PushError> {
        let endpoint = subscription
            .get("endpoint")
            .and_then(|e| e.as_str())
            .unwrap_or("<no endpoint>");
        info!(
            endpoint,
            ttl_secs = ttl.as_secs(),
            text = %payload.text,
            "push (not sent, no relay configured)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: &'a serde_json::Value,
    /// Serialized [`NotificationPayload`], encrypted by the relay as-is.
    data: String,
    ttl: u64,
}

/// Forwards notifications to an HTTP push relay which owns the Web Push
/// encryption and VAPID signing.
pub struct RelayTransport {
    client: reqwest::Client,
    url: String,
}

impl RelayTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PushError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PushTransport for RelayTransport {
    async fn deliver(
        &self,
        subscription: &serde_json::Value,
        payload: &NotificationPayload,
        ttl: Duration,
    ) -> Result<(), PushError> {
        let data = serde_json::to_string(payload).map_err(|e| PushError::Transport(e.to_string()))?;
        let body = serde_json::to_vec(&RelayRequest {
            subscription,
            data,
            ttl: ttl.as_secs(),
        })
        .map_err(|e| PushError::Transport(e.to_string()))?;

        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PushError::Rejected(format!("relay answered {}", status)));
        }

        debug!("Relay accepted notification ({})", status);
        Ok(())
    }
}
