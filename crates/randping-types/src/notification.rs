use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of a push notification as read by the service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Ping the notification is about. Absent for the welcome notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub text: String,
}

impl NotificationPayload {
    pub fn for_ping(id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            text: text.into(),
        }
    }

    pub fn standalone(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
        }
    }
}
