//! Payloads of the notification stream.

use serde::Serialize;

use crate::state::Notification;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the notification stream.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// JSON body.
    pub data: String,
}

impl ServerEvent {
    /// Plain-text event.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

impl TryFrom<&Notification> for ServerEvent {
    type Error = serde_json::Error;

    fn try_from(notification: &Notification) -> serde_json::Result<Self> {
        ServerEvent::json(notification.kind.as_str().to_owned(), notification)
    }
}

#[derive(Debug, Serialize)]
/// Initial metadata sent to the notifier when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether storage is unavailable.
    pub degraded: bool,
}
