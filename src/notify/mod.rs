//! Notification sink for activation and bonus-credited events.
//!
//! Delivery is fire-and-forget: callers log a failed send and move on,
//! nothing in the engine depends on a notification being received.

use crate::domain::{BonusKind, PayoutStatus, UserId};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::info;

pub mod mock;
pub mod webhook;

pub use mock::MockNotificationSink;
pub use webhook::WebhookNotificationSink;

/// Event pushed to the alert sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    Activated {
        user_id: UserId,
        activated_date: String,
    },
    #[serde(rename_all = "camelCase")]
    BonusCredited {
        user_id: UserId,
        payout_id: String,
        name: BonusKind,
        /// Canonical decimal string.
        amount: String,
        status: PayoutStatus,
    },
}

impl Notification {
    pub fn user_id(&self) -> &UserId {
        match self {
            Notification::Activated { user_id, .. } => user_id,
            Notification::BonusCredited { user_id, .. } => user_id,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync + fmt::Debug {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Error type for notification delivery.
#[derive(Debug, Clone)]
pub enum NotifyError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Rate limit exceeded
    RateLimited,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            NotifyError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            NotifyError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Sink used when no webhook is configured; writes each event to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(user_id = %notification.user_id(), ?notification, "notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = NotifyError::HttpError {
            status: 503,
            message: "Server error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 503: Server error");

        assert_eq!(NotifyError::RateLimited.to_string(), "Rate limited");
    }

    #[test]
    fn test_notification_wire_shape() {
        let n = Notification::BonusCredited {
            user_id: UserId::from("u1"),
            payout_id: "match:u1:1".to_string(),
            name: BonusKind::Matching,
            amount: Decimal::from_i64(500).to_canonical_string(),
            status: PayoutStatus::OnHold,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "bonusCredited");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["name"], "Matching Bonus");
        assert_eq!(json["status"], "OnHold");
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let sink = LogNotificationSink;
        let n = Notification::Activated {
            user_id: UserId::from("u1"),
            activated_date: "01-01-2024".to_string(),
        };
        assert!(sink.send(&n).await.is_ok());
    }
}
