//! Webhook delivery of notifications.

use super::{Notification, NotificationSink, NotifyError};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Posts each notification as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    client: Client,
    url: String,
    max_elapsed: Duration,
}

impl WebhookNotificationSink {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    /// Bound the total time spent retrying a single delivery.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(url = %self.url, user_id = %notification.user_id(), "posting notification");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(notification)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(NotifyError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(NotifyError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(NotifyError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(NotifyError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    #[tokio::test]
    async fn test_unreachable_endpoint_gives_network_error() {
        let sink = WebhookNotificationSink::new("http://127.0.0.1:1/hook".to_string())
            .with_max_elapsed(Duration::from_millis(200));
        let n = Notification::Activated {
            user_id: UserId::from("u1"),
            activated_date: "01-01-2024".to_string(),
        };
        match sink.send(&n).await {
            Err(NotifyError::NetworkError(_)) => {}
            other => panic!("expected network error, got {:?}", other),
        }
    }
}
