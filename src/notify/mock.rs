//! In-memory sink for tests.

use super::{Notification, NotificationSink, NotifyError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every notification it receives.
#[derive(Debug, Default)]
pub struct MockNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl MockNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, in order.
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for MockNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self.sent.lock() {
            Ok(mut guard) => guard.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}
