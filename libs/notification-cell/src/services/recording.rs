use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::models::PushMessage;
use crate::services::expo::PushNotifier;

/// Notifier that keeps every message it is handed. Used by local runs and tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PushMessage>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, token: &str) -> Vec<PushMessage> {
        self.sent().into_iter().filter(|m| m.to == token).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl PushNotifier for RecordingNotifier {
    async fn send(&self, messages: Vec<PushMessage>) -> Result<(), NotificationError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.extend(messages);
        }
        Ok(())
    }
}
