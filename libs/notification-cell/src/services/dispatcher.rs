use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{Notification, PushMessage};
use crate::services::expo::PushNotifier;
use crate::services::tokens::PushTokenDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Spawn delivery on a detached task and return immediately.
    Detached,
    /// Deliver before returning; failures are still swallowed.
    Inline,
}

/// Best-effort fan-out of notifications after a state change has committed.
///
/// Nothing here returns an error to the caller: token lookup and push
/// failures are logged and dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn PushNotifier>,
    tokens: Arc<dyn PushTokenDirectory>,
    enabled: bool,
    mode: DeliveryMode,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn PushNotifier>, tokens: Arc<dyn PushTokenDirectory>) -> Self {
        Self {
            notifier,
            tokens,
            enabled: true,
            mode: DeliveryMode::Detached,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn dispatch(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        if !self.enabled {
            debug!("Notifications disabled, dropping {}", notifications.len());
            return;
        }

        match self.mode {
            DeliveryMode::Inline => {
                Self::deliver(self.notifier.clone(), self.tokens.clone(), notifications).await;
            }
            DeliveryMode::Detached => {
                let notifier = self.notifier.clone();
                let tokens = self.tokens.clone();
                tokio::spawn(async move {
                    Self::deliver(notifier, tokens, notifications).await;
                });
            }
        }
    }

    async fn deliver(
        notifier: Arc<dyn PushNotifier>,
        tokens: Arc<dyn PushTokenDirectory>,
        notifications: Vec<Notification>,
    ) {
        let recipients: Vec<Uuid> = notifications.iter()
            .map(|n| n.recipient)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let token_map = match tokens.tokens_for(&recipients).await {
            Ok(map) => map,
            Err(e) => {
                error!("Skipping {} notifications: {}", notifications.len(), e);
                return;
            }
        };

        let messages: Vec<PushMessage> = notifications.iter()
            .filter_map(|n| match token_map.get(&n.recipient) {
                Some(token) => Some(PushMessage::for_token(token, n)),
                None => {
                    debug!("No push token registered for user {}", n.recipient);
                    None
                }
            })
            .collect();

        if messages.is_empty() {
            return;
        }

        let count = messages.len();
        match notifier.send(messages).await {
            Ok(()) => info!("Delivered {} push notifications", count),
            Err(e) => warn!("Push delivery failed for {} notifications: {}", count, e),
        }
    }
}
