use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use shared_config::AppConfig;

use crate::error::NotificationError;
use crate::models::{PushMessage, PushResponse};

/// Expo accepts at most this many messages per request.
const MAX_BATCH: usize = 100;

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send(&self, messages: Vec<PushMessage>) -> Result<(), NotificationError>;
}

pub struct ExpoPushClient {
    client: Client,
    push_url: String,
    access_token: Option<String>,
}

impl ExpoPushClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            push_url: config.expo_push_url.clone(),
            access_token: config.expo_access_token.clone(),
        }
    }

    async fn send_chunk(&self, messages: &[PushMessage]) -> Result<(), NotificationError> {
        let mut request = self.client.post(&self.push_url).json(messages);

        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Expo push failed {}: {}", status, body);
            return Err(NotificationError::Api { status: status.as_u16(), body });
        }

        let push_response: PushResponse = response.json().await?;

        let failed: Vec<_> = push_response.data.iter()
            .filter(|ticket| ticket.status == "error")
            .collect();

        if !failed.is_empty() {
            for ticket in &failed {
                error!("Expo ticket error: {}", ticket.message.as_deref().unwrap_or("unknown"));
            }
            return Err(NotificationError::TicketsRejected {
                failed: failed.len(),
                total: push_response.data.len(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl PushNotifier for ExpoPushClient {
    async fn send(&self, messages: Vec<PushMessage>) -> Result<(), NotificationError> {
        if messages.is_empty() {
            return Ok(());
        }

        info!("Sending {} Expo push notifications", messages.len());

        for chunk in messages.chunks(MAX_BATCH) {
            self.send_chunk(chunk).await?;
        }

        Ok(())
    }
}
