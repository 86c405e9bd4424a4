use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::NotificationError;

/// Maps user ids to their registered device push tokens.
#[async_trait]
pub trait PushTokenDirectory: Send + Sync {
    async fn tokens_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, String>, NotificationError>;
}

#[derive(Debug, Deserialize)]
struct TokenRow {
    id: Uuid,
    push_token: Option<String>,
}

pub struct SupabasePushTokenDirectory {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabasePushTokenDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }
}

#[async_trait]
impl PushTokenDirectory for SupabasePushTokenDirectory {
    async fn tokens_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, String>, NotificationError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = user_ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/profiles?select=id,push_token&id=in.({})", id_list);

        let rows: Vec<TokenRow> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await.map_err(|e| NotificationError::TokenLookup(e.to_string()))?;

        Ok(rows.into_iter()
            .filter_map(|row| row.push_token.filter(|t| !t.is_empty()).map(|t| (row.id, t)))
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPushTokenDirectory {
    tokens: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl InMemoryPushTokenDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: Uuid, token: impl Into<String>) {
        self.tokens.write().await.insert(user_id, token.into());
    }
}

#[async_trait]
impl PushTokenDirectory for InMemoryPushTokenDirectory {
    async fn tokens_for(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, String>, NotificationError> {
        let tokens = self.tokens.read().await;
        Ok(user_ids.iter()
            .filter_map(|id| tokens.get(id).map(|t| (*id, t.clone())))
            .collect())
    }
}
