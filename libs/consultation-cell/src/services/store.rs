// libs/consultation-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ConsultationRequest, RequestError, RequestFilter};

const TABLE_PATH: &str = "/rest/v1/consultation_requests";

#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// Row written; carries the stored version.
    Applied(ConsultationRequest),
    /// Someone else committed first.
    VersionConflict,
}

/// Persistence for consultation requests.
///
/// Writes after creation go through [`compare_and_swap`](Self::compare_and_swap)
/// keyed on `version`, which is the only serialization point between
/// concurrent transitions on the same request.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: ConsultationRequest) -> Result<ConsultationRequest, RequestError>;

    async fn get(&self, id: Uuid) -> Result<Option<ConsultationRequest>, RequestError>;

    /// Replaces the row iff its stored version is still `expected_version`.
    /// The written row gets `expected_version + 1`.
    async fn compare_and_swap(
        &self,
        expected_version: i64,
        request: ConsultationRequest,
    ) -> Result<SwapOutcome, RequestError>;

    /// Matching rows ordered by `request_datetime` ascending.
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ConsultationRequest>, RequestError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseRequestStore {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabaseRequestStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    /// Rows that fail to decode are logged and reported, never half-used.
    fn decode_rows(rows: Vec<Value>) -> Result<Vec<ConsultationRequest>, RequestError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<ConsultationRequest>(row).map_err(|e| {
                    error!("Failed to decode consultation request row: {}", e);
                    RequestError::Storage(format!("malformed consultation request row: {}", e))
                })
            })
            .collect()
    }

    fn encode(request: &ConsultationRequest) -> Result<Value, RequestError> {
        serde_json::to_value(request)
            .map_err(|e| RequestError::Storage(format!("failed to encode request: {}", e)))
    }

    /// Column filters PostgREST can evaluate directly. Set membership is
    /// checked in Rust because legacy rows hold the id sets as strings.
    fn build_list_path(filter: &RequestFilter) -> String {
        let mut params = Vec::new();

        if let Some(created_by) = filter.created_by {
            params.push(format!("created_by=eq.{}", created_by));
        }
        if let Some(assigned) = filter.assigned_doctor_id {
            params.push(format!("assigned_doctor_id=eq.{}", assigned));
        }
        if !filter.statuses.is_empty() {
            let statuses = filter.statuses.iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            params.push(format!("status=in.({})", statuses));
        }
        params.push("order=request_datetime.asc".to_string());

        format!("{}?{}", TABLE_PATH, params.join("&"))
    }
}

#[async_trait]
impl RequestStore for SupabaseRequestStore {
    async fn insert(&self, request: ConsultationRequest) -> Result<ConsultationRequest, RequestError> {
        let body = Self::encode(&request)?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            TABLE_PATH,
            Some(&self.service_key),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| RequestError::Storage(e.to_string()))?;

        Self::decode_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| RequestError::Storage("insert returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<ConsultationRequest>, RequestError> {
        let path = format!("{}?id=eq.{}", TABLE_PATH, id);
        debug!("Fetching consultation request {}", id);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await.map_err(|e| RequestError::Storage(e.to_string()))?;

        Ok(Self::decode_rows(rows)?.into_iter().next())
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        mut request: ConsultationRequest,
    ) -> Result<SwapOutcome, RequestError> {
        request.version = expected_version + 1;
        let path = format!("{}?id=eq.{}&version=eq.{}", TABLE_PATH, request.id, expected_version);
        let body = Self::encode(&request)?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(&self.service_key),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| RequestError::Storage(e.to_string()))?;

        match Self::decode_rows(rows)?.into_iter().next() {
            Some(stored) => Ok(SwapOutcome::Applied(stored)),
            None => {
                warn!("Version {} of request {} is stale", expected_version, request.id);
                Ok(SwapOutcome::VersionConflict)
            }
        }
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ConsultationRequest>, RequestError> {
        let path = Self::build_list_path(filter);
        debug!("Listing consultation requests: {}", path);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await.map_err(|e| RequestError::Storage(e.to_string()))?;

        let mut requests: Vec<ConsultationRequest> = Self::decode_rows(rows)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        requests.sort_by_key(|r| r.request_datetime);
        Ok(requests)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store. The write lock covers both the version check and the
/// write, so swaps are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRequestStore {
    requests: Arc<RwLock<HashMap<Uuid, ConsultationRequest>>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: ConsultationRequest) -> Result<ConsultationRequest, RequestError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(RequestError::Storage(format!("request {} already exists", request.id)));
        }
        requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ConsultationRequest>, RequestError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        mut request: ConsultationRequest,
    ) -> Result<SwapOutcome, RequestError> {
        let mut requests = self.requests.write().await;

        let current = requests.get(&request.id)
            .ok_or_else(|| RequestError::request_not_found(request.id))?;
        if current.version != expected_version {
            return Ok(SwapOutcome::VersionConflict);
        }

        request.version = expected_version + 1;
        requests.insert(request.id, request.clone());
        Ok(SwapOutcome::Applied(request))
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ConsultationRequest>, RequestError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ConsultationRequest> = requests.values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.request_datetime);
        Ok(matching)
    }
}
