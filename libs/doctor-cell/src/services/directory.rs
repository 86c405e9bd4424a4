use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::DoctorProfile;

/// Read access to the doctor population.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// Active, verified doctors whose specialization equals `specialization`.
    async fn find_eligible(&self, specialization: &str) -> Result<Vec<DoctorProfile>>;

    /// Profiles for the given ids; unknown ids are skipped.
    async fn get_profiles(&self, ids: &[Uuid]) -> Result<Vec<DoctorProfile>>;
}

pub struct SupabaseDoctorDirectory {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<DoctorProfile>> {
        let profiles = rows.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<DoctorProfile>, _>>()?;
        Ok(profiles)
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn find_eligible(&self, specialization: &str) -> Result<Vec<DoctorProfile>> {
        let path = format!(
            "/rest/v1/profiles?role=eq.doctor&status=eq.active&is_verified=eq.true&specialization=eq.{}",
            urlencoding::encode(specialization)
        );
        debug!("Querying eligible doctors: {}", path);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Self::parse_rows(rows)
    }

    async fn get_profiles(&self, ids: &[Uuid]) -> Result<Vec<DoctorProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/profiles?id=in.({})", id_list);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Self::parse_rows(rows)
    }
}

/// Directory backed by a process-local map, for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryDoctorDirectory {
    profiles: Arc<RwLock<HashMap<Uuid, DoctorProfile>>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, profile: DoctorProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn find_eligible(&self, specialization: &str) -> Result<Vec<DoctorProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values()
            .filter(|p| p.is_eligible_for(specialization))
            .cloned()
            .collect())
    }

    async fn get_profiles(&self, ids: &[Uuid]) -> Result<Vec<DoctorProfile>> {
        let profiles = self.profiles.read().await;
        Ok(ids.iter().filter_map(|id| profiles.get(id).cloned()).collect())
    }
}
