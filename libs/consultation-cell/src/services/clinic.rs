use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::Clinic;

#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    async fn get_clinic(&self, id: Uuid) -> Result<Option<Clinic>>;

    /// The host's primary clinic, or their only clinic when none is flagged.
    async fn primary_clinic_for(&self, host_id: Uuid) -> Result<Option<Clinic>>;

    async fn get_clinics(&self, ids: &[Uuid]) -> Result<Vec<Clinic>>;
}

fn pick_primary(clinics: Vec<Clinic>) -> Option<Clinic> {
    if let Some(primary) = clinics.iter().find(|c| c.is_primary) {
        return Some(primary.clone());
    }
    match clinics.len() {
        1 => clinics.into_iter().next(),
        _ => None,
    }
}

pub struct SupabaseClinicDirectory {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabaseClinicDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }
}

#[async_trait]
impl ClinicDirectory for SupabaseClinicDirectory {
    async fn get_clinic(&self, id: Uuid) -> Result<Option<Clinic>> {
        let path = format!("/rest/v1/clinics?id=eq.{}", id);
        let clinics: Vec<Clinic> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Ok(clinics.into_iter().next())
    }

    async fn primary_clinic_for(&self, host_id: Uuid) -> Result<Option<Clinic>> {
        let path = format!("/rest/v1/clinics?host_id=eq.{}", host_id);
        debug!("Looking up clinics for host {}", host_id);

        let clinics: Vec<Clinic> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Ok(pick_primary(clinics))
    }

    async fn get_clinics(&self, ids: &[Uuid]) -> Result<Vec<Clinic>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/clinics?id=in.({})", id_list);

        self.supabase.request(Method::GET, &path, Some(&self.service_key), None).await
    }
}

#[derive(Clone, Default)]
pub struct InMemoryClinicDirectory {
    clinics: Arc<RwLock<HashMap<Uuid, Clinic>>>,
}

impl InMemoryClinicDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, clinic: Clinic) {
        self.clinics.write().await.insert(clinic.id, clinic);
    }
}

#[async_trait]
impl ClinicDirectory for InMemoryClinicDirectory {
    async fn get_clinic(&self, id: Uuid) -> Result<Option<Clinic>> {
        Ok(self.clinics.read().await.get(&id).cloned())
    }

    async fn primary_clinic_for(&self, host_id: Uuid) -> Result<Option<Clinic>> {
        let owned: Vec<Clinic> = self.clinics.read().await
            .values()
            .filter(|c| c.host_id == host_id)
            .cloned()
            .collect();
        Ok(pick_primary(owned))
    }

    async fn get_clinics(&self, ids: &[Uuid]) -> Result<Vec<Clinic>> {
        let clinics = self.clinics.read().await;
        Ok(ids.iter().filter_map(|id| clinics.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clinic(host_id: Uuid, is_primary: bool) -> Clinic {
        Clinic {
            id: Uuid::new_v4(),
            host_id,
            name: "Smile Dental".to_string(),
            address: None,
            is_primary,
        }
    }

    #[tokio::test]
    async fn test_primary_clinic_selection() {
        let directory = InMemoryClinicDirectory::new();
        let host = Uuid::new_v4();

        assert!(directory.primary_clinic_for(host).await.unwrap().is_none());

        let only = clinic(host, false);
        directory.upsert(only.clone()).await;
        assert_eq!(directory.primary_clinic_for(host).await.unwrap(), Some(only));

        // two unflagged clinics are ambiguous
        directory.upsert(clinic(host, false)).await;
        assert!(directory.primary_clinic_for(host).await.unwrap().is_none());

        let primary = clinic(host, true);
        directory.upsert(primary.clone()).await;
        assert_eq!(directory.primary_clinic_for(host).await.unwrap(), Some(primary));
    }
}
