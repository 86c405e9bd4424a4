use std::sync::Arc;

use tracing::info;

use doctor_cell::services::{EligibilityResolver, SupabaseDoctorDirectory};
use notification_cell::{ExpoPushClient, NotificationDispatcher, SupabasePushTokenDirectory};
use shared_config::{AppConfig, RequestStoreBackend};

use crate::services::clinic::{ClinicDirectory, SupabaseClinicDirectory};
use crate::services::query::RequestQueryService;
use crate::services::statistics::RequestStatisticsService;
use crate::services::store::{InMemoryRequestStore, RequestStore, SupabaseRequestStore};
use crate::services::workflow::ConsultationRequestService;

/// Shared handler state for the consultation routes.
pub struct ConsultationState {
    pub config: Arc<AppConfig>,
    pub requests: ConsultationRequestService,
    pub queries: RequestQueryService,
    pub statistics: RequestStatisticsService,
}

impl ConsultationState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let store: Arc<dyn RequestStore> = match config.request_store {
            RequestStoreBackend::Supabase => Arc::new(SupabaseRequestStore::new(&config)),
            RequestStoreBackend::Memory => {
                info!("Using in-memory request store; data is lost on restart");
                Arc::new(InMemoryRequestStore::new())
            }
        };
        let clinics: Arc<dyn ClinicDirectory> = Arc::new(SupabaseClinicDirectory::new(&config));
        let eligibility = Arc::new(EligibilityResolver::new(Arc::new(SupabaseDoctorDirectory::new(&config))));

        let dispatcher = NotificationDispatcher::new(
            Arc::new(ExpoPushClient::new(&config)),
            Arc::new(SupabasePushTokenDirectory::new(&config)),
        ).with_enabled(config.notifications_enabled);

        Self::new(config, store, clinics, eligibility, dispatcher)
    }

    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn RequestStore>,
        clinics: Arc<dyn ClinicDirectory>,
        eligibility: Arc<EligibilityResolver>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let requests = ConsultationRequestService::new(
            store.clone(),
            clinics.clone(),
            eligibility.clone(),
            dispatcher,
        ).with_max_retries(config.max_transition_retries);

        Self {
            queries: RequestQueryService::new(store.clone(), clinics, eligibility),
            statistics: RequestStatisticsService::new(store),
            requests,
            config,
        }
    }
}
