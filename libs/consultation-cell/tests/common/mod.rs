#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use consultation_cell::services::{
    ConsultationRequestService, InMemoryClinicDirectory, InMemoryRequestStore, RequestStore,
};
use consultation_cell::{Clinic, ConsultationState, CreateRequestPayload};
use doctor_cell::models::DoctorProfile;
use doctor_cell::services::{EligibilityResolver, InMemoryDoctorDirectory};
use notification_cell::{
    DeliveryMode, InMemoryPushTokenDirectory, NotificationDispatcher, PushNotifier, RecordingNotifier,
};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

pub const SPECIALIZATION: &str = "Orthodontics";

/// In-memory wiring of the consultation state with inline notifications.
pub struct Harness {
    pub state: Arc<ConsultationState>,
    pub store: InMemoryRequestStore,
    pub doctors: InMemoryDoctorDirectory,
    pub clinics: InMemoryClinicDirectory,
    pub tokens: InMemoryPushTokenDirectory,
    pub notifier: RecordingNotifier,
    pub host: Uuid,
    pub clinic_id: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        let notifier = RecordingNotifier::new();
        Self::build(Arc::new(notifier.clone()), notifier).await
    }

    /// Routes pushes to `notifier`; the recording notifier stays empty.
    pub async fn with_notifier(notifier: Arc<dyn PushNotifier>) -> Self {
        Self::build(notifier, RecordingNotifier::new()).await
    }

    async fn build(push: Arc<dyn PushNotifier>, notifier: RecordingNotifier) -> Self {
        let config = TestConfig::default().to_arc();
        let store = InMemoryRequestStore::new();
        let doctors = InMemoryDoctorDirectory::new();
        let clinics = InMemoryClinicDirectory::new();
        let tokens = InMemoryPushTokenDirectory::new();

        let host = Uuid::new_v4();
        let clinic_id = Uuid::new_v4();
        clinics.upsert(Clinic {
            id: clinic_id,
            host_id: host,
            name: "Smile Dental".to_string(),
            address: Some("12 MG Road".to_string()),
            is_primary: true,
        }).await;
        tokens.register(host, format!("ExponentPushToken[{}]", host)).await;

        let dispatcher = NotificationDispatcher::new(push, Arc::new(tokens.clone()))
            .with_mode(DeliveryMode::Inline);

        let state = Arc::new(ConsultationState::new(
            config,
            Arc::new(store.clone()),
            Arc::new(clinics.clone()),
            Arc::new(EligibilityResolver::new(Arc::new(doctors.clone()))),
            dispatcher,
        ));

        Self { state, store, doctors, clinics, tokens, notifier, host, clinic_id }
    }

    /// Registers an active, verified doctor with a push token.
    pub async fn add_doctor(&self, specialization: &str) -> Uuid {
        let id = Uuid::new_v4();
        let profile: DoctorProfile = serde_json::from_value(
            MockSupabaseResponses::doctor_profile_response(&id.to_string(), specialization),
        ).unwrap();

        self.doctors.upsert(profile).await;
        self.tokens.register(id, Self::token_for(id)).await;
        id
    }

    /// A request service over `store` that shares this harness's doctors,
    /// clinics and recording notifier.
    pub fn service_with_store(&self, store: Arc<dyn RequestStore>) -> ConsultationRequestService {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(self.notifier.clone()),
            Arc::new(self.tokens.clone()),
        ).with_mode(DeliveryMode::Inline);

        ConsultationRequestService::new(
            store,
            Arc::new(self.clinics.clone()),
            Arc::new(EligibilityResolver::new(Arc::new(self.doctors.clone()))),
            dispatcher,
        )
    }

    pub fn token_for(user_id: Uuid) -> String {
        format!("ExponentPushToken[{}]", user_id)
    }

    pub fn payload(&self) -> CreateRequestPayload {
        CreateRequestPayload {
            specialization: SPECIALIZATION.to_string(),
            requirements: "Braces adjustment for two patients".to_string(),
            clinic_id: Some(self.clinic_id),
            duration_minutes: 60,
            request_datetime: Utc::now() + Duration::days(2),
            offering_rupees: Decimal::new(1500, 0),
            user_id: Some(self.host),
        }
    }
}
