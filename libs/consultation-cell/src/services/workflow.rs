// libs/consultation-cell/src/services/workflow.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::EligibilityError;
use doctor_cell::services::EligibilityResolver;
use notification_cell::{Notification, NotificationDispatcher};

use crate::models::{
    CancelRequestPayload, Clinic, CompleteConsultationPayload, ConfirmDoctorPayload,
    ConsultationRequest, CreateRequestPayload, CreatedRequest, DoctorIdSet, HostCompletePayload,
    RequestError,
};
use crate::services::acceptance::AcceptanceTracker;
use crate::services::clinic::ClinicDirectory;
use crate::services::lifecycle::{RequestLifecycle, TransitionOutcome};
use crate::services::store::{RequestStore, SwapOutcome};

pub const DEFAULT_MAX_RETRIES: u32 = 5;

impl From<EligibilityError> for RequestError {
    fn from(e: EligibilityError) -> Self {
        match e {
            EligibilityError::EmptySpecialization => {
                RequestError::Validation("specialization is required".to_string())
            }
            EligibilityError::Directory(msg) => RequestError::Storage(msg),
        }
    }
}

/// Entry point for every state-changing request operation.
///
/// Each transition is a read-modify-write against a fresh snapshot with a
/// version check on write; on conflict the guards are evaluated again on the
/// newer row. Notifications go out only once the write has committed.
pub struct ConsultationRequestService {
    store: Arc<dyn RequestStore>,
    clinics: Arc<dyn ClinicDirectory>,
    eligibility: Arc<EligibilityResolver>,
    dispatcher: NotificationDispatcher,
    max_retries: u32,
}

impl ConsultationRequestService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        clinics: Arc<dyn ClinicDirectory>,
        eligibility: Arc<EligibilityResolver>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            clinics,
            eligibility,
            dispatcher,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub async fn create_request(
        &self,
        host_id: Uuid,
        payload: CreateRequestPayload,
    ) -> Result<CreatedRequest, RequestError> {
        info!("Creating {} consultation request for host {}", payload.specialization, host_id);

        let clinic = self.resolve_clinic(host_id, payload.clinic_id).await?;
        let now = Utc::now();
        RequestLifecycle::validate_new_request(&payload, now)?;

        let eligible = self.eligibility
            .resolve_eligible_doctors(payload.specialization.trim())
            .await?;

        let mut request = RequestLifecycle::new_request(host_id, clinic.id, &payload, now);
        AcceptanceTracker::offer(&mut request, DoctorIdSet::from(eligible))?;

        let contacted_doctors = request.sent_to_user_ids.len();
        let request = self.store.insert(request).await?;

        info!("Request {} offered to {} doctors", request.id, contacted_doctors);
        Ok(CreatedRequest { request, contacted_doctors })
    }

    /// Visible to the creator, every offered doctor, and the assigned doctor.
    pub async fn get_request(&self, request_id: Uuid, user_id: Uuid) -> Result<ConsultationRequest, RequestError> {
        let request = self.load(request_id).await?;
        if !request.is_visible_to(user_id) {
            return Err(RequestError::Unauthorized("request is not visible to this user".to_string()));
        }
        Ok(request)
    }

    pub async fn accept(&self, request_id: Uuid, doctor_id: Uuid) -> Result<ConsultationRequest, RequestError> {
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::accept(request, doctor_id, now)
        }).await
    }

    pub async fn decline(&self, request_id: Uuid, doctor_id: Uuid) -> Result<ConsultationRequest, RequestError> {
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::decline(request, doctor_id, now)
        }).await
    }

    pub async fn confirm_doctor(
        &self,
        request_id: Uuid,
        host_id: Uuid,
        payload: ConfirmDoctorPayload,
    ) -> Result<ConsultationRequest, RequestError> {
        let doctor_id = payload.doctor_id;
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::confirm(request, host_id, doctor_id, payload.confirmation_notes.clone(), now)
        }).await
    }

    pub async fn cancel(
        &self,
        request_id: Uuid,
        host_id: Uuid,
        payload: CancelRequestPayload,
    ) -> Result<ConsultationRequest, RequestError> {
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::cancel(request, host_id, &payload.cancellation_reason, now)
        }).await
    }

    pub async fn start(&self, request_id: Uuid, doctor_id: Uuid) -> Result<ConsultationRequest, RequestError> {
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::start(request, doctor_id, now)
        }).await
    }

    pub async fn complete_by_doctor(
        &self,
        request_id: Uuid,
        doctor_id: Uuid,
        payload: CompleteConsultationPayload,
    ) -> Result<ConsultationRequest, RequestError> {
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::complete_by_doctor(
                request,
                doctor_id,
                payload.treatment_notes.clone(),
                payload.prescriptions.clone(),
                now,
            )
        }).await
    }

    pub async fn complete_by_host(
        &self,
        request_id: Uuid,
        host_id: Uuid,
        payload: HostCompletePayload,
    ) -> Result<ConsultationRequest, RequestError> {
        self.apply_transition(request_id, |request, now| {
            RequestLifecycle::complete_by_host(request, host_id, payload.completion_notes.clone(), now)
        }).await
    }

    async fn load(&self, request_id: Uuid) -> Result<ConsultationRequest, RequestError> {
        self.store.get(request_id).await?
            .ok_or_else(|| RequestError::request_not_found(request_id))
    }

    async fn resolve_clinic(&self, host_id: Uuid, clinic_id: Option<Uuid>) -> Result<Clinic, RequestError> {
        let clinic = match clinic_id {
            Some(id) => self.clinics.get_clinic(id).await
                .map_err(|e| RequestError::Storage(e.to_string()))?
                .ok_or_else(|| RequestError::clinic_not_found(id))?,
            None => self.clinics.primary_clinic_for(host_id).await
                .map_err(|e| RequestError::Storage(e.to_string()))?
                .ok_or_else(|| RequestError::Validation(
                    "clinic_id is required when the host has no primary clinic".to_string(),
                ))?,
        };

        if clinic.host_id != host_id {
            warn!("Host {} tried to create a request for clinic {}", host_id, clinic.id);
            return Err(RequestError::Unauthorized("clinic is not owned by this host".to_string()));
        }
        Ok(clinic)
    }

    async fn apply_transition<F>(&self, request_id: Uuid, transition: F) -> Result<ConsultationRequest, RequestError>
    where
        F: Fn(ConsultationRequest, DateTime<Utc>) -> Result<TransitionOutcome, RequestError> + Send + Sync,
    {
        for attempt in 1..=self.max_retries {
            let current = self.load(request_id).await?;
            let expected_version = current.version;

            let outcome = transition(current, Utc::now())?;
            if !outcome.changed {
                debug!("Request {} unchanged, skipping write", request_id);
                return Ok(outcome.request);
            }

            if let Err(violation) = outcome.request.check_invariants() {
                error!("Transition on request {} broke an invariant: {}", request_id, violation);
                return Err(RequestError::Storage(violation));
            }

            match self.store.compare_and_swap(expected_version, outcome.request).await? {
                SwapOutcome::Applied(stored) => {
                    info!("Request {} is now {} (version {})", stored.id, stored.status, stored.version);

                    let notifications: Vec<Notification> = outcome.notifications.iter()
                        .map(|planned| planned.render(&stored))
                        .collect();
                    self.dispatcher.dispatch(notifications).await;

                    return Ok(stored);
                }
                SwapOutcome::VersionConflict => {
                    warn!(
                        "Concurrent update on request {} (attempt {}/{}), re-reading",
                        request_id, attempt, self.max_retries
                    );
                }
            }
        }

        error!("Giving up on request {} after {} conflicting writes", request_id, self.max_retries);
        Err(RequestError::ConcurrentModification)
    }
}
