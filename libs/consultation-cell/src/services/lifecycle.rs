// libs/consultation-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use notification_cell::Notification;

use crate::models::{
    ConsultationRequest, CreateRequestPayload, RequestAction, RequestError, RequestStatus,
};
use crate::services::acceptance::{AcceptanceOutcome, AcceptanceTracker, DeclineOutcome};

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 480;

impl RequestStatus {
    /// The transition graph. CANCELLED is reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;

        match (self, next) {
            (Pending, Accepted) => true,
            (Accepted, Confirmed) => true,
            (Confirmed, Started) => true,
            (Started, Completed) => true,
            (Pending | Accepted | Confirmed | Started, Cancelled) => true,
            (Pending, _) | (Accepted, _) | (Confirmed, _) | (Started, _) => false,
            (Completed, _) | (Cancelled, _) => false,
        }
    }

    pub fn allowed_transitions(&self) -> Vec<RequestStatus> {
        RequestStatus::ALL.iter()
            .copied()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// To the doctor the host picked.
    DoctorSelected,
    /// To the host, after confirming.
    DoctorConfirmed,
    /// To doctors who accepted but were not picked.
    RequestFilled,
    /// To the host, when the doctor completes.
    CompletedByDoctor,
    /// To the doctor, when the host completes.
    CompletedByHost,
    RequestCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNotification {
    pub recipient: Uuid,
    pub kind: NotificationKind,
}

impl PlannedNotification {
    pub fn new(recipient: Uuid, kind: NotificationKind) -> Self {
        Self { recipient, kind }
    }

    pub fn render(&self, request: &ConsultationRequest) -> Notification {
        let when = request.request_datetime.format("%d %b %Y %H:%M UTC");
        let (title, body) = match self.kind {
            NotificationKind::DoctorSelected => (
                "Request confirmed",
                format!("You have been confirmed for the {} consultation on {}", request.specialization, when),
            ),
            NotificationKind::DoctorConfirmed => (
                "Doctor confirmed",
                format!("Your {} request on {} now has a confirmed doctor", request.specialization, when),
            ),
            NotificationKind::RequestFilled => (
                "Request filled",
                format!("The {} request on {} was filled by another doctor", request.specialization, when),
            ),
            NotificationKind::CompletedByDoctor => (
                "Consultation completed",
                format!("The doctor marked the {} consultation as completed", request.specialization),
            ),
            NotificationKind::CompletedByHost => (
                "Consultation completed",
                format!("The clinic marked the {} consultation as completed", request.specialization),
            ),
            NotificationKind::RequestCancelled => (
                "Request cancelled",
                format!(
                    "The {} request on {} was cancelled: {}",
                    request.specialization,
                    when,
                    request.cancellation_reason.as_deref().unwrap_or("no reason given")
                ),
            ),
        };

        Notification::new(
            self.recipient,
            title,
            body,
            json!({
                "request_id": request.id,
                "status": request.status,
                "type": format!("{:?}", self.kind),
            }),
        )
    }
}

/// Result of applying one transition to a request snapshot.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: ConsultationRequest,
    pub notifications: Vec<PlannedNotification>,
    /// `false` for idempotent repeats; nothing needs writing.
    pub changed: bool,
}

impl TransitionOutcome {
    fn changed(request: ConsultationRequest, notifications: Vec<PlannedNotification>) -> Self {
        Self { request, notifications, changed: true }
    }

    fn unchanged(request: ConsultationRequest) -> Self {
        Self { request, notifications: Vec::new(), changed: false }
    }
}

/// Guards and effects of every request transition, as pure functions over a
/// snapshot. Persisting the result is the caller's job.
pub struct RequestLifecycle;

impl RequestLifecycle {
    pub fn validate_new_request(
        payload: &CreateRequestPayload,
        now: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        if payload.specialization.trim().is_empty() {
            return Err(RequestError::Validation("specialization is required".to_string()));
        }
        if payload.requirements.trim().is_empty() {
            return Err(RequestError::Validation("requirements are required".to_string()));
        }
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&payload.duration_minutes) {
            return Err(RequestError::Validation(format!(
                "duration_minutes must be between {} and {}",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        if payload.offering_rupees <= Decimal::ZERO {
            return Err(RequestError::Validation("offering_rupees must be positive".to_string()));
        }
        if payload.request_datetime <= now {
            return Err(RequestError::Validation("request_datetime must be in the future".to_string()));
        }
        Ok(())
    }

    /// Builds the PENDING row. Recipients are attached separately via
    /// [`AcceptanceTracker::offer`].
    pub fn new_request(
        host_id: Uuid,
        clinic_id: Uuid,
        payload: &CreateRequestPayload,
        now: DateTime<Utc>,
    ) -> ConsultationRequest {
        ConsultationRequest {
            id: Uuid::new_v4(),
            specialization: payload.specialization.trim().to_string(),
            requirements: payload.requirements.trim().to_string(),
            clinic_id,
            duration_minutes: payload.duration_minutes,
            request_datetime: payload.request_datetime,
            offering_rupees: payload.offering_rupees,
            status: RequestStatus::Pending,
            sent_to_user_ids: Default::default(),
            accepted_by_user_ids: Default::default(),
            declined_by_user_ids: Default::default(),
            assigned_doctor_id: None,
            confirmation_notes: None,
            cancellation_reason: None,
            completion_notes: None,
            treatment_notes: None,
            prescriptions: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            created_by: host_id,
            created_at: now,
            updated_by: host_id,
            updated_at: now,
            version: 1,
        }
    }

    pub fn accept(
        mut request: ConsultationRequest,
        doctor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        match AcceptanceTracker::record_acceptance(&mut request, doctor_id)? {
            AcceptanceOutcome::AlreadyAccepted => {
                debug!("Doctor {} already accepted request {}", doctor_id, request.id);
                Ok(TransitionOutcome::unchanged(request))
            }
            AcceptanceOutcome::Recorded => {
                Self::touch(&mut request, doctor_id, now);
                Ok(TransitionOutcome::changed(request, Vec::new()))
            }
        }
    }

    pub fn decline(
        mut request: ConsultationRequest,
        doctor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        match AcceptanceTracker::record_decline(&mut request, doctor_id)? {
            DeclineOutcome::AlreadyDeclined => Ok(TransitionOutcome::unchanged(request)),
            DeclineOutcome::Declined => {
                Self::touch(&mut request, doctor_id, now);
                Ok(TransitionOutcome::changed(request, Vec::new()))
            }
        }
    }

    /// ACCEPTED → CONFIRMED. The winner leaves `accepted_by` in the same
    /// write that assigns them, so the "filled" fan-out cannot include them.
    pub fn confirm(
        mut request: ConsultationRequest,
        host_id: Uuid,
        doctor_id: Uuid,
        confirmation_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        Self::ensure_creator(&request, host_id)?;
        Self::transition(&mut request, RequestStatus::Confirmed, RequestAction::Confirm)?;

        if !AcceptanceTracker::remove_acceptance(&mut request, doctor_id) {
            return Err(RequestError::DoctorNotAccepted);
        }

        request.assigned_doctor_id = Some(doctor_id);
        request.confirmation_notes = normalize(confirmation_notes);
        Self::touch(&mut request, host_id, now);

        let mut notifications = vec![
            PlannedNotification::new(doctor_id, NotificationKind::DoctorSelected),
            PlannedNotification::new(host_id, NotificationKind::DoctorConfirmed),
        ];
        notifications.extend(
            request.accepted_by_user_ids.iter()
                .map(|other| PlannedNotification::new(*other, NotificationKind::RequestFilled)),
        );

        Ok(TransitionOutcome::changed(request, notifications))
    }

    pub fn start(
        mut request: ConsultationRequest,
        doctor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        Self::ensure_assigned(&request, doctor_id, RequestAction::Start)?;
        Self::transition(&mut request, RequestStatus::Started, RequestAction::Start)?;

        request.started_at = Some(now);
        Self::touch(&mut request, doctor_id, now);
        Ok(TransitionOutcome::changed(request, Vec::new()))
    }

    pub fn complete_by_doctor(
        mut request: ConsultationRequest,
        doctor_id: Uuid,
        treatment_notes: Option<String>,
        prescriptions: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        Self::ensure_assigned(&request, doctor_id, RequestAction::Complete)?;
        Self::transition(&mut request, RequestStatus::Completed, RequestAction::Complete)?;

        request.treatment_notes = normalize(treatment_notes);
        request.prescriptions = normalize(prescriptions);
        request.completed_at = Some(now);
        Self::touch(&mut request, doctor_id, now);

        let host = request.created_by;
        Ok(TransitionOutcome::changed(
            request,
            vec![PlannedNotification::new(host, NotificationKind::CompletedByDoctor)],
        ))
    }

    pub fn complete_by_host(
        mut request: ConsultationRequest,
        host_id: Uuid,
        completion_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        Self::ensure_creator(&request, host_id)?;
        Self::transition(&mut request, RequestStatus::Completed, RequestAction::Complete)?;

        request.completion_notes = normalize(completion_notes);
        request.completed_at = Some(now);
        Self::touch(&mut request, host_id, now);

        let notifications = request.assigned_doctor_id
            .map(|doctor| vec![PlannedNotification::new(doctor, NotificationKind::CompletedByHost)])
            .unwrap_or_default();
        Ok(TransitionOutcome::changed(request, notifications))
    }

    /// Any non-terminal state → CANCELLED. Clears the assignment.
    pub fn cancel(
        mut request: ConsultationRequest,
        host_id: Uuid,
        cancellation_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RequestError> {
        Self::ensure_creator(&request, host_id)?;
        Self::transition(&mut request, RequestStatus::Cancelled, RequestAction::Cancel)?;

        let reason = cancellation_reason.trim();
        if reason.is_empty() {
            return Err(RequestError::Validation("cancellation_reason is required".to_string()));
        }

        let mut notifications: Vec<PlannedNotification> = request.accepted_by_user_ids.iter()
            .map(|doctor| PlannedNotification::new(*doctor, NotificationKind::RequestCancelled))
            .collect();
        if let Some(assigned) = request.assigned_doctor_id.take() {
            notifications.push(PlannedNotification::new(assigned, NotificationKind::RequestCancelled));
        }

        request.cancellation_reason = Some(reason.to_string());
        request.cancelled_at = Some(now);
        Self::touch(&mut request, host_id, now);
        Ok(TransitionOutcome::changed(request, notifications))
    }

    fn transition(
        request: &mut ConsultationRequest,
        next: RequestStatus,
        action: RequestAction,
    ) -> Result<(), RequestError> {
        if !request.status.can_transition_to(next) {
            warn!("Rejected {} on request {} in status {}", action, request.id, request.status);
            return Err(RequestError::InvalidState { status: request.status, action });
        }
        request.status = next;
        Ok(())
    }

    fn ensure_creator(request: &ConsultationRequest, host_id: Uuid) -> Result<(), RequestError> {
        if request.is_created_by(host_id) {
            Ok(())
        } else {
            Err(RequestError::Unauthorized("only the request creator can do this".to_string()))
        }
    }

    /// With no doctor assigned there is nobody to authorize against, so the
    /// call is reported as a wrong-state error instead.
    fn ensure_assigned(
        request: &ConsultationRequest,
        doctor_id: Uuid,
        action: RequestAction,
    ) -> Result<(), RequestError> {
        match request.assigned_doctor_id {
            Some(assigned) if assigned == doctor_id => Ok(()),
            Some(_) => Err(RequestError::Unauthorized(
                "only the assigned doctor can do this".to_string(),
            )),
            None => Err(RequestError::InvalidState { status: request.status, action }),
        }
    }

    fn touch(request: &mut ConsultationRequest, actor: Uuid, now: DateTime<Utc>) {
        request.updated_by = actor;
        request.updated_at = now;
    }
}

fn normalize(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
