// libs/consultation-cell/src/services/acceptance.rs
use tracing::debug;
use uuid::Uuid;

use crate::models::{ConsultationRequest, DoctorIdSet, RequestAction, RequestError, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceOutcome {
    Recorded,
    AlreadyAccepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineOutcome {
    Declined,
    AlreadyDeclined,
}

/// Membership bookkeeping for the `sent_to` / `accepted_by` / `declined_by`
/// sets of a single request.
///
/// Every mutation keeps `accepted_by ⊆ sent_to` and `declined_by ⊆ sent_to`,
/// with the two subsets disjoint.
pub struct AcceptanceTracker;

impl AcceptanceTracker {
    /// Fixes the recipient set. Allowed exactly once, with a non-empty set.
    pub fn offer(request: &mut ConsultationRequest, doctors: DoctorIdSet) -> Result<(), RequestError> {
        if !request.sent_to_user_ids.is_empty() {
            return Err(RequestError::AlreadyOffered);
        }
        if doctors.is_empty() {
            return Err(RequestError::NoEligibleDoctors {
                specialization: request.specialization.clone(),
            });
        }

        debug!("Offering request {} to {} doctors", request.id, doctors.len());
        request.sent_to_user_ids = doctors;
        Ok(())
    }

    /// Adds the doctor to `accepted_by`. The first acceptance moves the
    /// request from PENDING to ACCEPTED.
    pub fn record_acceptance(
        request: &mut ConsultationRequest,
        doctor_id: Uuid,
    ) -> Result<AcceptanceOutcome, RequestError> {
        Self::ensure_offered(request, doctor_id)?;
        Self::ensure_open(request, RequestAction::Accept)?;

        request.declined_by_user_ids.remove(&doctor_id);
        if !request.accepted_by_user_ids.insert(doctor_id) {
            return Ok(AcceptanceOutcome::AlreadyAccepted);
        }

        if request.status == RequestStatus::Pending {
            request.status = RequestStatus::Accepted;
        }
        Ok(AcceptanceOutcome::Recorded)
    }

    /// Withdraws interest. Status never moves backwards.
    pub fn record_decline(
        request: &mut ConsultationRequest,
        doctor_id: Uuid,
    ) -> Result<DeclineOutcome, RequestError> {
        Self::ensure_offered(request, doctor_id)?;
        Self::ensure_open(request, RequestAction::Decline)?;

        Self::remove_acceptance(request, doctor_id);
        if request.declined_by_user_ids.insert(doctor_id) {
            Ok(DeclineOutcome::Declined)
        } else {
            Ok(DeclineOutcome::AlreadyDeclined)
        }
    }

    pub fn remove_acceptance(request: &mut ConsultationRequest, doctor_id: Uuid) -> bool {
        request.accepted_by_user_ids.remove(&doctor_id)
    }

    pub fn count_accepted(request: &ConsultationRequest) -> usize {
        request.accepted_by_user_ids.len()
    }

    fn ensure_offered(request: &ConsultationRequest, doctor_id: Uuid) -> Result<(), RequestError> {
        if request.sent_to_user_ids.contains(&doctor_id) {
            Ok(())
        } else {
            Err(RequestError::DoctorNotOffered)
        }
    }

    fn ensure_open(request: &ConsultationRequest, action: RequestAction) -> Result<(), RequestError> {
        if request.status.is_open() {
            Ok(())
        } else {
            Err(RequestError::InvalidState { status: request.status, action })
        }
    }
}
