// libs/consultation-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use doctor_cell::models::DoctorSummary;

// ==============================================================================
// DOCTOR ID SET
// ==============================================================================

/// Set of doctor ids stored on a request (`sent_to`, `accepted_by`, `declined_by`).
///
/// Always encoded as a sorted JSON array. Decoding also accepts the legacy
/// forms found in older rows: a JSON array serialized into a string, an empty
/// string, or `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorIdSet(BTreeSet<Uuid>);

impl DoctorIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.0.contains(id)
    }

    /// Returns `true` when the id was not already present.
    pub fn insert(&mut self, id: Uuid) -> bool {
        self.0.insert(id)
    }

    /// Returns `true` when the id was present.
    pub fn remove(&mut self, id: &Uuid) -> bool {
        self.0.remove(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &DoctorIdSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn to_vec(&self) -> Vec<Uuid> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Uuid> for DoctorIdSet {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeSet<Uuid>> for DoctorIdSet {
    fn from(ids: BTreeSet<Uuid>) -> Self {
        Self(ids)
    }
}

impl Serialize for DoctorIdSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for DoctorIdSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Encoded {
            Native(Vec<Uuid>),
            Legacy(String),
        }

        match Option::<Encoded>::deserialize(deserializer)? {
            None => Ok(Self::new()),
            Some(Encoded::Native(ids)) => Ok(ids.into_iter().collect()),
            Some(Encoded::Legacy(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(Self::new());
                }
                let ids: Vec<Uuid> = serde_json::from_str(trimmed).map_err(|e| {
                    de::Error::custom(format!("invalid string-encoded id set: {}", e))
                })?;
                Ok(ids.into_iter().collect())
            }
        }
    }
}

// ==============================================================================
// REQUEST STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "ACCEPTED")]
    Accepted,
    #[serde(alias = "CONFIRMED")]
    Confirmed,
    #[serde(alias = "STARTED")]
    Started,
    #[serde(alias = "COMPLETED")]
    Completed,
    #[serde(alias = "CANCELLED")]
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::Confirmed,
        RequestStatus::Started,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Started => "started",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Still collecting acceptances.
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Accepted)
    }

    /// States in which `assigned_doctor_id` must be set.
    pub fn requires_assignment(&self) -> bool {
        matches!(self, RequestStatus::Confirmed | RequestStatus::Started | RequestStatus::Completed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown request status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        RequestStatus::ALL.iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Caller-facing name of a state-changing operation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Accept,
    Decline,
    Confirm,
    Start,
    Complete,
    Cancel,
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestAction::Accept => "accept",
            RequestAction::Decline => "decline",
            RequestAction::Confirm => "confirm",
            RequestAction::Start => "start",
            RequestAction::Complete => "complete",
            RequestAction::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

// ==============================================================================
// CORE REQUEST MODEL
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub specialization: String,
    pub requirements: String,
    pub clinic_id: Uuid,
    pub duration_minutes: i32,
    pub request_datetime: DateTime<Utc>,
    pub offering_rupees: Decimal,
    pub status: RequestStatus,
    #[serde(default)]
    pub sent_to_user_ids: DoctorIdSet,
    #[serde(default)]
    pub accepted_by_user_ids: DoctorIdSet,
    #[serde(default)]
    pub declined_by_user_ids: DoctorIdSet,
    pub assigned_doctor_id: Option<Uuid>,
    pub confirmation_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub completion_notes: Option<String>,
    pub treatment_notes: Option<String>,
    pub prescriptions: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "initial_version")]
    pub version: i64,
}

fn initial_version() -> i64 {
    1
}

impl ConsultationRequest {
    pub fn is_created_by(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    pub fn is_assigned_to(&self, doctor_id: Uuid) -> bool {
        self.assigned_doctor_id == Some(doctor_id)
    }

    /// Creator, any offered doctor, or the assigned doctor.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_created_by(user_id)
            || self.sent_to_user_ids.contains(&user_id)
            || self.is_assigned_to(user_id)
    }

    /// Structural invariants that must hold for every stored row.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.status.requires_assignment() != self.assigned_doctor_id.is_some() {
            return Err(format!(
                "assigned doctor {:?} inconsistent with status {}",
                self.assigned_doctor_id, self.status
            ));
        }
        if !self.accepted_by_user_ids.is_subset(&self.sent_to_user_ids) {
            return Err("accepted_by is not a subset of sent_to".to_string());
        }
        if !self.declined_by_user_ids.is_subset(&self.sent_to_user_ids) {
            return Err("declined_by is not a subset of sent_to".to_string());
        }
        if let Some(assigned) = self.assigned_doctor_id {
            if self.accepted_by_user_ids.contains(&assigned) {
                return Err("assigned doctor still listed in accepted_by".to_string());
            }
        }
        Ok(())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestPayload {
    pub specialization: String,
    pub requirements: String,
    pub clinic_id: Option<Uuid>,
    pub duration_minutes: i32,
    pub request_datetime: DateTime<Utc>,
    pub offering_rupees: Decimal,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmDoctorPayload {
    pub doctor_id: Uuid,
    pub user_id: Option<Uuid>,
    pub confirmation_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequestPayload {
    pub user_id: Option<Uuid>,
    pub cancellation_reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostCompletePayload {
    pub user_id: Option<Uuid>,
    pub completion_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartConsultationPayload {
    pub consultant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteConsultationPayload {
    pub consultant_id: Option<Uuid>,
    pub treatment_notes: Option<String>,
    pub prescriptions: Option<String>,
}

/// Doctor-side accept/decline bodies are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorActionPayload {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedRequest {
    pub request: ConsultationRequest,
    pub contacted_doctors: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Store-level selection; every set field must match.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub created_by: Option<Uuid>,
    pub assigned_doctor_id: Option<Uuid>,
    pub offered_to: Option<Uuid>,
    pub accepted_by: Option<Uuid>,
    pub statuses: Vec<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, request: &ConsultationRequest) -> bool {
        self.created_by.map_or(true, |id| request.created_by == id)
            && self.assigned_doctor_id.map_or(true, |id| request.is_assigned_to(id))
            && self.offered_to.map_or(true, |id| request.sent_to_user_ids.contains(&id))
            && self.accepted_by.map_or(true, |id| request.accepted_by_user_ids.contains(&id))
            && (self.statuses.is_empty() || self.statuses.contains(&request.status))
    }
}

// ==============================================================================
// CLINIC MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub id: Uuid,
    pub host_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

// ==============================================================================
// QUERY PROJECTIONS
// ==============================================================================

/// Request joined with the display attributes list screens need.
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: ConsultationRequest,
    pub clinic: Option<Clinic>,
    pub assigned_doctor: Option<DoctorSummary>,
    pub accepted_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagedRequests {
    pub items: Vec<RequestView>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

// ==============================================================================
// STATISTICS MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DoctorRequestStats {
    pub accepted_pending_confirmation: usize,
    pub upcoming: usize,
    pub ongoing: usize,
    pub completed: usize,
    pub total_earnings: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostRequestStats {
    pub open: usize,
    pub incoming: usize,
    pub ongoing: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub total_spend: Decimal,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Cannot {action} a request in status {status}")]
    InvalidState { status: RequestStatus, action: RequestAction },

    #[error("Doctor was not offered this request")]
    DoctorNotOffered,

    #[error("Doctor has not accepted this request")]
    DoctorNotAccepted,

    #[error("Request has already been offered to doctors")]
    AlreadyOffered,

    #[error("No active verified doctors available for {specialization}")]
    NoEligibleDoctors { specialization: String },

    #[error("Request was modified concurrently, please retry")]
    ConcurrentModification,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RequestError {
    pub fn request_not_found(id: Uuid) -> Self {
        RequestError::NotFound { entity: "Request", id: id.to_string() }
    }

    pub fn clinic_not_found(id: impl fmt::Display) -> Self {
        RequestError::NotFound { entity: "Clinic", id: id.to_string() }
    }
}
