use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::resolve_actor;

use crate::models::{
    CancelRequestPayload, CompleteConsultationPayload, ConfirmDoctorPayload, CreateRequestPayload,
    DoctorActionPayload, HostCompletePayload, RequestError, RequestListQuery,
    StartConsultationPayload,
};
use crate::state::ConsultationState;

impl From<RequestError> for AppError {
    fn from(e: RequestError) -> Self {
        let message = e.to_string();
        match e {
            RequestError::Validation(msg) => AppError::ValidationError(msg),
            RequestError::NotFound { .. } | RequestError::NoEligibleDoctors { .. } => AppError::NotFound(message),
            RequestError::Unauthorized(_) | RequestError::DoctorNotOffered => AppError::Forbidden(message),
            RequestError::InvalidState { .. }
            | RequestError::DoctorNotAccepted
            | RequestError::AlreadyOffered
            | RequestError::ConcurrentModification => AppError::Conflict(message),
            RequestError::Storage(msg) => AppError::Database(msg),
        }
    }
}

fn success(data: Value, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
        "message": message
    }))
}

fn to_data<T: serde::Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

// ==============================================================================
// HOST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_request(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let host_id = resolve_actor(&user, payload.user_id)?;

    let created = state.requests.create_request(host_id, payload).await?;
    let message = format!("Request sent to {} doctors", created.contacted_doctors);

    Ok((StatusCode::CREATED, success(to_data(&created)?, &message)))
}

#[axum::debug_handler]
pub async fn confirm_doctor(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(payload): Json<ConfirmDoctorPayload>,
) -> Result<Json<Value>, AppError> {
    let host_id = resolve_actor(&user, payload.user_id)?;

    let request = state.requests.confirm_doctor(request_id, host_id, payload).await?;
    Ok(success(to_data(&request)?, "Doctor confirmed"))
}

#[axum::debug_handler]
pub async fn cancel_request(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(payload): Json<CancelRequestPayload>,
) -> Result<Json<Value>, AppError> {
    let host_id = resolve_actor(&user, payload.user_id)?;

    let request = state.requests.cancel(request_id, host_id, payload).await?;
    Ok(success(to_data(&request)?, "Request cancelled"))
}

#[axum::debug_handler]
pub async fn host_complete(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    payload: Option<Json<HostCompletePayload>>,
) -> Result<Json<Value>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let host_id = resolve_actor(&user, payload.user_id)?;

    let request = state.requests.complete_by_host(request_id, host_id, payload).await?;
    Ok(success(to_data(&request)?, "Consultation completed"))
}

#[axum::debug_handler]
pub async fn list_host_requests(
    State(state): State<Arc<ConsultationState>>,
    Query(query): Query<RequestListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let host_id = resolve_actor(&user, None)?;

    let page = state.queries.host_requests(host_id, &query).await?;
    Ok(success(to_data(&page)?, "Requests retrieved"))
}

#[axum::debug_handler]
pub async fn list_accepted_doctors(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let host_id = resolve_actor(&user, None)?;

    let doctors = state.queries.accepted_doctors(request_id, host_id).await?;
    Ok(success(to_data(&doctors)?, "Accepted doctors retrieved"))
}

#[axum::debug_handler]
pub async fn host_stats(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let host_id = resolve_actor(&user, None)?;

    let stats = state.statistics.host_stats(host_id).await?;
    Ok(success(to_data(&stats)?, "Statistics retrieved"))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_request(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = resolve_actor(&user, None)?;

    let request = state.requests.get_request(request_id, user_id).await?;
    Ok(success(to_data(&request)?, "Request retrieved"))
}

#[axum::debug_handler]
pub async fn accept_request(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    payload: Option<Json<DoctorActionPayload>>,
) -> Result<Json<Value>, AppError> {
    let claimed = payload.and_then(|Json(p)| p.user_id);
    let doctor_id = resolve_actor(&user, claimed)?;
    debug!("Doctor {} accepting request {}", doctor_id, request_id);

    let request = state.requests.accept(request_id, doctor_id).await?;
    Ok(success(to_data(&request)?, "Request accepted"))
}

#[axum::debug_handler]
pub async fn decline_request(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    payload: Option<Json<DoctorActionPayload>>,
) -> Result<Json<Value>, AppError> {
    let claimed = payload.and_then(|Json(p)| p.user_id);
    let doctor_id = resolve_actor(&user, claimed)?;

    let request = state.requests.decline(request_id, doctor_id).await?;
    Ok(success(to_data(&request)?, "Request declined"))
}

#[axum::debug_handler]
pub async fn list_available_requests(
    State(state): State<Arc<ConsultationState>>,
    Query(query): Query<RequestListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_actor(&user, None)?;

    let page = state.queries.available_for_doctor(doctor_id, &query).await?;
    Ok(success(to_data(&page)?, "Available requests retrieved"))
}

#[axum::debug_handler]
pub async fn list_accepted_requests(
    State(state): State<Arc<ConsultationState>>,
    Query(query): Query<RequestListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_actor(&user, None)?;

    let page = state.queries.accepted_by_doctor(doctor_id, &query).await?;
    Ok(success(to_data(&page)?, "Accepted requests retrieved"))
}

#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    payload: Option<Json<StartConsultationPayload>>,
) -> Result<Json<Value>, AppError> {
    let claimed = payload.and_then(|Json(p)| p.consultant_id);
    let doctor_id = resolve_actor(&user, claimed)?;

    let request = state.requests.start(request_id, doctor_id).await?;
    Ok(success(to_data(&request)?, "Consultation started"))
}

#[axum::debug_handler]
pub async fn complete_consultation(
    State(state): State<Arc<ConsultationState>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    payload: Option<Json<CompleteConsultationPayload>>,
) -> Result<Json<Value>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let doctor_id = resolve_actor(&user, payload.consultant_id)?;

    let request = state.requests.complete_by_doctor(request_id, doctor_id, payload).await?;
    Ok(success(to_data(&request)?, "Consultation completed"))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<ConsultationState>>,
    Query(query): Query<RequestListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_actor(&user, None)?;

    let page = state.queries.doctor_appointments(doctor_id, &query).await?;
    Ok(success(to_data(&page)?, "Appointments retrieved"))
}

#[axum::debug_handler]
pub async fn doctor_stats(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_actor(&user, None)?;

    let stats = state.statistics.doctor_stats(doctor_id).await?;
    Ok(success(to_data(&stats)?, "Statistics retrieved"))
}
