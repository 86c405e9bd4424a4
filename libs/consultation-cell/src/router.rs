use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ConsultationState;

pub fn consultation_routes(state: Arc<ConsultationState>) -> Router {
    Router::new()
        // Doctor-facing request endpoints
        .route("/requests", post(handlers::create_request))
        .route("/requests/available", get(handlers::list_available_requests))
        .route("/requests/accepted", get(handlers::list_accepted_requests))
        .route("/requests/{id}", get(handlers::get_request))
        .route("/requests/{id}/accept", put(handlers::accept_request))
        .route("/requests/{id}/decline", put(handlers::decline_request))

        // Host management
        .route("/host/requests", get(handlers::list_host_requests))
        .route("/host/stats", get(handlers::host_stats))
        .route("/host/request/{id}/confirm-doctor", post(handlers::confirm_doctor))
        .route("/host/request/{id}/cancel", post(handlers::cancel_request))
        .route("/host/request/{id}/complete", post(handlers::host_complete))
        .route("/host/request/{id}/accepted-doctors", get(handlers::list_accepted_doctors))

        // Assigned doctor workflow
        .route("/consultant-appointments", get(handlers::list_doctor_appointments))
        .route("/consultant-appointments/stats", get(handlers::doctor_stats))
        .route("/consultant-appointments/{id}/start", post(handlers::start_consultation))
        .route("/consultant-appointments/{id}/complete", post(handlers::complete_consultation))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
