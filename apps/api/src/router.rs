use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use consultation_cell::{consultation_routes, ConsultationState};

pub fn create_router(state: Arc<ConsultationState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dental consultation API is running!" }))
        .merge(consultation_routes(state))
}
