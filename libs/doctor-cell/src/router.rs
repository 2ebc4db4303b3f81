use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/profile", get(handlers::get_profile).patch(handlers::update_profile))
        .route("/appointments", get(handlers::get_appointments))
        .route(
            "/appointments/{appointment_id}",
            patch(handlers::update_appointment_status).delete(handlers::delete_appointment),
        )
        .route("/appointments/{appointment_id}/start-call", post(handlers::start_call))
        .route("/patients", get(handlers::get_patients))
        .route("/patients/{patient_id}", get(handlers::get_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
