use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use adherence_cell::router::adherence_routes;
use doctor_cell::router::doctor_routes;
use prescription_cell::router::{ai_prescription_routes, prescription_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Doctor Portal API is running!" }))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/ai/prescriptions", ai_prescription_routes(state.clone()))
        .nest("/adherence", adherence_routes(state.clone()))
        .nest("/doctor", doctor_routes(state))
}
