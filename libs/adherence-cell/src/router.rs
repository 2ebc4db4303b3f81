use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn adherence_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        // Polled by the prescription progress view
        .route("/prescriptions/{prescription_id}", get(handlers::get_prescription_adherence))
        .route("/tracking", get(handlers::get_tracking_status).post(handlers::enable_tracking))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
