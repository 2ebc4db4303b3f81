use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn prescription_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_prescription).get(handlers::list_prescriptions))
        .route(
            "/{prescription_id}",
            get(handlers::get_prescription)
                .patch(handlers::update_prescription)
                .delete(handlers::delete_prescription),
        )
        .route("/{prescription_id}/send", post(handlers::send_prescription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn ai_prescription_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate_prescription))
        .route("/suggest", post(handlers::suggest_prescription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
