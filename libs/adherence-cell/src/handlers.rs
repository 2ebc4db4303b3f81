use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::UuidPath;

use crate::models::EnableTrackingOutcome;
use crate::services::AdherenceService;

#[axum::debug_handler]
pub async fn get_prescription_adherence(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    UuidPath(prescription_id): UuidPath,
) -> Result<Json<Value>, AppError> {
    debug!("User {} requested adherence for {}", user.id, prescription_id);

    let service = AdherenceService::new(&config);
    let stats = service.get_summary(&prescription_id.to_string(), auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}

#[axum::debug_handler]
pub async fn get_tracking_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AdherenceService::new(&config);
    let status = service.get_tracking_status(auth.token()).await;

    Ok(Json(json!({
        "success": true,
        "isEnabled": status.is_enabled,
        "message": status.message
    })))
}

#[axum::debug_handler]
pub async fn enable_tracking(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} requested adherence tracking enablement", user.id);

    let service = AdherenceService::new(&config);
    let outcome = service.enable_tracking(auth.token()).await;
    let success = matches!(outcome, EnableTrackingOutcome::Enabled { .. });

    let mut body = json!(outcome);
    body["success"] = json!(success);

    Ok(Json(body))
}
