use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::UuidPath;

use crate::models::{
    CreatePrescriptionRequest, GeneratePrescriptionRequest, PrescriptionListQuery,
    SuggestPrescriptionRequest, UpdatePrescriptionRequest,
};
use crate::services::{PrescriptionAiService, PrescriptionService};

#[axum::debug_handler]
pub async fn create_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} creating prescription for patient {}", user.id, request.pid);

    let service = PrescriptionService::new(&config);
    let prescription = service.create_prescription(request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription created successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PrescriptionListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = query.did
        .filter(|did| !did.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Doctor ID required".to_string()))?;

    let service = PrescriptionService::new(&config);
    let prescriptions = service.list_prescriptions(&doctor_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "prescriptions": prescriptions
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    UuidPath(prescription_id): UuidPath,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);
    let prescription = service.get_prescription(prescription_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription
    })))
}

#[axum::debug_handler]
pub async fn update_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    UuidPath(prescription_id): UuidPath,
    Json(request): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} updating prescription {}", user.id, prescription_id);

    let service = PrescriptionService::new(&config);
    let prescription = service.update_prescription(prescription_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn send_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    UuidPath(prescription_id): UuidPath,
) -> Result<Json<Value>, AppError> {
    debug!("User {} sending prescription {}", user.id, prescription_id);

    let service = PrescriptionService::new(&config);
    let prescription = service.send_prescription(prescription_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription sent to patient successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} deleting prescription {}", user.id, raw_id);

    // Non-UUID ids match no row.
    if let Ok(prescription_id) = Uuid::parse_str(&raw_id) {
        let service = PrescriptionService::new(&config);
        service.delete_prescription(prescription_id, auth.token()).await?;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Prescription deleted successfully"
    })))
}

#[axum::debug_handler]
pub async fn generate_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GeneratePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} requested an AI draft for patient {}", user.id, request.pid);

    let service = PrescriptionAiService::new(&config);
    let draft = service
        .generate_for_patient(&request.pid, request.aid.as_deref(), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "prescription": draft
    })))
}

#[axum::debug_handler]
pub async fn suggest_prescription(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SuggestPrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionAiService::new(&config);
    let suggestion = service.suggest(&request).await?;

    Ok(Json(json!({
        "success": true,
        "prescription": suggestion
    })))
}
