use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{UpdateAppointmentStatusRequest, UpdateDoctorProfileRequest};
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn get_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let stats = service
        .get_dashboard(&user.id, Utc::now().date_naive(), auth.token())
        .await?;

    let mut body = json!(stats);
    body["success"] = json!(true);

    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let profile = service.get_profile(&user.id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "user": profile.user,
        "doctor": profile.doctor
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    service.update_profile(&user.id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let board = service
        .get_appointment_board(&user.id, Utc::now().date_naive(), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointments": board
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} updating appointment {}", user.id, appointment_id);

    let service = DoctorService::new(&config);
    let appointment = service
        .update_appointment_status(&appointment_id, request.status, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} deleting appointment {}", user.id, appointment_id);

    let service = DoctorService::new(&config);
    service.delete_appointment(&appointment_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

#[axum::debug_handler]
pub async fn start_call(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} starting call for appointment {}", user.id, appointment_id);

    let service = DoctorService::new(&config);
    let call = service.start_call(&appointment_id, auth.token()).await?;

    let message = if call.already_started {
        "Call already started"
    } else {
        "Call started successfully"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": call.appointment
    })))
}

#[axum::debug_handler]
pub async fn get_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let patients = service.get_patient_roster(&user.id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "patients": patients
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let detail = service.get_patient_detail(&patient_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "patient": detail.patient,
        "appointments": detail.appointments
    })))
}
