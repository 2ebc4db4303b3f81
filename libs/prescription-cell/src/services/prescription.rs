use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreatePrescriptionRequest, Medicine, Prescription, PrescriptionAction, PrescriptionError,
    PrescriptionListItem, PrescriptionState, UpdatePrescriptionRequest,
};
use crate::services::duration::normalize_duration;
use crate::services::lifecycle::PrescriptionLifecycleService;
use crate::services::notification::NotificationService;

const LIST_SELECT: &str = "prescription_id,diagnosis,medicines,created_at,sent_to_patient,sent_at,\
patients(pid,city,state,users(name,email,profile_image_url))";

pub struct PrescriptionService {
    supabase: SupabaseClient,
    lifecycle: PrescriptionLifecycleService,
    notifications: NotificationService,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            lifecycle: PrescriptionLifecycleService::new(),
            notifications: NotificationService::new(config),
        }
    }

    fn first_row(rows: Vec<Value>) -> Result<Option<Prescription>, PrescriptionError> {
        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PrescriptionError::DatabaseError(format!("Malformed prescription row: {}", e)))
    }

    /// Creates a draft prescription and fires the creation notification.
    pub async fn create_prescription(
        &self,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        self.lifecycle.validate_create(&request)?;

        debug!("Creating prescription for patient {} by doctor {}", request.pid, request.did);

        let medicines: Vec<Medicine> = if request.ai_generated {
            request.medicines
                .into_iter()
                .map(|m| Medicine { duration: normalize_duration(&m.duration), ..m })
                .collect()
        } else {
            request.medicines
        };

        let prescription_data = json!({
            "pid": request.pid,
            "did": request.did,
            "aid": request.aid,
            "diagnosis": request.diagnosis,
            "symptoms": request.symptoms,
            "medicines": medicines,
            "instructions": request.instructions,
            "diet_advice": request.diet_advice,
            "follow_up_date": request.follow_up_date,
            "ai_generated": request.ai_generated,
            "is_active": true,
            "sent_to_patient": false
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/prescriptions",
            Some(auth_token),
            Some(prescription_data),
            Some(SupabaseClient::representation_headers()),
        ).await
        .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        let prescription = Self::first_row(rows)?
            .ok_or_else(|| PrescriptionError::DatabaseError("Failed to create prescription".to_string()))?;

        info!("Prescription created: {}", prescription.prescription_id);

        // Detached; the outcome is only logged.
        self.notifications.notify_prescription_created(&prescription);

        Ok(prescription)
    }

    /// Looks a prescription up regardless of lifecycle state.
    pub async fn find_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Prescription>, PrescriptionError> {
        debug!("Fetching prescription: {}", prescription_id);

        let path = format!("/rest/v1/prescriptions?prescription_id=eq.{}", prescription_id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        Self::first_row(rows)
    }

    /// Active prescription by id; deleted ones are reported as not found.
    pub async fn get_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        match self.find_prescription(prescription_id, auth_token).await? {
            Some(p) if p.is_active => Ok(p),
            _ => Err(PrescriptionError::NotFound),
        }
    }

    pub async fn list_prescriptions(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<PrescriptionListItem>, PrescriptionError> {
        if doctor_id.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Doctor ID required".to_string()));
        }

        debug!("Listing prescriptions for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/prescriptions?did=eq.{}&is_active=eq.true&order=created_at.desc&select={}",
            doctor_id, LIST_SELECT
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))
    }

    /// Loads the prescription and checks `action` against its current state.
    async fn authorize_action(
        &self,
        prescription_id: Uuid,
        action: PrescriptionAction,
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        let current = self.find_prescription(prescription_id, auth_token)
            .await?
            .ok_or(PrescriptionError::NotFound)?;

        self.lifecycle.apply(PrescriptionState::of(&current), action)?;
        Ok(())
    }

    async fn patch_active(
        &self,
        prescription_id: Uuid,
        changes: Value,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        // The is_active filter keeps a concurrent delete from being undone.
        let path = format!(
            "/rest/v1/prescriptions?prescription_id=eq.{}&is_active=eq.true",
            prescription_id
        );

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(changes),
            Some(SupabaseClient::representation_headers()),
        ).await
        .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        Self::first_row(rows)?.ok_or(PrescriptionError::NotFound)
    }

    /// Replaces the clinical content; lifecycle flags are left alone.
    pub async fn update_prescription(
        &self,
        prescription_id: Uuid,
        request: UpdatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        self.lifecycle.validate_update(&request)?;
        self.authorize_action(prescription_id, PrescriptionAction::Update, auth_token).await?;

        let changes = json!({
            "diagnosis": request.diagnosis,
            "symptoms": request.symptoms,
            "medicines": request.medicines,
            "instructions": request.instructions,
            "diet_advice": request.diet_advice,
            "follow_up_date": request.follow_up_date,
            "updated_at": Utc::now().to_rfc3339()
        });

        let prescription = self.patch_active(prescription_id, changes, auth_token).await?;
        info!("Prescription updated: {}", prescription_id);

        Ok(prescription)
    }

    /// Marks the prescription as delivered. Repeating it re-stamps `sent_at`.
    pub async fn send_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        self.authorize_action(prescription_id, PrescriptionAction::Send, auth_token).await?;

        let changes = json!({
            "sent_to_patient": true,
            "sent_at": Utc::now().to_rfc3339()
        });

        let prescription = self.patch_active(prescription_id, changes, auth_token).await?;
        info!("Prescription sent to patient: {}", prescription_id);

        Ok(prescription)
    }

    /// Soft delete. Succeeds for unknown and already-deleted ids alike, since
    /// every state accepts a delete.
    pub async fn delete_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        let path = format!("/rest/v1/prescriptions?prescription_id=eq.{}", prescription_id);

        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_active": false })),
            Some(SupabaseClient::representation_headers()),
        ).await
        .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        info!("Prescription deleted: {}", prescription_id);
        Ok(())
    }
}
