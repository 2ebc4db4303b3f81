use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub prescription_id: Uuid,
    pub pid: String,
    pub did: String,
    pub aid: Option<String>,
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    pub instructions: Option<String>,
    pub diet_advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub is_active: bool,
    pub sent_to_patient: bool,
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ai_generated: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Row shape of the doctor's prescription list, with embedded patient info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionListItem {
    pub prescription_id: Uuid,
    pub diagnosis: String,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    pub created_at: Option<DateTime<Utc>>,
    pub sent_to_patient: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub patients: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub did: String,
    pub aid: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    pub instructions: Option<String>,
    pub diet_advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub ai_generated: bool,
}

/// Full replacement of a prescription's clinical content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    pub instructions: Option<String>,
    pub diet_advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionListQuery {
    pub did: Option<String>,
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionState {
    Draft,
    Sent,
    Deleted,
}

impl PrescriptionState {
    pub fn of(prescription: &Prescription) -> Self {
        match (prescription.is_active, prescription.sent_to_patient) {
            (false, _) => PrescriptionState::Deleted,
            (true, true) => PrescriptionState::Sent,
            (true, false) => PrescriptionState::Draft,
        }
    }
}

impl fmt::Display for PrescriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrescriptionState::Draft => write!(f, "draft"),
            PrescriptionState::Sent => write!(f, "sent"),
            PrescriptionState::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionAction {
    Update,
    Send,
    Delete,
}

impl fmt::Display for PrescriptionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrescriptionAction::Update => write!(f, "updated"),
            PrescriptionAction::Send => write!(f, "sent"),
            PrescriptionAction::Delete => write!(f, "deleted"),
        }
    }
}

// ==============================================================================
// AI DRAFTING
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePrescriptionRequest {
    #[serde(default)]
    pub pid: String,
    pub aid: Option<String>,
}

/// Draft returned to the doctor for review; nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPrescriptionDraft {
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub medicines: Vec<Medicine>,
    pub instructions: Option<String>,
    pub diet_advice: Option<String>,
    pub follow_up_date: NaiveDate,
    pub safety_notes: String,
}

/// The JSON object the model is asked to produce.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrescription {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    pub instructions: Option<String>,
    pub diet_advice: Option<String>,
    pub follow_up_days: Option<i64>,
    pub safety_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SymptomInput {
    List(Vec<String>),
    Text(String),
}

impl SymptomInput {
    pub fn joined(&self) -> String {
        match self {
            SymptomInput::List(items) => items.join(", "),
            SymptomInput::Text(text) => text.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SymptomInput::List(items) => items.iter().all(|s| s.trim().is_empty()),
            SymptomInput::Text(text) => text.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestPrescriptionRequest {
    #[serde(default)]
    pub diagnosis: String,
    pub symptoms: Option<SymptomInput>,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionSuggestion {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub diet_advice: String,
    #[serde(default)]
    pub lifestyle_advice: String,
    #[serde(default)]
    pub follow_up_days: u32,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Prescription is {from} and cannot be {action}")]
    InvalidTransition {
        from: PrescriptionState,
        action: PrescriptionAction,
    },

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    DatabaseError(String),

    #[error("AI service error: {0}")]
    AiServiceError(String),
}

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::NotFound | PrescriptionError::PatientNotFound => {
                AppError::NotFound(err.to_string())
            }
            // Deleted prescriptions are invisible to callers.
            PrescriptionError::InvalidTransition { from: PrescriptionState::Deleted, .. } => {
                AppError::NotFound(PrescriptionError::NotFound.to_string())
            }
            PrescriptionError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            PrescriptionError::ValidationError(msg) => AppError::ValidationError(msg),
            PrescriptionError::DatabaseError(msg) => AppError::Database(msg),
            PrescriptionError::AiServiceError(msg) => AppError::ExternalService(msg),
        }
    }
}
