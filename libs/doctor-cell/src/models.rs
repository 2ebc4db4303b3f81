use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use adherence_cell::models::DailyAdherence;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub did: String,
    pub uid: String,
    #[serde(default)]
    pub consultation_fee: Option<f64>,
}

impl Doctor {
    pub fn fee(&self) -> f64 {
        self.consultation_fee.unwrap_or(0.0)
    }
}

// ==============================================================================
// PROFILE
// ==============================================================================

/// The signed-in user's `users` row and doctor record. The doctor record
/// carries the user's `profile_image_url`.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorProfile {
    pub user: Option<Value>,
    pub doctor: Option<Value>,
}

/// Distinguishes an absent field from an explicit `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub profile_image_url: Option<Option<String>>,
}

impl UserProfileUpdate {
    /// Columns to write. A blank phone leaves the stored one untouched.
    pub fn changes(&self) -> Map<String, Value> {
        let mut changes = Map::new();
        if let Some(name) = &self.name {
            changes.insert("name".to_string(), Value::from(name.as_str()));
        }
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            changes.insert("phone".to_string(), Value::from(phone));
        }
        if let Some(url) = &self.profile_image_url {
            changes.insert("profile_image_url".to_string(), url.clone().map_or(Value::Null, Value::from));
        }
        changes
    }
}

/// Practice details of the doctor record; absent fields are not written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_specializations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub user: Option<UserProfileUpdate>,
    pub doctor: Option<DoctorProfileUpdate>,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub aid: String,
    pub pid: String,
    pub did: String,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Appointment {
    pub fn call_started(&self) -> bool {
        self.extra.get("call_started_at").is_some_and(|v| !v.is_null())
    }
}

/// Outcome of starting an appointment's video call.
#[derive(Debug, Clone)]
pub struct CallStart {
    pub appointment: Appointment,
    pub already_started: bool,
}

/// Appointment as shown on the doctor's board, with the patient attached.
#[derive(Debug, Clone, Serialize)]
pub struct BoardAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub complaint_description: Option<String>,
    pub patient: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentBoard {
    pub pending: Vec<BoardAppointment>,
    pub confirmed: Vec<BoardAppointment>,
    pub today: Vec<BoardAppointment>,
    pub completed: Vec<BoardAppointment>,
    pub cancelled: Vec<BoardAppointment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// DASHBOARD
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAppointments {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPatients {
    pub date: String,
    pub patients: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: usize,
    pub today_appointments: usize,
    pub pending_approvals: usize,
    pub monthly_revenue: f64,
    pub appointments_data: Vec<MonthlyAppointments>,
    pub patients_data: Vec<WeeklyPatients>,
}

// ==============================================================================
// PATIENTS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PatientRelationship {
    pub pid: String,
    #[serde(default)]
    pub total_appointments: Option<i64>,
    #[serde(default)]
    pub last_appointment_date: Option<String>,
    #[serde(default)]
    pub first_appointment_date: Option<String>,
}

/// One row of the doctor's patient roster.
#[derive(Debug, Clone, Serialize)]
pub struct RosterPatient {
    #[serde(flatten)]
    pub patient: Map<String, Value>,
    pub user: Value,
    pub total_appointments: i64,
    pub last_appointment_date: Option<String>,
    pub first_appointment_date: Option<String>,
    #[serde(rename = "adherenceRate")]
    pub adherence_rate: f64,
    #[serde(rename = "recentAdherence")]
    pub recent_adherence: Vec<DailyAdherence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    pub patient: Value,
    pub appointments: Vec<Value>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor record not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::DoctorNotFound
            | DoctorError::PatientNotFound
            | DoctorError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
