use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use shared_models::error::AppError;

// ==============================================================================
// ADHERENCE RECORDS
// ==============================================================================

/// One scheduled dose of one medicine, as stored in `medication_adherence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdherenceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adherence_id: Option<String>,
    #[serde(default)]
    pub prescription_id: Option<String>,
    #[serde(default)]
    pub pid: Option<String>,
    pub medicine_name: String,
    pub scheduled_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_taken: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_skipped: bool,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skipped_at: Option<DateTime<Utc>>,
    /// Columns this service does not interpret, echoed back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseStatus {
    Taken,
    Skipped,
    Pending,
}

impl AdherenceRecord {
    /// A row flagged both taken and skipped counts as taken.
    pub fn status(&self) -> DoseStatus {
        if self.is_taken {
            DoseStatus::Taken
        } else if self.is_skipped {
            DoseStatus::Skipped
        } else {
            DoseStatus::Pending
        }
    }

    /// When the patient acted on this dose. Rows without either timestamp
    /// fall back to the Unix epoch and therefore sort as the oldest activity.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.taken_at
            .or(self.skipped_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

// ==============================================================================
// DERIVED SUMMARY
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAdherence {
    pub date: NaiveDate,
    pub taken: usize,
    pub skipped: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicineAdherence {
    pub medicine_name: String,
    pub total: usize,
    pub taken: usize,
    pub skipped: usize,
    pub pending: usize,
    pub adherence_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdherenceSummary {
    pub total_doses: usize,
    pub taken: usize,
    pub skipped: usize,
    pub pending: usize,
    pub adherence_rate: f64,
    pub daily_breakdown: Vec<DailyAdherence>,
    pub medicine_breakdown: Vec<MedicineAdherence>,
    pub recent_activity: Vec<AdherenceRecord>,
    /// Patient display info (name, avatar), attached by the endpoint.
    pub patient: Option<Value>,
}

// ==============================================================================
// TRACKING STATUS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub is_enabled: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnableTrackingOutcome {
    Enabled {
        message: String,
    },
    ManualStepRequired {
        error: String,
        sql: String,
        instructions: Vec<String>,
    },
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AdherenceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AdherenceError> for AppError {
    fn from(err: AdherenceError) -> Self {
        match err {
            AdherenceError::ValidationError(msg) => AppError::ValidationError(msg),
            AdherenceError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
