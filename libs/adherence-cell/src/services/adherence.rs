use anyhow::Result;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, in_filter};

use crate::models::{
    AdherenceError, AdherenceRecord, AdherenceSummary, EnableTrackingOutcome, TrackingStatus,
};
use crate::services::aggregator::summarize;

const ENABLE_TRACKING_SQL: &str =
    "ALTER TABLE prescriptions ENABLE TRIGGER trigger_auto_create_adherence;";

pub struct AdherenceService {
    supabase: SupabaseClient,
}

impl AdherenceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Dose rows of one prescription, oldest scheduled date first.
    pub async fn get_prescription_records(
        &self,
        prescription_id: &str,
        auth_token: &str,
    ) -> Result<Vec<AdherenceRecord>, AdherenceError> {
        debug!("Fetching adherence records for prescription: {}", prescription_id);

        let path = format!(
            "/rest/v1/medication_adherence?prescription_id=eq.{}&order=scheduled_date.asc",
            prescription_id
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AdherenceError::DatabaseError(e.to_string()))
    }

    /// Dose rows of several patients, used by the doctor's patient roster.
    pub async fn get_patient_records(
        &self,
        patient_ids: &[String],
        auth_token: &str,
    ) -> Result<Vec<AdherenceRecord>, AdherenceError> {
        if patient_ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Fetching adherence records for {} patients", patient_ids.len());

        let path = format!(
            "/rest/v1/medication_adherence?pid={}&order=scheduled_date.asc",
            in_filter(patient_ids)
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AdherenceError::DatabaseError(e.to_string()))
    }

    /// Most recent dose rows of one patient, newest scheduled date first.
    pub async fn get_recent_patient_records(
        &self,
        patient_id: &str,
        limit: usize,
        auth_token: &str,
    ) -> Result<Vec<AdherenceRecord>, AdherenceError> {
        let path = format!(
            "/rest/v1/medication_adherence?pid=eq.{}&order=scheduled_date.desc&limit={}",
            patient_id, limit
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AdherenceError::DatabaseError(e.to_string()))
    }

    /// Patient display info for a prescription. Lookup failures are only
    /// logged since the summary is still useful without them.
    async fn get_patient_display(&self, prescription_id: &str, auth_token: &str) -> Option<Value> {
        let path = format!(
            "/rest/v1/prescriptions?prescription_id=eq.{}&select=prescription_id,patients(pid,users(name,profile_image_url))",
            prescription_id
        );

        match self.supabase.request::<Vec<Value>>(Method::GET, &path, Some(auth_token), None).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .map(|row| row["patients"]["users"].clone())
                .filter(|users| !users.is_null()),
            Err(e) => {
                warn!("Error fetching prescription details for {}: {}", prescription_id, e);
                None
            }
        }
    }

    /// Summary for the prescription progress view. Unknown prescriptions and
    /// prescriptions without dose rows yield the zero summary.
    pub async fn get_summary(
        &self,
        prescription_id: &str,
        auth_token: &str,
    ) -> Result<AdherenceSummary, AdherenceError> {
        if prescription_id.trim().is_empty() {
            return Err(AdherenceError::ValidationError("Prescription ID required".to_string()));
        }

        let patient = self.get_patient_display(prescription_id, auth_token).await;
        let records = self.get_prescription_records(prescription_id, auth_token).await?;

        let mut summary = summarize(&records);
        summary.patient = patient;

        debug!(
            "Adherence for {}: {}/{} taken ({}%)",
            prescription_id, summary.taken, summary.total_doses, summary.adherence_rate
        );

        Ok(summary)
    }

    pub async fn get_tracking_status(&self, auth_token: &str) -> TrackingStatus {
        let check: Result<Vec<Value>> = self.supabase
            .request(
                Method::GET,
                "/rest/v1/medication_adherence?select=adherence_id&limit=1",
                Some(auth_token),
                None,
            )
            .await;

        match check {
            Ok(_) => TrackingStatus {
                is_enabled: true,
                message: "Adherence tracking is active".to_string(),
            },
            Err(e) => {
                debug!("Adherence table check failed: {}", e);
                TrackingStatus {
                    is_enabled: false,
                    message: "Adherence tracking not enabled".to_string(),
                }
            }
        }
    }

    /// Asks the database to enable the trigger that creates dose rows when a
    /// prescription is activated. PostgREST cannot run DDL, so when the RPC is
    /// missing the operator gets the statement to run by hand.
    pub async fn enable_tracking(&self, auth_token: &str) -> EnableTrackingOutcome {
        let result = self.supabase
            .execute(
                Method::POST,
                "/rest/v1/rpc/enable_adherence_tracking",
                Some(auth_token),
                Some(json!({})),
            )
            .await;

        match result {
            Ok(()) => {
                info!("Adherence tracking enabled");
                EnableTrackingOutcome::Enabled {
                    message: "Adherence tracking enabled successfully".to_string(),
                }
            }
            Err(e) => {
                warn!("enable_adherence_tracking RPC failed: {}", e);
                EnableTrackingOutcome::ManualStepRequired {
                    error: "Please run the SQL command in Supabase SQL Editor".to_string(),
                    sql: ENABLE_TRACKING_SQL.to_string(),
                    instructions: vec![
                        "1. Go to Supabase Dashboard → SQL Editor".to_string(),
                        format!("2. Run: {}", ENABLE_TRACKING_SQL),
                        "3. Verify: SELECT tgenabled FROM pg_trigger WHERE tgname = 'trigger_auto_create_adherence';".to_string(),
                        "4. Should show 'O' (enabled)".to_string(),
                    ],
                }
            }
        }
    }
}
