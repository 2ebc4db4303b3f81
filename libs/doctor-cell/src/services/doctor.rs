use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use adherence_cell::models::AdherenceRecord;
use adherence_cell::services::{aggregator, AdherenceService};
use shared_config::AppConfig;
use shared_database::supabase::{in_filter, SupabaseClient};

use crate::models::{
    Appointment, AppointmentBoard, AppointmentStatus, BoardAppointment, CallStart, DashboardStats,
    Doctor, DoctorError, DoctorProfile, PatientDetail, PatientRelationship, RosterPatient,
    UpdateDoctorProfileRequest,
};
use crate::services::board::categorize;
use crate::services::dashboard::compute_dashboard;

const RECENT_ADHERENCE_DAYS: usize = 7;

const PATIENT_SELECT: &str = "pid,uid,date_of_birth,gender,blood_group,allergies,chronic_conditions,\
current_medications,users(name,email,phone,profile_image_url)";

/// Unique violation on `users.phone`.
fn is_duplicate_phone(message: &str) -> bool {
    message.contains("23505") && message.contains("phone")
}

/// PostgREST embeds a to-one relation as an object, but older views return a
/// one-element array.
fn embedded_user(users: &Value) -> Value {
    match users {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

pub struct DoctorService {
    supabase: SupabaseClient,
    adherence: AdherenceService,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            adherence: AdherenceService::new(config),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, auth_token: &str) -> Result<T, DoctorError> {
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    /// Doctor record of the authenticated user, if they have one.
    pub async fn find_doctor_by_uid(&self, uid: &str, auth_token: &str) -> Result<Option<Doctor>, DoctorError> {
        debug!("Looking up doctor record for user {}", uid);

        let path = format!("/rest/v1/doctors?uid=eq.{}&select=did,uid,consultation_fee", uid);
        let doctors: Vec<Doctor> = self.fetch(&path, auth_token).await?;
        Ok(doctors.into_iter().next())
    }

    pub async fn get_profile(&self, uid: &str, auth_token: &str) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching profile for user {}", uid);

        let path = format!("/rest/v1/users?uid=eq.{}", uid);
        let user = self.fetch::<Vec<Value>>(&path, auth_token).await?.into_iter().next();

        let path = format!("/rest/v1/doctors?uid=eq.{}", uid);
        let doctor = self.fetch::<Vec<Value>>(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .map(|mut doctor| {
                let image = user.as_ref().map_or(Value::Null, |u| u["profile_image_url"].clone());
                if let Some(fields) = doctor.as_object_mut() {
                    fields.insert("profile_image_url".to_string(), image);
                }
                doctor
            });

        Ok(DoctorProfile { user, doctor })
    }

    /// Writes the user's columns, then updates the doctor record or creates
    /// it on first save.
    pub async fn update_profile(
        &self,
        uid: &str,
        request: UpdateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        if let Some(user) = &request.user {
            let changes = user.changes();
            if !changes.is_empty() {
                let path = format!("/rest/v1/users?uid=eq.{}", uid);
                self.supabase
                    .execute(Method::PATCH, &path, Some(auth_token), Some(Value::Object(changes)))
                    .await
                    .map_err(|e| {
                        let message = e.to_string();
                        if is_duplicate_phone(&message) {
                            DoctorError::ValidationError(
                                "This phone number is already registered to another user.".to_string(),
                            )
                        } else {
                            DoctorError::DatabaseError(message)
                        }
                    })?;
            }
        }

        if let Some(doctor) = request.doctor {
            let mut row = serde_json::to_value(&doctor).map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

            if self.find_doctor_by_uid(uid, auth_token).await?.is_some() {
                let path = format!("/rest/v1/doctors?uid=eq.{}", uid);
                self.supabase
                    .execute(Method::PATCH, &path, Some(auth_token), Some(row))
                    .await
                    .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
            } else {
                info!("Creating doctor record for user {}", uid);
                row["uid"] = json!(uid);
                self.supabase
                    .execute(Method::POST, "/rest/v1/doctors", Some(auth_token), Some(row))
                    .await
                    .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
            }
        }

        info!("Profile updated for user {}", uid);
        Ok(())
    }

    async fn get_appointments(&self, did: &str, auth_token: &str) -> Result<Vec<Appointment>, DoctorError> {
        let path = format!(
            "/rest/v1/appointments?did=eq.{}&order=scheduled_date.asc,scheduled_time.asc",
            did
        );
        self.fetch(&path, auth_token).await
    }

    pub async fn get_dashboard(
        &self,
        uid: &str,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<DashboardStats, DoctorError> {
        let Some(doctor) = self.find_doctor_by_uid(uid, auth_token).await? else {
            debug!("No doctor record for user {}, returning empty dashboard", uid);
            return Ok(DashboardStats::default());
        };

        let appointments = self.get_appointments(&doctor.did, auth_token).await?;
        Ok(compute_dashboard(&doctor, &appointments, today))
    }

    /// The doctor's appointments sorted into board columns, each with its
    /// patient attached. A failed patient lookup leaves `patient` empty.
    pub async fn get_appointment_board(
        &self,
        uid: &str,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<AppointmentBoard, DoctorError> {
        let Some(doctor) = self.find_doctor_by_uid(uid, auth_token).await? else {
            return Ok(AppointmentBoard::default());
        };

        let appointments = self.get_appointments(&doctor.did, auth_token).await?;
        if appointments.is_empty() {
            return Ok(AppointmentBoard::default());
        }

        let mut patient_ids: Vec<&str> = appointments.iter().map(|a| a.pid.as_str()).collect();
        patient_ids.sort_unstable();
        patient_ids.dedup();

        let path = format!(
            "/rest/v1/patients?pid={}&select=pid,uid,user:users(name,email,phone,profile_image_url)",
            in_filter(&patient_ids)
        );
        let patients: HashMap<String, Value> = match self.fetch::<Vec<Value>>(&path, auth_token).await {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| row["pid"].as_str().map(|pid| (pid.to_string(), row.clone())))
                .collect(),
            Err(e) => {
                warn!("Patients lookup for appointment board failed: {}", e);
                HashMap::new()
            }
        };

        let entries = appointments
            .into_iter()
            .map(|appointment| BoardAppointment {
                complaint_description: appointment.chief_complaint.clone(),
                patient: patients.get(&appointment.pid).cloned(),
                appointment,
            })
            .collect();

        Ok(categorize(entries, today))
    }

    pub async fn update_appointment_status(
        &self,
        aid: &str,
        status: Option<AppointmentStatus>,
        auth_token: &str,
    ) -> Result<Appointment, DoctorError> {
        let status = match status {
            Some(AppointmentStatus::Unknown) | None => {
                return Err(DoctorError::ValidationError(
                    "Appointment ID and status required".to_string(),
                ))
            }
            Some(status) => status,
        };

        let path = format!("/rest/v1/appointments?aid=eq.{}", aid);
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "status": status })),
            Some(SupabaseClient::representation_headers()),
        ).await
        .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let appointment = rows.into_iter().next().ok_or(DoctorError::AppointmentNotFound)?;
        info!("Appointment {} moved to {:?}", aid, status);

        Ok(appointment)
    }

    /// Removes the appointment row. Unknown ids are not an error.
    pub async fn delete_appointment(&self, aid: &str, auth_token: &str) -> Result<(), DoctorError> {
        let path = format!("/rest/v1/appointments?aid=eq.{}", aid);
        self.supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        info!("Appointment {} deleted", aid);
        Ok(())
    }

    /// Stamps `call_started_at` and moves the appointment to in progress.
    /// A call that already started is returned as stored.
    pub async fn start_call(&self, aid: &str, auth_token: &str) -> Result<CallStart, DoctorError> {
        let path = format!("/rest/v1/appointments?aid=eq.{}", aid);
        let current = self.fetch::<Vec<Appointment>>(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(DoctorError::AppointmentNotFound)?;

        if current.call_started() {
            debug!("Call for appointment {} already started", aid);
            return Ok(CallStart { appointment: current, already_started: true });
        }

        let now = Utc::now().to_rfc3339();
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "call_started_at": now,
                "status": AppointmentStatus::InProgress,
                "updated_at": now
            })),
            Some(SupabaseClient::representation_headers()),
        ).await
        .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let appointment = rows.into_iter().next().ok_or(DoctorError::AppointmentNotFound)?;
        info!("Call started for appointment {}", aid);

        Ok(CallStart { appointment, already_started: false })
    }

    /// Active patients of the doctor with their adherence across all
    /// prescriptions.
    pub async fn get_patient_roster(&self, uid: &str, auth_token: &str) -> Result<Vec<RosterPatient>, DoctorError> {
        let doctor = self.find_doctor_by_uid(uid, auth_token)
            .await?
            .ok_or(DoctorError::DoctorNotFound)?;

        let path = format!(
            "/rest/v1/doctor_patient_relationships?did=eq.{}&relationship_status=eq.active\
&select=pid,total_appointments,last_appointment_date,first_appointment_date",
            doctor.did
        );
        let relationships: Vec<PatientRelationship> = self.fetch(&path, auth_token).await?;
        if relationships.is_empty() {
            return Ok(Vec::new());
        }

        let patient_ids: Vec<String> = relationships.iter().map(|r| r.pid.clone()).collect();

        let path = format!("/rest/v1/patients?pid={}&select={}", in_filter(&patient_ids), PATIENT_SELECT);
        let patients: Vec<Value> = self.fetch(&path, auth_token).await?;

        let records = self.adherence
            .get_patient_records(&patient_ids, auth_token)
            .await
            .unwrap_or_else(|e| {
                warn!("Adherence lookup for roster failed: {}", e);
                Vec::new()
            });

        let mut by_patient: HashMap<String, Vec<AdherenceRecord>> = HashMap::new();
        for record in records {
            if let Some(pid) = record.pid.clone() {
                by_patient.entry(pid).or_default().push(record);
            }
        }

        let relationship_of: HashMap<&str, &PatientRelationship> =
            relationships.iter().map(|r| (r.pid.as_str(), r)).collect();

        let roster = patients
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(patient) => Some(patient),
                _ => None,
            })
            .map(|patient| {
                let pid = patient.get("pid").and_then(Value::as_str).unwrap_or_default().to_string();
                let relationship = relationship_of.get(pid.as_str());
                let summary = aggregator::summarize(by_patient.get(&pid).map(Vec::as_slice).unwrap_or(&[]));
                let skip = summary.daily_breakdown.len().saturating_sub(RECENT_ADHERENCE_DAYS);

                RosterPatient {
                    user: embedded_user(patient.get("users").unwrap_or(&Value::Null)),
                    total_appointments: relationship.and_then(|r| r.total_appointments).unwrap_or(0),
                    last_appointment_date: relationship.and_then(|r| r.last_appointment_date.clone()),
                    first_appointment_date: relationship.and_then(|r| r.first_appointment_date.clone()),
                    adherence_rate: summary.adherence_rate,
                    recent_adherence: summary.daily_breakdown.into_iter().skip(skip).collect(),
                    patient,
                }
            })
            .collect();

        Ok(roster)
    }

    pub async fn get_patient_detail(&self, pid: &str, auth_token: &str) -> Result<PatientDetail, DoctorError> {
        debug!("Fetching patient detail for {}", pid);

        let path = format!("/rest/v1/patients?pid=eq.{}&select={}", pid, PATIENT_SELECT);
        let mut patient = self.fetch::<Vec<Value>>(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(DoctorError::PatientNotFound)?;
        patient["user"] = embedded_user(&patient["users"]);

        let path = format!(
            "/rest/v1/appointments?pid=eq.{}\
&select=aid,scheduled_date,scheduled_time,mode,status,chief_complaint,duration_minutes\
&order=scheduled_date.desc",
            pid
        );
        let appointments: Vec<Value> = self.fetch(&path, auth_token).await.unwrap_or_else(|e| {
            warn!("Appointment history for patient {} unavailable: {}", pid, e);
            Vec::new()
        });

        Ok(PatientDetail { patient, appointments })
    }
}
