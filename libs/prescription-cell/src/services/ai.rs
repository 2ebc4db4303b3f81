use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use adherence_cell::models::AdherenceRecord;
use adherence_cell::services::{aggregator, AdherenceService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AiPrescriptionDraft, Medicine, ModelPrescription, PrescriptionError, PrescriptionSuggestion,
    SuggestPrescriptionRequest,
};
use crate::services::duration::{normalize_duration, DEFAULT_DURATION};

const HISTORY_WINDOW_DAYS: i64 = 90;
const HISTORY_LIMIT: usize = 5;
const ADHERENCE_SAMPLE: usize = 20;
const DEFAULT_FOLLOW_UP_DAYS: i64 = 7;
const MAX_FOLLOW_UP_DAYS: i64 = 365;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static json pattern"));

/// Outermost `{...}` span of a model reply that may be wrapped in prose or
/// code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

/// Everything known about the patient when drafting a prescription.
#[derive(Debug, Clone, Default)]
pub struct PatientContext {
    pub patient: Value,
    pub appointment: Option<Value>,
    pub previous_prescriptions: Vec<Value>,
    pub adherence: Vec<AdherenceRecord>,
}

fn text_or<'a>(value: &'a Value, default: &'a str) -> &'a str {
    value.as_str().filter(|s| !s.trim().is_empty()).unwrap_or(default)
}

fn joined_or(value: &Value, default: &str) -> String {
    let items: Vec<&str> = value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if items.is_empty() {
        default.to_string()
    } else {
        items.join(", ")
    }
}

fn history_lines(previous: &[Value]) -> String {
    if previous.is_empty() {
        return "No previous prescriptions".to_string();
    }

    previous
        .iter()
        .map(|p| {
            let date = p["created_at"]
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "Unknown date".to_string());
            let medicines: String = p["medicines"].to_string().chars().take(150).collect();
            format!(
                "  - Date: {}\n  - Diagnosis: {}\n  - Medicines: {}",
                date,
                text_or(&p["diagnosis"], "Not recorded"),
                medicines
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking the model for a strict-JSON Ayurvedic prescription.
pub fn build_generation_prompt(context: &PatientContext, today: NaiveDate) -> String {
    let patient = &context.patient;
    let appointment = context.appointment.clone().unwrap_or(Value::Null);

    let city = text_or(&patient["city"], "Not specified");
    let state = text_or(&patient["state"], "Not specified");
    let country = text_or(&patient["country"], "India");
    let month = today.format("%B").to_string();

    let allergies = joined_or(&patient["allergies"], "None");
    let medications = joined_or(&patient["current_medications"], "None");
    let conditions = joined_or(&patient["chronic_conditions"], "None");

    let adherence_line = aggregator::describe(&aggregator::summarize(&context.adherence));
    let skipped: Vec<&str> = context
        .adherence
        .iter()
        .filter(|r| r.is_skipped)
        .map(|r| r.medicine_name.as_str())
        .take(3)
        .collect();
    let adherence_issues = if context.adherence.is_empty() {
        String::new()
    } else if skipped.is_empty() {
        "\nRecent adherence issues: None".to_string()
    } else {
        format!("\nRecent adherence issues: {}", skipped.join(", "))
    };

    format!(
        r#"You are an expert Ayurvedic physician assistant. Generate a comprehensive, personalized prescription based on the following patient data:

**PATIENT PROFILE:**
- Name: {name}
- Age: {age}
- Gender: {gender}
- Blood Group: {blood_group}
- Location: {city}, {state}, {country}

**MEDICAL HISTORY:**
- Allergies: {allergies}
- Current Medications: {medications}
- Chronic Conditions: {conditions}

**CURRENT CONSULTATION:**
- Chief Complaint: {complaint}
- Additional Symptoms: {symptoms}
- Doctor's Notes: {notes}

**PRESCRIPTION HISTORY (Last 3 months):**
{history}

**MEDICATION ADHERENCE RECORD:**
{adherence_line}{adherence_issues}

**CRITICAL SAFETY GUIDELINES:**
1. ALLERGY CHECK: Cross-check ALL medicines against patient allergies: {allergies}
2. DRUG INTERACTIONS: Check interactions with current medications: {medications}
3. CHRONIC CONDITIONS: Consider ongoing treatment for: {conditions}
4. LOCATION-AWARE: Medicines must be available in {city}, {state}
5. ADHERENCE: If previous adherence was poor, suggest easier regimens or alternatives
6. SEASON: Consider {month} season in {state}
7. MEDICINE TYPE: Prefer Ayurvedic medicines. For emergencies requiring quick relief you MAY include allopathic medicines; mark them clearly in the notes field.

**OUTPUT FORMAT (STRICT JSON):**
{{
  "diagnosis": "Clear, comprehensive diagnosis based on symptoms and history",
  "symptoms": ["symptom1", "symptom2"],
  "medicines": [
    {{
      "name": "Medicine name",
      "dosage": "Specific dosage (e.g., 500mg, 1 teaspoon)",
      "frequency": "How often (e.g., Twice daily, Before meals)",
      "duration": "Simple text like: 7 days, 2 weeks, 1 month",
      "notes": "Special instructions. Mark allopathic medicines"
    }}
  ],
  "instructions": "Detailed instructions considering chronic conditions and current medications",
  "dietAdvice": "Location and season-appropriate diet for {city} in {month}",
  "followUpDays": 7,
  "safetyNotes": "Important safety information considering allergies and drug interactions"
}}

RESPOND ONLY WITH VALID JSON. No additional text."#,
        name = text_or(&patient["user"]["name"], "Patient"),
        age = patient["age"].as_u64().map(|a| a.to_string()).unwrap_or_else(|| "Not specified".to_string()),
        gender = text_or(&patient["gender"], "Not specified"),
        blood_group = text_or(&patient["blood_group"], "Not specified"),
        city = city,
        state = state,
        country = country,
        allergies = allergies,
        medications = medications,
        conditions = conditions,
        complaint = text_or(&appointment["chief_complaint"], "General consultation"),
        symptoms = joined_or(&appointment["symptoms"], "None specified"),
        notes = text_or(&appointment["doctor_notes"], "None"),
        history = history_lines(&context.previous_prescriptions),
        adherence_line = adherence_line,
        adherence_issues = adherence_issues,
        month = month,
    )
}

pub fn build_suggestion_prompt(request: &SuggestPrescriptionRequest) -> String {
    let symptoms = request.symptoms.as_ref().map(|s| s.joined()).unwrap_or_default();
    let age = request
        .patient_age
        .map(|a| format!("{} years old", a))
        .unwrap_or_else(|| "adult".to_string());
    let gender = request.patient_gender.as_deref().unwrap_or("patient");

    format!(
        r#"You are an expert Ayurvedic doctor. Create a detailed prescription for the following case:

Diagnosis: {}
Symptoms: {}
Patient: {}, {}

Provide a comprehensive Ayurvedic prescription in JSON format with:
{{
  "medicines": [
    {{
      "name": "Medicine name (Ayurvedic)",
      "dosage": "quantity and form",
      "frequency": "how many times per day",
      "timing": "before/after meals, morning/evening",
      "duration": "number of days"
    }}
  ],
  "dietAdvice": "Specific dietary recommendations",
  "lifestyleAdvice": "Lifestyle modifications",
  "followUpDays": 15
}}

Recommend 3-5 authentic Ayurvedic medicines suitable for this condition. Be specific with dosages and timings. Focus on classical Ayurvedic formulations.

Respond ONLY with valid JSON, no additional text."#,
        request.diagnosis, symptoms, age, gender
    )
}

fn remedy(name: &str, dosage: &str, frequency: &str, timing: &str, duration: &str) -> Medicine {
    Medicine {
        name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: frequency.to_string(),
        duration: duration.to_string(),
        notes: None,
        timing: Some(timing.to_string()),
    }
}

/// Classical remedies keyed on symptom keywords, used when the model is
/// unavailable.
pub fn fallback_suggestion(symptoms: &str) -> PrescriptionSuggestion {
    let text = symptoms.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

    let medicines = if mentions(&["digest", "stomach", "gas"]) {
        vec![
            remedy("Triphala Churna", "1 teaspoon", "Twice daily", "After meals with warm water", "15 days"),
            remedy("Hingwashtak Churna", "1/2 teaspoon", "Three times daily", "Before meals", "10 days"),
        ]
    } else if mentions(&["stress", "anxiety", "sleep"]) {
        vec![
            remedy("Ashwagandha Churna", "1 teaspoon", "Twice daily", "Morning and before bed with warm milk", "30 days"),
            remedy("Brahmi Vati", "1 tablet", "Twice daily", "After breakfast and dinner", "20 days"),
        ]
    } else if mentions(&["pain", "joint", "arthritis"]) {
        vec![
            remedy("Yogaraja Guggulu", "2 tablets", "Twice daily", "After meals with warm water", "30 days"),
            remedy("Mahayograj Guggulu", "1 tablet", "Twice daily", "After meals", "21 days"),
        ]
    } else {
        vec![
            remedy("Chyawanprash", "1 tablespoon", "Once daily", "Morning with warm milk", "30 days"),
            remedy("Triphala Churna", "1 teaspoon", "Once daily", "Before bed with warm water", "15 days"),
        ]
    };

    PrescriptionSuggestion {
        medicines,
        diet_advice: "Follow a balanced diet with fresh fruits and vegetables. Avoid processed foods, \
excessive spicy and oily foods. Drink plenty of warm water throughout the day."
            .to_string(),
        lifestyle_advice: "Maintain regular sleep schedule (10 PM - 6 AM). Practice yoga or light \
exercise for 30 minutes daily. Reduce stress through meditation or pranayama."
            .to_string(),
        follow_up_days: 15,
    }
}

/// Turns the model's JSON into a reviewable draft: durations normalized,
/// follow-up date resolved against `today`.
pub fn into_draft(model: ModelPrescription, today: NaiveDate) -> AiPrescriptionDraft {
    let medicines = model
        .medicines
        .into_iter()
        .map(|m| {
            let raw = if m.duration.trim().is_empty() { DEFAULT_DURATION.to_string() } else { m.duration.clone() };
            Medicine { duration: normalize_duration(&raw), ..m }
        })
        .collect();

    let follow_up_days = model
        .follow_up_days
        .filter(|d| (1..=MAX_FOLLOW_UP_DAYS).contains(d))
        .unwrap_or(DEFAULT_FOLLOW_UP_DAYS);
    let follow_up_date = today
        .checked_add_signed(Duration::days(follow_up_days))
        .or_else(|| today.checked_add_signed(Duration::days(DEFAULT_FOLLOW_UP_DAYS)))
        .unwrap_or(today);

    AiPrescriptionDraft {
        diagnosis: model.diagnosis,
        symptoms: model.symptoms,
        medicines,
        instructions: model.instructions,
        diet_advice: model.diet_advice,
        follow_up_date,
        safety_notes: model.safety_notes.unwrap_or_default(),
    }
}

struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, PrescriptionError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        debug!("Calling Gemini model {}", self.model);

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|e| PrescriptionError::AiServiceError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, error_text);
            return Err(PrescriptionError::AiServiceError(format!("Gemini API error ({})", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PrescriptionError::AiServiceError(e.to_string()))?;

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PrescriptionError::AiServiceError("Invalid Gemini response format".to_string()))
    }

    async fn generate_json<T: serde::de::DeserializeOwned>(&self, prompt: &str) -> Result<T, PrescriptionError> {
        let text = self.generate_text(prompt).await?;
        let object = extract_json_object(&text)
            .ok_or_else(|| PrescriptionError::AiServiceError("No valid JSON in AI response".to_string()))?;

        serde_json::from_str(object)
            .map_err(|e| PrescriptionError::AiServiceError(format!("Unparseable AI response: {}", e)))
    }
}

pub struct PrescriptionAiService {
    supabase: SupabaseClient,
    adherence: AdherenceService,
    gemini: GeminiClient,
    ai_configured: bool,
}

impl PrescriptionAiService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            adherence: AdherenceService::new(config),
            gemini: GeminiClient::new(config),
            ai_configured: config.is_ai_configured(),
        }
    }

    async fn fetch_rows(&self, path: &str, auth_token: &str) -> Result<Vec<Value>, PrescriptionError> {
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))
    }

    /// Gathers the patient record plus the optional context around it. Only
    /// the patient lookup is mandatory; missing context is drafted without.
    pub async fn load_patient_context(
        &self,
        pid: &str,
        aid: Option<&str>,
        auth_token: &str,
    ) -> Result<PatientContext, PrescriptionError> {
        let patient_path = format!("/rest/v1/patients?pid=eq.{}&select=*,user:users(name,email)", pid);
        let patient = self.fetch_rows(&patient_path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(PrescriptionError::PatientNotFound)?;

        let appointment = match aid {
            Some(aid) => {
                let path = format!("/rest/v1/appointments?aid=eq.{}", aid);
                self.fetch_rows(&path, auth_token)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Could not load appointment {}: {}", aid, e);
                        Vec::new()
                    })
                    .into_iter()
                    .next()
            }
            None => None,
        };

        let since = (Utc::now() - Duration::days(HISTORY_WINDOW_DAYS))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let history_path = format!(
            "/rest/v1/prescriptions?pid=eq.{}&created_at=gte.{}&order=created_at.desc&limit={}",
            pid, since, HISTORY_LIMIT
        );
        let previous_prescriptions = self.fetch_rows(&history_path, auth_token)
            .await
            .unwrap_or_else(|e| {
                warn!("Could not load prescription history for {}: {}", pid, e);
                Vec::new()
            });

        let adherence = self.adherence
            .get_recent_patient_records(pid, ADHERENCE_SAMPLE, auth_token)
            .await
            .unwrap_or_else(|e| {
                warn!("Could not load adherence for {}: {}", pid, e);
                Vec::new()
            });

        Ok(PatientContext {
            patient,
            appointment,
            previous_prescriptions,
            adherence,
        })
    }

    /// Drafts a prescription for review from everything known about the patient.
    pub async fn generate_for_patient(
        &self,
        pid: &str,
        aid: Option<&str>,
        auth_token: &str,
    ) -> Result<AiPrescriptionDraft, PrescriptionError> {
        if pid.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Patient ID required".to_string()));
        }
        if !self.ai_configured {
            return Err(PrescriptionError::AiServiceError("Gemini API key not configured".to_string()));
        }

        let context = self.load_patient_context(pid, aid, auth_token).await?;
        let today = Utc::now().date_naive();
        let prompt = build_generation_prompt(&context, today);

        let model: ModelPrescription = self.gemini.generate_json(&prompt).await?;
        debug!("Model proposed {} medicines for patient {}", model.medicines.len(), pid);

        Ok(into_draft(model, today))
    }

    /// Quick regimen for a diagnosis. Never fails once the input is valid:
    /// any model problem falls back to the keyword table.
    pub async fn suggest(
        &self,
        request: &SuggestPrescriptionRequest,
    ) -> Result<PrescriptionSuggestion, PrescriptionError> {
        let symptoms = request.symptoms.as_ref().filter(|s| !s.is_empty());
        let symptoms = match (request.diagnosis.trim().is_empty(), symptoms) {
            (false, Some(symptoms)) => symptoms.joined(),
            _ => {
                return Err(PrescriptionError::ValidationError(
                    "Diagnosis and symptoms are required".to_string(),
                ))
            }
        };

        if !self.ai_configured {
            warn!("Google API key not found, using fallback prescription");
            return Ok(fallback_suggestion(&symptoms));
        }

        match self.gemini.generate_json::<PrescriptionSuggestion>(&build_suggestion_prompt(request)).await {
            Ok(suggestion) if !suggestion.medicines.is_empty() => Ok(suggestion),
            Ok(_) => {
                warn!("Gemini suggestion had no medicines, using fallback");
                Ok(fallback_suggestion(&symptoms))
            }
            Err(e) => {
                warn!("Gemini suggestion failed, using fallback: {}", e);
                Ok(fallback_suggestion(&symptoms))
            }
        }
    }
}
