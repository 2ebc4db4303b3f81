use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub app_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            gemini_api_key: String::new(),
            gemini_base_url: "http://localhost:54322".to_string(),
            // Nothing listens here; notification dispatch fails and is swallowed.
            app_url: "http://127.0.0.1:9".to_string(),
        }
    }
}

impl TestConfig {
    /// Points Supabase (and, unless overridden, every other upstream) at a mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            gemini_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn with_gemini_key(mut self, key: &str) -> Self {
        self.gemini_api_key = key.to_string();
        self
    }

    pub fn with_app_url(mut self, url: &str) -> Self {
        self.app_url = url.to_string();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
            gemini_base_url: self.gemini_base_url.clone(),
            gemini_model: "gemini-2.5-flash".to_string(),
            app_url: self.app_url.clone(),
            port: 3000,
        }
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "doctor".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// PostgREST row fixtures shared by the cell test suites.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn prescription_response(prescription_id: &str, pid: &str, did: &str) -> Value {
        json!({
            "prescription_id": prescription_id,
            "pid": pid,
            "did": did,
            "aid": null,
            "diagnosis": "Amlapitta (hyperacidity)",
            "symptoms": ["heartburn", "sour belching"],
            "medicines": [{
                "name": "Avipattikar Churna",
                "dosage": "1 teaspoon",
                "frequency": "Twice daily",
                "duration": "14 days",
                "notes": "Before meals"
            }],
            "instructions": "Avoid spicy food",
            "diet_advice": "Cooling diet",
            "follow_up_date": "2026-11-02",
            "is_active": true,
            "sent_to_patient": false,
            "sent_at": null,
            "ai_generated": false,
            "created_at": "2026-10-19T09:00:00Z",
            "updated_at": "2026-10-19T09:00:00Z"
        })
    }

    pub fn adherence_record(
        prescription_id: &str,
        medicine_name: &str,
        scheduled_date: &str,
        is_taken: bool,
        is_skipped: bool,
    ) -> Value {
        let stamp = format!("{}T08:00:00Z", scheduled_date);
        json!({
            "adherence_id": Uuid::new_v4(),
            "prescription_id": prescription_id,
            "pid": "patient-1",
            "medicine_name": medicine_name,
            "scheduled_date": scheduled_date,
            "scheduled_time": "08:00:00",
            "is_taken": is_taken,
            "is_skipped": is_skipped,
            "taken_at": if is_taken { Some(stamp.clone()) } else { None },
            "skipped_at": if is_skipped { Some(stamp) } else { None }
        })
    }

    pub fn doctor_response(did: &str, uid: &str, consultation_fee: f64) -> Value {
        json!({
            "did": did,
            "uid": uid,
            "consultation_fee": consultation_fee,
            "specialization": ["Kayachikitsa"]
        })
    }

    pub fn appointment_response(aid: &str, pid: &str, did: &str, scheduled_date: &str, status: &str) -> Value {
        json!({
            "aid": aid,
            "pid": pid,
            "did": did,
            "scheduled_date": scheduled_date,
            "scheduled_time": "10:00:00",
            "status": status,
            "mode": "video",
            "chief_complaint": "Joint pain",
            "duration_minutes": 30
        })
    }

    pub fn patient_response(pid: &str, name: &str) -> Value {
        json!({
            "pid": pid,
            "uid": Uuid::new_v4(),
            "date_of_birth": "1985-04-12",
            "gender": "female",
            "blood_group": "B+",
            "allergies": ["peanuts"],
            "chronic_conditions": [],
            "current_medications": [],
            "city": "Pune",
            "state": "Maharashtra",
            "users": {
                "name": name,
                "email": "patient@example.com",
                "phone": null,
                "profile_image_url": null
            }
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(!app_config.is_ai_configured());
    }

    #[test]
    fn test_mock_server_config() {
        let config = TestConfig::with_mock_server("http://127.0.0.1:4010")
            .with_gemini_key("key")
            .to_app_config();

        assert_eq!(config.supabase_url, "http://127.0.0.1:4010");
        assert_eq!(config.gemini_base_url, "http://127.0.0.1:4010");
        assert!(config.is_ai_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_adherence_fixture_sets_matching_timestamp() {
        let taken = MockSupabaseResponses::adherence_record("rx", "Triphala", "2026-10-01", true, false);
        assert_eq!(taken["taken_at"], "2026-10-01T08:00:00Z");
        assert!(taken["skipped_at"].is_null());
    }
}
