use std::sync::Arc;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use tower::ServiceExt;
use serde_json::{json, Value};
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use prescription_cell::models::Prescription;
use prescription_cell::router::ai_prescription_routes;
use prescription_cell::services::NotificationService;
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn create_test_app(config: AppConfig) -> Router {
    ai_prescription_routes(Arc::new(config))
}

async fn post_json(app: Router, uri: &str, config: &AppConfig, body: Value) -> (StatusCode, Value) {
    let token = JwtTestUtils::create_test_token(&TestUser::doctor("vaidya@example.com"), &config.supabase_jwt_secret, None);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" }
        }]
    })
}

async fn mount_patient_context(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("pid", "eq.patient-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("patient-1", "Meera Joshi")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("pid", "eq.patient-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/medication_adherence"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::adherence_record("rx-1", "Triphala Churna", "2026-10-01", true, false),
            MockSupabaseResponses::adherence_record("rx-1", "Brahmi Vati", "2026-10-01", false, true),
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_suggest_without_api_key_uses_fallback() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let body = json!({ "diagnosis": "Anidra", "symptoms": ["poor sleep", "anxiety"] });
    let (status, body) = post_json(create_test_app(config.clone()), "/suggest", &config, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["prescription"]["medicines"][0]["name"], "Ashwagandha Churna");
    assert_eq!(body["prescription"]["followUpDays"], 15);
}

#[tokio::test]
async fn test_suggest_requires_diagnosis_and_symptoms() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    let (status, body) = post_json(
        create_test_app(config.clone()),
        "/suggest",
        &config,
        json!({ "diagnosis": "Anidra", "symptoms": "" }),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Diagnosis and symptoms are required");
}

#[tokio::test]
async fn test_suggest_falls_back_when_model_fails() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri())
        .with_gemini_key("test-gemini-key")
        .to_app_config();

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = json!({ "diagnosis": "Amavata", "symptoms": "joint pain and stiffness" });
    let (status, body) = post_json(create_test_app(config.clone()), "/suggest", &config, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prescription"]["medicines"][0]["name"], "Yogaraja Guggulu");
}

#[tokio::test]
async fn test_suggest_returns_model_output() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri())
        .with_gemini_key("test-gemini-key")
        .to_app_config();

    let reply = r#"```json
{"medicines":[{"name":"Sitopaladi Churna","dosage":"1 tsp","frequency":"Thrice daily","timing":"After meals with honey","duration":"10 days"}],
 "dietAdvice":"Warm soups","lifestyleAdvice":"Steam inhalation","followUpDays":10}
```"#;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(query_param("key", "test-gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(reply)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = json!({ "diagnosis": "Kasa", "symptoms": ["cough"], "patientAge": 34, "patientGender": "male" });
    let (status, body) = post_json(create_test_app(config.clone()), "/suggest", &config, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prescription"]["medicines"][0]["name"], "Sitopaladi Churna");
    assert_eq!(body["prescription"]["medicines"][0]["timing"], "After meals with honey");
    assert_eq!(body["prescription"]["followUpDays"], 10);
}

#[tokio::test]
async fn test_generate_builds_reviewable_draft() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri())
        .with_gemini_key("test-gemini-key")
        .to_app_config();

    mount_patient_context(&mock_server).await;

    let reply = r#"Here is the prescription:
{
  "diagnosis": "Amlapitta with Pitta aggravation",
  "symptoms": ["heartburn", "acid reflux"],
  "medicines": [
    {"name": "Avipattikar Churna", "dosage": "1 teaspoon", "frequency": "Twice daily", "duration": "take it for 3 weeks", "notes": "Before meals"},
    {"name": "Kamdudha Ras", "dosage": "1 tablet", "frequency": "Twice daily", "duration": "ongoing"}
  ],
  "instructions": "Avoid late dinners",
  "dietAdvice": "Cooling foods, coconut water",
  "followUpDays": 10,
  "safetyNotes": "No peanut-based preparations"
}"#;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(reply)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = post_json(
        create_test_app(config.clone()),
        "/generate",
        &config,
        json!({ "pid": "patient-1" }),
    ).await;

    assert_eq!(status, StatusCode::OK);
    let draft = &body["prescription"];
    assert_eq!(draft["diagnosis"], "Amlapitta with Pitta aggravation");
    assert_eq!(draft["medicines"][0]["duration"], "3 weeks");
    assert_eq!(draft["medicines"][1]["duration"], "7 days");
    assert_eq!(draft["dietAdvice"], "Cooling foods, coconut water");
    assert_eq!(draft["safetyNotes"], "No peanut-based preparations");

    let expected_follow_up = (Utc::now().date_naive() + Duration::days(10)).to_string();
    assert_eq!(draft["followUpDate"], expected_follow_up);

    let requests = mock_server.received_requests().await.unwrap();
    let gemini = requests.iter().find(|r| r.url.path() == GEMINI_PATH).unwrap();
    let sent: Value = serde_json::from_slice(&gemini.body).unwrap();
    let prompt = sent["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Allergies: peanuts"));
    assert!(prompt.contains("Recent adherence issues: Brahmi Vati"));
}

#[tokio::test]
async fn test_generate_for_unknown_patient_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri())
        .with_gemini_key("test-gemini-key")
        .to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = post_json(
        create_test_app(config.clone()),
        "/generate",
        &config,
        json!({ "pid": "ghost" }),
    ).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Patient not found");
}

#[tokio::test]
async fn test_generate_unparseable_model_reply_is_bad_gateway() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri())
        .with_gemini_key("test-gemini-key")
        .to_app_config();

    mount_patient_context(&mock_server).await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("I cannot help with that.")))
        .mount(&mock_server)
        .await;

    let (status, body) = post_json(
        create_test_app(config.clone()),
        "/generate",
        &config,
        json!({ "pid": "patient-1" }),
    ).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_generate_without_api_key_is_bad_gateway() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    let (status, _) = post_json(
        create_test_app(config.clone()),
        "/generate",
        &config,
        json!({ "pid": "patient-1" }),
    ).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_creation_notification_payload_is_delivered() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default().with_app_url(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/api/notifications/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prescription: Prescription = serde_json::from_value(
        MockSupabaseResponses::prescription_response("3c6f0a52-1d7e-4b8a-9f2e-5a4b3c2d1e0f", "patient-1", "doctor-1"),
    ).unwrap();

    NotificationService::new(&config)
        .notify_prescription_created(&prescription)
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload["type"], "prescription_created");
    assert_eq!(payload["data"]["patientId"], "patient-1");
    assert_eq!(payload["data"]["doctorId"], "doctor-1");
    assert_eq!(payload["data"]["diagnosis"], "Amlapitta (hyperacidity)");
    assert_eq!(payload["data"]["medicines"][0]["name"], "Avipattikar Churna");
}
