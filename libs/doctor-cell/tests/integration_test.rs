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

use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

fn create_test_app(config: AppConfig) -> Router {
    doctor_routes(Arc::new(config))
}

async fn call(app: Router, http_method: &str, uri: &str, user: &TestUser, config: &AppConfig, body: Option<Value>) -> (StatusCode, Value) {
    let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, None);
    let builder = Request::builder()
        .method(http_method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token));

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn mount_doctor(mock_server: &MockServer, user: &TestUser, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("uid", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_doctor_routes_require_authentication() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(TestConfig::with_mock_server(&mock_server.uri()).to_app_config());

    let request = Request::builder()
        .method("GET")
        .uri("/dashboard")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_without_doctor_record_is_empty() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    mount_doctor(&mock_server, &user, json!([])).await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/dashboard", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["totalPatients"], 0);
    assert_eq!(body["monthlyRevenue"], 0.0);
    assert_eq!(body["appointmentsData"], json!([]));
    assert_eq!(body["patientsData"], json!([]));
}

#[tokio::test]
async fn test_dashboard_counts_doctor_appointments() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");
    let today = Utc::now().date_naive();
    let tomorrow = (today + Duration::days(1)).to_string();
    let today = today.to_string();

    mount_doctor(&mock_server, &user, json!([MockSupabaseResponses::doctor_response("doctor-1", &user.id, 600.0)])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("did", "eq.doctor-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("a1", "p1", "doctor-1", &today, "completed"),
            MockSupabaseResponses::appointment_response("a2", "p2", "doctor-1", &today, "scheduled"),
            MockSupabaseResponses::appointment_response("a3", "p2", "doctor-1", &tomorrow, "scheduled"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/dashboard", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPatients"], 2);
    assert_eq!(body["todayAppointments"], 2);
    assert_eq!(body["pendingApprovals"], 2);
    assert_eq!(body["monthlyRevenue"], 600.0);
    assert_eq!(body["appointmentsData"].as_array().unwrap().len(), 6);
    assert_eq!(body["patientsData"][3]["date"], "Week 4");
    assert_eq!(body["patientsData"][3]["patients"], 2);
}

#[tokio::test]
async fn test_profile_combines_user_and_doctor_rows() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("uid", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "uid": user.id,
            "name": "Dr. Anjali Rao",
            "email": "vaidya@example.com",
            "profile_image_url": "https://cdn.example.com/anjali.png"
        }])))
        .mount(&mock_server)
        .await;
    mount_doctor(&mock_server, &user, json!([MockSupabaseResponses::doctor_response("doctor-1", &user.id, 500.0)])).await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/profile", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["name"], "Dr. Anjali Rao");
    assert_eq!(body["doctor"]["did"], "doctor-1");
    assert_eq!(body["doctor"]["specialization"], json!(["Kayachikitsa"]));
    assert_eq!(body["doctor"]["profile_image_url"], "https://cdn.example.com/anjali.png");
}

#[tokio::test]
async fn test_profile_without_doctor_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    mount_doctor(&mock_server, &user, json!([])).await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/profile", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["user"].is_null());
    assert!(body["doctor"].is_null());
}

#[tokio::test]
async fn test_profile_update_writes_user_and_existing_doctor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    mount_doctor(&mock_server, &user, json!([MockSupabaseResponses::doctor_response("doctor-1", &user.id, 500.0)])).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("uid", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("uid", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let update = json!({
        "user": { "name": "Dr. Anjali Rao", "phone": "  ", "profile_image_url": null },
        "doctor": { "consultation_fee": 650.0, "city": "Pune", "languages": ["Marathi", "Hindi"] }
    });
    let (status, body) = call(create_test_app(config.clone()), "PATCH", "/profile", &user, &config, Some(update)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile updated successfully");

    let requests = mock_server.received_requests().await.unwrap();
    let user_patch = requests.iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/users")
        .unwrap();
    let changes: Value = serde_json::from_slice(&user_patch.body).unwrap();
    assert_eq!(changes, json!({ "name": "Dr. Anjali Rao", "profile_image_url": null }));

    let doctor_patch = requests.iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/doctors")
        .unwrap();
    let changes: Value = serde_json::from_slice(&doctor_patch.body).unwrap();
    assert_eq!(changes, json!({ "consultation_fee": 650.0, "city": "Pune", "languages": ["Marathi", "Hindi"] }));
}

#[tokio::test]
async fn test_profile_update_creates_missing_doctor_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    mount_doctor(&mock_server, &user, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let update = json!({ "doctor": { "qualification": "BAMS", "registration_number": "MH-12345" } });
    let (status, _) = call(create_test_app(config.clone()), "PATCH", "/profile", &user, &config, Some(update)).await;

    assert_eq!(status, StatusCode::OK);

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/rest/v1/users"));
    let insert = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let row: Value = serde_json::from_slice(&insert.body).unwrap();
    assert_eq!(row, json!({ "uid": user.id, "qualification": "BAMS", "registration_number": "MH-12345" }));
}

#[tokio::test]
async fn test_profile_update_reports_taken_phone() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "duplicate key value violates unique constraint \"users_phone_key\"",
            "23505",
        )))
        .mount(&mock_server)
        .await;

    let update = json!({ "user": { "name": "Dr. Anjali Rao", "phone": "+91 98200 00000" } });
    let (status, body) = call(create_test_app(config.clone()), "PATCH", "/profile", &user, &config, Some(update)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "This phone number is already registered to another user.");
}

#[tokio::test]
async fn test_appointment_board_attaches_patients() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");
    let today = Utc::now().date_naive().to_string();

    mount_doctor(&mock_server, &user, json!([MockSupabaseResponses::doctor_response("doctor-1", &user.id, 500.0)])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("a1", "p1", "doctor-1", &today, "confirmed"),
            MockSupabaseResponses::appointment_response("a2", "p2", "doctor-1", "2026-01-05", "completed"),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("pid", "in.(p1,p2)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "pid": "p1", "uid": "u1", "user": { "name": "Meera Joshi" } }
        ])))
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/appointments", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    let board = &body["appointments"];
    assert_eq!(board["today"][0]["aid"], "a1");
    assert_eq!(board["today"][0]["patient"]["user"]["name"], "Meera Joshi");
    assert_eq!(board["today"][0]["complaint_description"], "Joint pain");
    assert_eq!(board["confirmed"], json!([]));
    assert_eq!(board["completed"][0]["aid"], "a2");
    assert!(board["completed"][0]["patient"].is_null());
}

#[tokio::test]
async fn test_update_appointment_status() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("aid", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("a1", "p1", "doctor-1", "2026-10-19", "confirmed")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = call(
        create_test_app(config.clone()),
        "PATCH",
        "/appointments/a1",
        &user,
        &config,
        Some(json!({ "status": "confirmed" })),
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let requests = mock_server.received_requests().await.unwrap();
    let changes: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(changes, json!({ "status": "confirmed" }));
}

#[tokio::test]
async fn test_update_appointment_requires_known_status() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, _) = call(
        create_test_app(config.clone()),
        "PATCH",
        "/appointments/a1",
        &user,
        &config,
        Some(json!({ "status": "teleported" })),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("aid", "eq.a1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "DELETE", "/appointments/a1", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Appointment deleted successfully");
}

#[tokio::test]
async fn test_start_call_stamps_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("aid", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("a1", "p1", "doctor-1", "2026-10-19", "confirmed")
        ])))
        .mount(&mock_server)
        .await;

    let mut started = MockSupabaseResponses::appointment_response("a1", "p1", "doctor-1", "2026-10-19", "in_progress");
    started["call_started_at"] = json!("2026-10-19T10:01:00+00:00");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("aid", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([started])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "POST", "/appointments/a1/start-call", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Call started successfully");
    assert_eq!(body["data"]["status"], "in_progress");
    assert_eq!(body["data"]["call_started_at"], "2026-10-19T10:01:00+00:00");

    let requests = mock_server.received_requests().await.unwrap();
    let patch = requests.iter().find(|r| r.method.as_str() == "PATCH").unwrap();
    let changes: Value = serde_json::from_slice(&patch.body).unwrap();
    assert_eq!(changes["status"], "in_progress");
    assert!(changes["call_started_at"].is_string());
    assert!(changes["updated_at"].is_string());
}

#[tokio::test]
async fn test_start_call_twice_keeps_first_timestamp() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    let mut started = MockSupabaseResponses::appointment_response("a1", "p1", "doctor-1", "2026-10-19", "in_progress");
    started["call_started_at"] = json!("2026-10-19T10:01:00+00:00");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("aid", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([started])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "POST", "/appointments/a1/start-call", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Call already started");
    assert_eq!(body["data"]["call_started_at"], "2026-10-19T10:01:00+00:00");
}

#[tokio::test]
async fn test_start_call_for_unknown_appointment_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "POST", "/appointments/missing/start-call", &user, &config, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Appointment not found");
}

#[tokio::test]
async fn test_patient_roster_uses_real_adherence() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    mount_doctor(&mock_server, &user, json!([MockSupabaseResponses::doctor_response("doctor-1", &user.id, 500.0)])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_patient_relationships"))
        .and(query_param("did", "eq.doctor-1"))
        .and(query_param("relationship_status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "pid": "patient-1", "total_appointments": 3, "last_appointment_date": "2026-10-10", "first_appointment_date": "2026-06-01" }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("pid", "in.(patient-1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("patient-1", "Meera Joshi")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/medication_adherence"))
        .and(query_param("pid", "in.(patient-1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::adherence_record("rx-1", "Triphala Churna", "2026-10-01", true, false),
            MockSupabaseResponses::adherence_record("rx-1", "Triphala Churna", "2026-10-02", true, false),
            MockSupabaseResponses::adherence_record("rx-1", "Triphala Churna", "2026-10-03", false, true),
        ])))
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/patients", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    let patient = &body["patients"][0];
    assert_eq!(patient["pid"], "patient-1");
    assert_eq!(patient["user"]["name"], "Meera Joshi");
    assert_eq!(patient["total_appointments"], 3);
    assert_eq!(patient["adherenceRate"], 66.7);
    assert_eq!(patient["recentAdherence"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_patient_roster_without_doctor_record_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    mount_doctor(&mock_server, &user, json!([])).await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/patients", &user, &config, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Doctor record not found");
}

#[tokio::test]
async fn test_patient_detail_with_history() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("pid", "eq.patient-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("patient-1", "Meera Joshi")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("pid", "eq.patient-1"))
        .and(query_param("order", "scheduled_date.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "aid": "a2", "scheduled_date": "2026-10-10", "status": "completed" },
            { "aid": "a1", "scheduled_date": "2026-09-01", "status": "completed" }
        ])))
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/patients/patient-1", &user, &config, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["user"]["name"], "Meera Joshi");
    assert_eq!(body["appointments"][0]["aid"], "a2");
    assert_eq!(body["appointments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_patient_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::doctor("vaidya@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (status, body) = call(create_test_app(config.clone()), "GET", "/patients/ghost", &user, &config, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Patient not found");
}
