use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultation_cell::router::consultation_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestUser};

fn test_config(supabase_uri: &str) -> AppConfig {
    AppConfig {
        supabase_url: supabase_uri.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        google_calendar_base_url: supabase_uri.to_string(),
        google_calendar_api_token: "test-calendar-token".to_string(),
        google_calendar_id: "primary".to_string(),
        default_cancellation_notice_hours: 4,
    }
}

fn create_test_app(config: AppConfig) -> Router {
    consultation_routes(Arc::new(config))
}

#[tokio::test]
async fn test_create_cancellation_request() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let student = TestUser::student("student@example.com");
    let professor_id = Uuid::new_v4().to_string();
    let consultation_id = Uuid::new_v4().to_string();
    let scheduled = Utc::now() + Duration::hours(2);

    let confirmed = MockSupabaseResponses::consultation_response(
        &consultation_id,
        &student.id,
        &professor_id,
        "confirmed",
        scheduled.date_naive(),
        scheduled.time(),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .mount(&mock_server)
        .await;

    let record_id = Uuid::new_v4().to_string();
    Mock::given(method("POST"))
        .and(path("/rest/v1/consultation_cancellations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::cancellation_record_response(
                &record_id,
                &consultation_id,
                &student.id,
                "requested",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&student, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/cancellation-requests", consultation_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "reason": "Schedule clash" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["request"]["status"], "requested");
}

#[tokio::test]
async fn test_approve_cancellation_past_deadline_settles_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let admin = TestUser::admin("admin@example.com");
    let student_id = Uuid::new_v4().to_string();
    let professor_id = Uuid::new_v4().to_string();
    let consultation_id = Uuid::new_v4().to_string();
    let record_id = Uuid::new_v4().to_string();
    // Inside the four hour notice window: the cancellation itself is no
    // longer allowed, so approval must settle the request as rejected.
    let scheduled = Utc::now() + Duration::hours(2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultation_cancellations"))
        .and(query_param("id", format!("eq.{}", record_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::cancellation_record_response(
                &record_id,
                &consultation_id,
                &student_id,
                "requested",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("id", format!("eq.{}", consultation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::consultation_response(
                &consultation_id,
                &student_id,
                &professor_id,
                "confirmed",
                scheduled.date_naive(),
                scheduled.time(),
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 4)
        ])))
        .mount(&mock_server)
        .await;

    let mut settled = MockSupabaseResponses::cancellation_record_response(
        &record_id,
        &consultation_id,
        &student_id,
        "rejected",
    );
    settled["processed_by"] = json!(admin.id);
    settled["processed_at"] = json!(Utc::now().to_rfc3339());

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultation_cancellations"))
        .and(query_param("status", "eq.requested"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([settled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/cancellation-requests/{}/approve", record_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["request"]["status"], "rejected");
}

#[tokio::test]
async fn test_approve_already_processed_request_conflicts() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let admin = TestUser::admin("admin@example.com");
    let record_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultation_cancellations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::cancellation_record_response(
                &record_id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "approved",
            )
        ])))
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/cancellation-requests/{}/approve", record_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_process_requests_is_admin_only() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let student = TestUser::student("student@example.com");
    let token = JwtTestUtils::create_test_token(&student, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/reschedule-requests/{}/approve", Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_approve_reschedule_applies_new_schedule() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let admin = TestUser::admin("admin@example.com");
    let student_id = Uuid::new_v4().to_string();
    let professor_id = Uuid::new_v4().to_string();
    let consultation_id = Uuid::new_v4().to_string();
    let record_id = Uuid::new_v4().to_string();
    let scheduled = Utc::now() + Duration::hours(48);
    let new_scheduled = Utc::now() + Duration::hours(96);

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultation_reschedules"))
        .and(query_param("id", format!("eq.{}", record_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::reschedule_request_response(
                &record_id,
                &consultation_id,
                &student_id,
                "requested",
                new_scheduled.date_naive(),
                new_scheduled.time(),
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("id", format!("eq.{}", consultation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::consultation_response(
                &consultation_id,
                &student_id,
                &professor_id,
                "confirmed",
                scheduled.date_naive(),
                scheduled.time(),
            )
        ])))
        .mount(&mock_server)
        .await;

    let mut rescheduled = MockSupabaseResponses::consultation_response(
        &consultation_id,
        &student_id,
        &professor_id,
        "rescheduled",
        new_scheduled.date_naive(),
        new_scheduled.time(),
    );
    rescheduled["status"] = json!("rescheduled");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("status", "eq.confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([rescheduled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut settled = MockSupabaseResponses::reschedule_request_response(
        &record_id,
        &consultation_id,
        &student_id,
        "approved",
        new_scheduled.date_naive(),
        new_scheduled.time(),
    );
    settled["processed_by"] = json!(admin.id);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultation_reschedules"))
        .and(query_param("status", "eq.requested"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([settled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/reschedule-requests/{}/approve", record_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "note": "Approved per policy" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["request"]["status"], "approved");
}
