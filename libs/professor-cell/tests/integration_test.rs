use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use professor_cell::router::professor_routes;
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
    professor_routes(Arc::new(config))
}

#[tokio::test]
async fn test_get_profile_creates_defaults_on_first_access() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let student = TestUser::student("student@example.com");
    let professor_id = Uuid::new_v4().to_string();

    // No row yet.
    Mock::given(method("GET"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 4)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&student, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}/profile", professor_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["cancellation_notice_hours"], 4);
}

#[tokio::test]
async fn test_update_profile_requires_owner_or_admin() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let other_professor = TestUser::professor("other@example.com");
    let professor_id = Uuid::new_v4().to_string();

    let token =
        JwtTestUtils::create_test_token(&other_professor, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}/profile", professor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "cancellation_notice_hours": 24 }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_profile_validates_ranges() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let professor = TestUser::professor("prof@example.com");
    let professor_id = professor.id.clone();

    let token =
        JwtTestUtils::create_test_token(&professor, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}/profile", professor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "consultation_duration_default": 5 }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_notice_hours_as_owner() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let professor = TestUser::professor("prof@example.com");
    let professor_id = professor.id.clone();

    Mock::given(method("GET"))
        .and(path("/rest/v1/professor_profiles"))
        .and(query_param("professor_id", format!("eq.{}", professor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 4)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 24)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token =
        JwtTestUtils::create_test_token(&professor, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}/profile", professor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "cancellation_notice_hours": 24 }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["profile"]["cancellation_notice_hours"], 24);
}

#[tokio::test]
async fn test_availability_lists_configured_slots() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let student = TestUser::student("student@example.com");
    let professor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 4)
        ])))
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&student, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}/availability?day=monday", professor_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["day"], "monday");
    assert_eq!(json_response["slots"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_recalculate_ratings_is_admin_only() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let professor = TestUser::professor("prof@example.com");
    let token =
        JwtTestUtils::create_test_token(&professor, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/ratings/recalculate", Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_recalculate_ratings_returns_aggregate() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let admin = TestUser::admin("admin@example.com");
    let professor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("rating", "not.is.null"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "rating": 5 }, { "rating": 4 }, { "rating": 3 }])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 4)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/professor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professor_profile_response(&professor_id, 4)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/ratings/recalculate", professor_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["average_rating"], 4.0);
    assert_eq!(json_response["total_reviews"], 3);
}
