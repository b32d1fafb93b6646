use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub google_calendar_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            google_calendar_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            google_calendar_base_url: self.google_calendar_base_url.clone(),
            google_calendar_api_token: "test-calendar-token".to_string(),
            google_calendar_id: "primary".to_string(),
            default_cancellation_notice_hours: 4,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
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
            role: "student".to_string(),
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

    pub fn student(email: &str) -> Self {
        Self::new(email, "student")
    }

    pub fn professor(email: &str) -> Self {
        Self::new(email, "professor")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id.to_string();
        self
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

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST row payloads used by the wiremock-based suites.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn consultation_response(
        id: &str,
        student_id: &str,
        professor_id: &str,
        status: &str,
        scheduled_date: NaiveDate,
        scheduled_time: NaiveTime,
    ) -> serde_json::Value {
        let now = Utc::now();
        json!({
            "id": id,
            "student_id": student_id,
            "professor_id": professor_id,
            "title": "Thesis supervision",
            "description": "Discuss chapter 2 draft",
            "scheduled_date": scheduled_date.to_string(),
            "scheduled_time": scheduled_time.format("%H:%M:%S").to_string(),
            "duration_minutes": 30,
            "status": status,
            "confirmed_at": if status == "pending" { json!(null) } else { json!(now.to_rfc3339()) },
            "cancelled_at": null,
            "cancellation_reason": null,
            "calendar_event_id": null,
            "meeting_link": null,
            "location": "Office 214",
            "notes": null,
            "rating": null,
            "feedback": null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        })
    }

    pub fn professor_profile_response(professor_id: &str, notice_hours: i64) -> serde_json::Value {
        let now = Utc::now();
        json!({
            "id": Uuid::new_v4().to_string(),
            "professor_id": professor_id,
            "title": "Dr.",
            "department": "Computer Science",
            "office_location": "Office 214",
            "consultation_duration_default": 30,
            "available_days": {
                "monday": [{"start": "09:00:00", "end": "12:00:00"}],
                "wednesday": [{"start": "14:00:00", "end": "17:00:00"}]
            },
            "max_advance_booking_days": 30,
            "buffer_time_between_consultations": 15,
            "cancellation_notice_hours": notice_hours,
            "status": "available",
            "average_rating": 0.0,
            "total_reviews": 0,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        })
    }

    pub fn cancellation_record_response(
        id: &str,
        consultation_id: &str,
        requested_by: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "consultation_id": consultation_id,
            "requested_by": requested_by,
            "requested_at": Utc::now().to_rfc3339(),
            "reason": "Schedule clash",
            "status": status,
            "processed_by": null,
            "processed_at": null,
            "admin_note": null
        })
    }

    pub fn reschedule_request_response(
        id: &str,
        consultation_id: &str,
        requested_by: &str,
        status: &str,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "consultation_id": consultation_id,
            "requested_by": requested_by,
            "requested_at": Utc::now().to_rfc3339(),
            "new_date": new_date.to_string(),
            "new_time": new_time.format("%H:%M:%S").to_string(),
            "new_duration": null,
            "reason": "Conference travel",
            "status": status,
            "processed_by": null,
            "processed_at": null,
            "admin_note": null
        })
    }
}
