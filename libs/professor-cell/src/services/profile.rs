// libs/professor-cell/src/services/profile.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ProfessorError, ProfessorProfile, ProfileValidationRules, UpdateProfileRequest};

pub struct ProfessorProfileService {
    supabase: Arc<SupabaseClient>,
    validation_rules: ProfileValidationRules,
    default_notice_hours: i64,
}

impl ProfessorProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            validation_rules: ProfileValidationRules::default(),
            default_notice_hours: config.default_cancellation_notice_hours,
        }
    }

    /// Fetch a profile if one exists. Absence is not an error: a professor
    /// who never touched their settings simply has no row yet.
    pub async fn get_profile(
        &self,
        professor_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<ProfessorProfile>, ProfessorError> {
        debug!("Fetching professor profile for {}", professor_id);

        let path = format!("/rest/v1/professor_profiles?professor_id=eq.{}", professor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProfessorError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => {
                let profile = serde_json::from_value(row).map_err(|e| {
                    ProfessorError::DatabaseError(format!("Failed to parse profile: {}", e))
                })?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Lazy creation with defaults on first access.
    pub async fn get_or_create(
        &self,
        professor_id: Uuid,
        auth_token: &str,
    ) -> Result<ProfessorProfile, ProfessorError> {
        if let Some(profile) = self.get_profile(professor_id, auth_token).await? {
            return Ok(profile);
        }

        info!("Creating default profile for professor {}", professor_id);

        let body = json!({
            "professor_id": professor_id,
            "consultation_duration_default": 30,
            "available_days": {},
            "max_advance_booking_days": 30,
            "buffer_time_between_consultations": 15,
            "cancellation_notice_hours": self.default_notice_hours,
            "status": "available",
            "average_rating": 0.0,
            "total_reviews": 0,
        });

        let created: Vec<Value> = self
            .supabase
            .request_returning(
                Method::POST,
                "/rest/v1/professor_profiles",
                Some(auth_token),
                Some(body),
            )
            .await
            .map_err(|e| ProfessorError::DatabaseError(e.to_string()))?;

        let row = created
            .into_iter()
            .next()
            .ok_or_else(|| ProfessorError::DatabaseError("Profile insert returned no row".into()))?;

        serde_json::from_value(row)
            .map_err(|e| ProfessorError::DatabaseError(format!("Failed to parse profile: {}", e)))
    }

    /// Update settings after range validation. Only provided fields change.
    pub async fn update_settings(
        &self,
        professor_id: Uuid,
        request: UpdateProfileRequest,
        auth_token: &str,
    ) -> Result<ProfessorProfile, ProfessorError> {
        self.validate_settings(&request)?;

        // Ensure the row exists so a first-time settings save works.
        self.get_or_create(professor_id, auth_token).await?;

        let mut patch = Map::new();
        if let Some(title) = request.title {
            patch.insert("title".into(), json!(title));
        }
        if let Some(department) = request.department {
            patch.insert("department".into(), json!(department));
        }
        if let Some(office_location) = request.office_location {
            patch.insert("office_location".into(), json!(office_location));
        }
        if let Some(duration) = request.consultation_duration_default {
            patch.insert("consultation_duration_default".into(), json!(duration));
        }
        if let Some(days) = request.available_days {
            patch.insert("available_days".into(), json!(days));
        }
        if let Some(advance) = request.max_advance_booking_days {
            patch.insert("max_advance_booking_days".into(), json!(advance));
        }
        if let Some(buffer) = request.buffer_time_between_consultations {
            patch.insert("buffer_time_between_consultations".into(), json!(buffer));
        }
        if let Some(notice) = request.cancellation_notice_hours {
            patch.insert("cancellation_notice_hours".into(), json!(notice));
        }
        if let Some(status) = request.status {
            patch.insert("status".into(), json!(status));
        }

        if patch.is_empty() {
            return self.get_or_create(professor_id, auth_token).await;
        }

        let path = format!("/rest/v1/professor_profiles?professor_id=eq.{}", professor_id);
        let updated: Vec<Value> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(auth_token), Some(Value::Object(patch)))
            .await
            .map_err(|e| ProfessorError::DatabaseError(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(ProfessorError::NotFound)?;

        info!("Updated profile settings for professor {}", professor_id);

        serde_json::from_value(row)
            .map_err(|e| ProfessorError::DatabaseError(format!("Failed to parse profile: {}", e)))
    }

    fn validate_settings(&self, request: &UpdateProfileRequest) -> Result<(), ProfessorError> {
        let rules = &self.validation_rules;

        if let Some(duration) = request.consultation_duration_default {
            if duration < rules.min_duration_minutes || duration > rules.max_duration_minutes {
                return Err(ProfessorError::ValidationError(format!(
                    "Default duration must be between {} and {} minutes",
                    rules.min_duration_minutes, rules.max_duration_minutes
                )));
            }
        }

        if let Some(advance) = request.max_advance_booking_days {
            if advance < rules.min_advance_booking_days || advance > rules.max_advance_booking_days {
                return Err(ProfessorError::ValidationError(format!(
                    "Advance booking window must be between {} and {} days",
                    rules.min_advance_booking_days, rules.max_advance_booking_days
                )));
            }
        }

        if let Some(buffer) = request.buffer_time_between_consultations {
            if buffer < 0 || buffer > rules.max_buffer_minutes {
                return Err(ProfessorError::ValidationError(format!(
                    "Buffer time must be between 0 and {} minutes",
                    rules.max_buffer_minutes
                )));
            }
        }

        if let Some(notice) = request.cancellation_notice_hours {
            if notice < 0 {
                return Err(ProfessorError::ValidationError(
                    "Cancellation notice hours cannot be negative".to_string(),
                ));
            }
        }

        if let Some(days) = &request.available_days {
            for (day, ranges) in days {
                for range in ranges {
                    if range.end <= range.start {
                        return Err(ProfessorError::ValidationError(format!(
                            "Availability window on {} must end after it starts",
                            day
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeRange;
    use chrono::NaiveTime;
    use std::collections::HashMap;

    fn create_test_service() -> ProfessorProfileService {
        let config = AppConfig {
            supabase_url: "http://localhost".to_string(),
            supabase_anon_key: "test".to_string(),
            supabase_jwt_secret: "test".to_string(),
            google_calendar_base_url: "http://localhost".to_string(),
            google_calendar_api_token: "test".to_string(),
            google_calendar_id: "primary".to_string(),
            default_cancellation_notice_hours: 4,
        };
        ProfessorProfileService::new(&config)
    }

    #[test]
    fn test_duration_out_of_range_rejected() {
        let service = create_test_service();

        let request = UpdateProfileRequest {
            consultation_duration_default: Some(10),
            ..Default::default()
        };
        assert!(service.validate_settings(&request).is_err());

        let request = UpdateProfileRequest {
            consultation_duration_default: Some(241),
            ..Default::default()
        };
        assert!(service.validate_settings(&request).is_err());

        let request = UpdateProfileRequest {
            consultation_duration_default: Some(30),
            ..Default::default()
        };
        assert!(service.validate_settings(&request).is_ok());
    }

    #[test]
    fn test_negative_notice_hours_rejected() {
        let service = create_test_service();

        let request = UpdateProfileRequest {
            cancellation_notice_hours: Some(-1),
            ..Default::default()
        };
        assert!(service.validate_settings(&request).is_err());

        // Zero notice is legal: cancellation allowed until the scheduled instant.
        let request = UpdateProfileRequest {
            cancellation_notice_hours: Some(0),
            ..Default::default()
        };
        assert!(service.validate_settings(&request).is_ok());
    }

    #[test]
    fn test_inverted_availability_window_rejected() {
        let service = create_test_service();

        let mut days = HashMap::new();
        days.insert(
            "monday".to_string(),
            vec![TimeRange {
                start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            }],
        );

        let request = UpdateProfileRequest {
            available_days: Some(days),
            ..Default::default()
        };
        assert!(service.validate_settings(&request).is_err());
    }
}
