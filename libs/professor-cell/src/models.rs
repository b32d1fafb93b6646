// libs/professor-cell/src/models.rs
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// PROFESSOR PROFILE MODELS
// ==============================================================================

/// One availability window within a weekday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Per-professor consultation preferences, availability and the cached
/// rating aggregate. One-to-one with a professor identity; created lazily
/// with defaults on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessorProfile {
    pub id: Uuid,
    pub professor_id: Uuid,
    pub title: Option<String>,
    pub department: Option<String>,
    pub office_location: Option<String>,
    pub consultation_duration_default: i32,
    /// Weekday name (lowercase) to ordered availability windows.
    #[serde(default)]
    pub available_days: HashMap<String, Vec<TimeRange>>,
    pub max_advance_booking_days: i32,
    pub buffer_time_between_consultations: i32,
    pub cancellation_notice_hours: i64,
    pub status: ProfessorStatus,
    /// Cached aggregate; always recomputable from rated consultations.
    pub average_rating: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfessorProfile {
    pub fn available_slots(&self, day_of_week: &str) -> Vec<TimeRange> {
        self.available_days
            .get(&day_of_week.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProfessorStatus {
    Available,
    Busy,
    Away,
    OnLeave,
}

impl fmt::Display for ProfessorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfessorStatus::Available => write!(f, "available"),
            ProfessorStatus::Busy => write!(f, "busy"),
            ProfessorStatus::Away => write!(f, "away"),
            ProfessorStatus::OnLeave => write!(f, "on_leave"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub title: Option<String>,
    pub department: Option<String>,
    pub office_location: Option<String>,
    pub consultation_duration_default: Option<i32>,
    pub available_days: Option<HashMap<String, Vec<TimeRange>>>,
    pub max_advance_booking_days: Option<i32>,
    pub buffer_time_between_consultations: Option<i32>,
    pub cancellation_notice_hours: Option<i64>,
    pub status: Option<ProfessorStatus>,
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ProfileValidationRules {
    pub min_duration_minutes: i32,
    pub max_duration_minutes: i32,
    pub min_advance_booking_days: i32,
    pub max_advance_booking_days: i32,
    pub max_buffer_minutes: i32,
}

impl Default for ProfileValidationRules {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            max_duration_minutes: 240,
            min_advance_booking_days: 1,
            max_advance_booking_days: 365,
            max_buffer_minutes: 120,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProfessorError {
    #[error("Professor profile not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
