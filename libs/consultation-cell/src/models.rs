// libs/consultation-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE CONSULTATION MODELS
// ==============================================================================

/// One booking instance between a student and a professor. Status and the
/// lifecycle timestamps are only ever changed through the transition
/// functions in `services::lifecycle`; there are no public setters for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub professor_id: Uuid,
    pub title: String,
    pub description: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: ConsultationStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// External calendar handle. Absence means "not yet synced" or "sync
    /// failed"; both are legal.
    pub calendar_event_id: Option<String>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Scheduled date and time combined into a single instant. All schedule
    /// arithmetic runs in the system's fixed reference timezone (UTC).
    pub fn scheduled_datetime(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.scheduled_date.and_time(self.scheduled_time), Utc)
    }

    pub fn scheduled_end_datetime(&self) -> DateTime<Utc> {
        self.scheduled_datetime() + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn is_past(&self) -> bool {
        self.scheduled_datetime() < Utc::now()
    }

    pub fn is_upcoming(&self) -> bool {
        !self.is_past()
            && matches!(
                self.status,
                ConsultationStatus::Pending | ConsultationStatus::Confirmed
            )
    }

    pub fn can_be_rated(&self) -> bool {
        self.status == ConsultationStatus::Completed && self.rating.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
    RescheduleProposed,
    Rescheduled,
}

impl ConsultationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Cancelled
                | ConsultationStatus::Completed
                | ConsultationStatus::NoShow
        )
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationStatus::Pending => write!(f, "pending"),
            ConsultationStatus::Confirmed => write!(f, "confirmed"),
            ConsultationStatus::Cancelled => write!(f, "cancelled"),
            ConsultationStatus::Completed => write!(f, "completed"),
            ConsultationStatus::NoShow => write!(f, "no_show"),
            ConsultationStatus::RescheduleProposed => write!(f, "reschedule_proposed"),
            ConsultationStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConsultationRequest {
    pub professor_id: Uuid,
    pub title: String,
    pub description: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    /// Falls back to the professor's default duration when omitted.
    pub duration_minutes: Option<i32>,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelConsultationRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRescheduleRequest {
    pub new_date: Option<NaiveDate>,
    pub new_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConsultationRequest {
    pub rating: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationSearchQuery {
    pub student_id: Option<Uuid>,
    pub professor_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// CANCELLATION / RESCHEDULE REQUEST WORKFLOW MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Requested,
    Approved,
    Rejected,
    Cancelled,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Requested => write!(f, "requested"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
            RequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A pending human-in-the-loop decision to cancel an existing consultation.
/// Processed exactly once; the final status always reflects what actually
/// happened to the consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub requested_by: Uuid,
    pub requested_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
}

/// A request to move a consultation to a new date/time, optionally with a
/// new duration. Approval applies the proposed schedule and marks the
/// consultation rescheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub requested_by: Uuid,
    pub requested_at: DateTime<Utc>,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub new_duration: Option<i32>,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCancellationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRescheduleRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub new_duration: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRequestBody {
    pub note: Option<String>,
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ConsultationValidationRules {
    pub min_duration_minutes: i32,
    pub max_duration_minutes: i32,
    pub min_rating: i32,
    pub max_rating: i32,
}

impl Default for ConsultationValidationRules {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            max_duration_minutes: 240,
            min_rating: 1,
            max_rating: 5,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cannot {action} consultation in status {status}")]
    InvalidTransition {
        action: &'static str,
        status: ConsultationStatus,
    },

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External sync failure: {0}")]
    ExternalSyncFailure(String),
}
