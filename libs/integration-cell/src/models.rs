use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar-facing view of a consultation. Keeps the calendar client
/// decoupled from the consultation model itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
}

/// One notification per lifecycle transition that parties care about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Booked,
    Confirmed,
    Cancelled,
    RescheduleProposed,
    RescheduleAccepted,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Booked => write!(f, "booked"),
            NotificationKind::Confirmed => write!(f, "confirmed"),
            NotificationKind::Cancelled => write!(f, "cancelled"),
            NotificationKind::RescheduleProposed => write!(f, "reschedule_proposed"),
            NotificationKind::RescheduleAccepted => write!(f, "reschedule_accepted"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("Integration not configured")]
    NotConfigured,

    #[error("External API error: {message}")]
    ApiError { message: String },

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
