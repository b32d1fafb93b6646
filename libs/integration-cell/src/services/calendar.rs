use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{CalendarEvent, IntegrationError};

/// External calendar collaborator. Callers treat every method as
/// best-effort: a failure is logged and never rolls back booking state.
#[async_trait]
pub trait CalendarSync: Send + Sync {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, IntegrationError>;
    async fn update_event(
        &self,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<String, IntegrationError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), IntegrationError>;
}

#[derive(Debug, Deserialize)]
struct GoogleEventResponse {
    id: String,
}

/// Google Calendar REST client.
/// Based on: https://developers.google.com/calendar/api/v3/reference/events
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    api_token: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &AppConfig) -> Result<Self, IntegrationError> {
        if !config.is_calendar_sync_configured() {
            return Err(IntegrationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.google_calendar_base_url.clone(),
            api_token: config.google_calendar_api_token.clone(),
            calendar_id: config.google_calendar_id.clone(),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, self.calendar_id)
    }

    fn event_body(event: &CalendarEvent) -> serde_json::Value {
        json!({
            "summary": event.summary,
            "description": event.description,
            "location": event.location,
            "start": { "dateTime": event.start.to_rfc3339() },
            "end": { "dateTime": event.end.to_rfc3339() },
        })
    }

    async fn parse_event_response(
        response: reqwest::Response,
    ) -> Result<GoogleEventResponse, IntegrationError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Google Calendar API error: {} - {}", status, text);
            return Err(IntegrationError::ApiError {
                message: format!("HTTP {}: {}", status, text),
            });
        }

        serde_json::from_str(&text).map_err(|e| IntegrationError::ApiError {
            message: format!("Failed to parse event response: {}", e),
        })
    }
}

#[async_trait]
impl CalendarSync for GoogleCalendarClient {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, IntegrationError> {
        let url = self.events_url();
        debug!("Creating calendar event at {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&Self::event_body(event))
            .send()
            .await?;

        let created = Self::parse_event_response(response).await?;
        info!("Created calendar event {}", created.id);
        Ok(created.id)
    }

    async fn update_event(
        &self,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<String, IntegrationError> {
        let url = format!("{}/{}", self.events_url(), event_id);
        debug!("Updating calendar event at {}", url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&Self::event_body(event))
            .send()
            .await?;

        let updated = Self::parse_event_response(response).await?;
        info!("Updated calendar event {}", updated.id);
        Ok(updated.id)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), IntegrationError> {
        let url = format!("{}/{}", self.events_url(), event_id);
        debug!("Deleting calendar event at {}", url);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        // Google returns 410 for events already removed; treat as done.
        if !status.is_success() && status.as_u16() != 410 {
            let text = response.text().await.unwrap_or_default();
            error!("Google Calendar delete failed: {} - {}", status, text);
            return Err(IntegrationError::ApiError {
                message: format!("HTTP {}: {}", status, text),
            });
        }

        info!("Deleted calendar event {}", event_id);
        Ok(())
    }
}
