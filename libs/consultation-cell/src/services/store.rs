// libs/consultation-cell/src/services/store.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{
    CancellationRecord, Consultation, ConsultationError, ConsultationSearchQuery,
    ConsultationStatus, RequestStatus, RescheduleRequest,
};

const CONSULTATIONS_TABLE: &str = "/rest/v1/consultations";
const CANCELLATIONS_TABLE: &str = "/rest/v1/consultation_cancellations";
const RESCHEDULES_TABLE: &str = "/rest/v1/consultation_reschedules";

/// Persistence layer for consultations, backed by PostgREST. All guarded
/// writes go through filtered PATCHes so two racing callers can never both
/// apply the same transition; the loser gets zero rows back.
pub struct ConsultationStore {
    supabase: Arc<SupabaseClient>,
}

impl ConsultationStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create(
        &self,
        consultation: &Consultation,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let body = serde_json::to_value(consultation)
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let mut created: Vec<Consultation> = self
            .supabase
            .request_returning(Method::POST, CONSULTATIONS_TABLE, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        created
            .pop()
            .ok_or_else(|| ConsultationError::DatabaseError("Insert returned no row".to_string()))
    }

    pub async fn get(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let path = format!("{}?id=eq.{}&select=*", CONSULTATIONS_TABLE, consultation_id);

        let mut rows: Vec<Consultation> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        rows.pop().ok_or(ConsultationError::NotFound)
    }

    pub async fn search(
        &self,
        query: &ConsultationSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        let mut query_parts = vec!["select=*".to_string()];

        if let Some(student_id) = &query.student_id {
            query_parts.push(format!("student_id=eq.{}", student_id));
        }
        if let Some(professor_id) = &query.professor_id {
            query_parts.push(format!("professor_id=eq.{}", professor_id));
        }
        if let Some(status) = &query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(date_from) = &query.date_from {
            query_parts.push(format!(
                "scheduled_date=gte.{}",
                urlencoding::encode(&date_from.to_string())
            ));
        }
        if let Some(date_to) = &query.date_to {
            query_parts.push(format!(
                "scheduled_date=lte.{}",
                urlencoding::encode(&date_to.to_string())
            ));
        }

        query_parts.push("order=scheduled_date.asc,scheduled_time.asc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50).clamp(1, 200)));
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset.max(0)));
        }

        let path = format!("{}?{}", CONSULTATIONS_TABLE, query_parts.join("&"));
        debug!("Searching consultations: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))
    }

    /// Compare-and-swap update: the PATCH only matches while the row is still
    /// in `expected_status` (plus any extra PostgREST filter). Returns `None`
    /// when the guard missed, i.e. a concurrent writer got there first.
    pub async fn update_guarded(
        &self,
        consultation_id: &Uuid,
        expected_status: ConsultationStatus,
        patch: Value,
        extra_filter: Option<&str>,
        auth_token: &str,
    ) -> Result<Option<Consultation>, ConsultationError> {
        let mut path = format!(
            "{}?id=eq.{}&status=eq.{}",
            CONSULTATIONS_TABLE, consultation_id, expected_status
        );
        if let Some(filter) = extra_filter {
            path.push('&');
            path.push_str(filter);
        }

        let mut body = patch;
        if let Value::Object(ref mut map) = body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        let mut updated: Vec<Consultation> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            warn!(
                "Guarded update on consultation {} missed (expected status {})",
                consultation_id, expected_status
            );
        }

        Ok(updated.pop())
    }

    /// Unconditional field update for non-lifecycle columns, currently the
    /// calendar event handle after a successful sync.
    pub async fn set_calendar_event(
        &self,
        consultation_id: &Uuid,
        calendar_event_id: Option<&str>,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let path = format!("{}?id=eq.{}", CONSULTATIONS_TABLE, consultation_id);
        let body = json!({
            "calendar_event_id": calendar_event_id,
            "updated_at": Utc::now(),
        });

        let _: Vec<Consultation> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub async fn delete(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let path = format!("{}?id=eq.{}", CONSULTATIONS_TABLE, consultation_id);

        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))
    }
}

/// Persistence for the human-in-the-loop cancellation and reschedule
/// requests. Processing uses the same CAS pattern as the consultations
/// table, guarded on `status=eq.requested`, which is what makes each
/// request processable exactly once.
pub struct RequestStore {
    supabase: Arc<SupabaseClient>,
}

impl RequestStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_cancellation(
        &self,
        record: &CancellationRecord,
        auth_token: &str,
    ) -> Result<CancellationRecord, ConsultationError> {
        let body = serde_json::to_value(record)
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let mut created: Vec<CancellationRecord> = self
            .supabase
            .request_returning(Method::POST, CANCELLATIONS_TABLE, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        created
            .pop()
            .ok_or_else(|| ConsultationError::DatabaseError("Insert returned no row".to_string()))
    }

    pub async fn get_cancellation(
        &self,
        request_id: &Uuid,
        auth_token: &str,
    ) -> Result<CancellationRecord, ConsultationError> {
        let path = format!("{}?id=eq.{}&select=*", CANCELLATIONS_TABLE, request_id);

        let mut rows: Vec<CancellationRecord> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        rows.pop().ok_or(ConsultationError::NotFound)
    }

    /// Flip a cancellation request from `requested` to its outcome. `None`
    /// means another processor already claimed it.
    pub async fn settle_cancellation(
        &self,
        request_id: &Uuid,
        outcome: RequestStatus,
        processed_by: &Uuid,
        admin_note: Option<&str>,
        auth_token: &str,
    ) -> Result<Option<CancellationRecord>, ConsultationError> {
        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            CANCELLATIONS_TABLE,
            request_id,
            RequestStatus::Requested
        );
        let body = json!({
            "status": outcome,
            "processed_by": processed_by,
            "processed_at": Utc::now(),
            "admin_note": admin_note,
        });

        let mut updated: Vec<CancellationRecord> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        Ok(updated.pop())
    }

    pub async fn create_reschedule(
        &self,
        request: &RescheduleRequest,
        auth_token: &str,
    ) -> Result<RescheduleRequest, ConsultationError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let mut created: Vec<RescheduleRequest> = self
            .supabase
            .request_returning(Method::POST, RESCHEDULES_TABLE, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        created
            .pop()
            .ok_or_else(|| ConsultationError::DatabaseError("Insert returned no row".to_string()))
    }

    pub async fn get_reschedule(
        &self,
        request_id: &Uuid,
        auth_token: &str,
    ) -> Result<RescheduleRequest, ConsultationError> {
        let path = format!("{}?id=eq.{}&select=*", RESCHEDULES_TABLE, request_id);

        let mut rows: Vec<RescheduleRequest> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        rows.pop().ok_or(ConsultationError::NotFound)
    }

    pub async fn settle_reschedule(
        &self,
        request_id: &Uuid,
        outcome: RequestStatus,
        processed_by: &Uuid,
        admin_note: Option<&str>,
        auth_token: &str,
    ) -> Result<Option<RescheduleRequest>, ConsultationError> {
        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            RESCHEDULES_TABLE,
            request_id,
            RequestStatus::Requested
        );
        let body = json!({
            "status": outcome,
            "processed_by": processed_by,
            "processed_at": Utc::now(),
            "admin_note": admin_note,
        });

        let mut updated: Vec<RescheduleRequest> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        Ok(updated.pop())
    }
}
