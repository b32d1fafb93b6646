// libs/consultation-cell/src/services/requests.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    CancellationRecord, Consultation, ConsultationError, CreateCancellationRequest,
    CreateRescheduleRequest, RequestStatus, RescheduleRequest,
};
use crate::services::booking::ConsultationService;
use crate::services::store::RequestStore;

/// Human-in-the-loop approval workflow for cancellation and reschedule
/// requests. Each request is settled exactly once: the settlement is a
/// compare-and-swap on `status=requested`, and the recorded outcome always
/// matches what actually happened to the consultation.
pub struct RequestWorkflowService {
    store: RequestStore,
    consultations: Arc<ConsultationService>,
}

impl RequestWorkflowService {
    pub fn new(supabase: Arc<SupabaseClient>, consultations: Arc<ConsultationService>) -> Self {
        Self {
            store: RequestStore::new(supabase),
            consultations,
        }
    }

    // ==========================================================================
    // CANCELLATION REQUESTS
    // ==========================================================================

    pub async fn create_cancellation_request(
        &self,
        consultation_id: &Uuid,
        requested_by: Uuid,
        request: CreateCancellationRequest,
        auth_token: &str,
    ) -> Result<CancellationRecord, ConsultationError> {
        let consultation = self.consultations.get(consultation_id, auth_token).await?;
        if consultation.status.is_terminal() {
            return Err(ConsultationError::InvalidState(format!(
                "Consultation is already {}",
                consultation.status
            )));
        }

        let record = CancellationRecord {
            id: Uuid::new_v4(),
            consultation_id: *consultation_id,
            requested_by,
            requested_at: Utc::now(),
            reason: request.reason,
            status: RequestStatus::Requested,
            processed_by: None,
            processed_at: None,
            admin_note: None,
        };

        let created = self.store.create_cancellation(&record, auth_token).await?;
        info!(
            "Cancellation request {} opened for consultation {}",
            created.id, consultation_id
        );
        Ok(created)
    }

    /// Approving attempts the actual cancellation. If the consultation can
    /// no longer be cancelled (deadline passed, already terminal), the
    /// request settles as rejected instead of failing, so the record always
    /// states the real outcome.
    pub async fn approve_cancellation(
        &self,
        request_id: &Uuid,
        processed_by: &Uuid,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<CancellationRecord, ConsultationError> {
        let record = self.store.get_cancellation(request_id, auth_token).await?;
        if record.status != RequestStatus::Requested {
            return Err(ConsultationError::InvalidState(format!(
                "Request has already been {}",
                record.status
            )));
        }

        let (outcome, note) = match self
            .consultations
            .cancel(&record.consultation_id, record.reason.clone(), auth_token)
            .await
        {
            Ok(_) => (RequestStatus::Approved, note),
            Err(ConsultationError::PolicyViolation(msg))
            | Err(ConsultationError::InvalidState(msg)) => {
                warn!(
                    "Cancellation request {} could not be honored: {}",
                    request_id, msg
                );
                (RequestStatus::Rejected, Some(msg))
            }
            Err(ConsultationError::InvalidTransition { action: _, status }) => {
                warn!(
                    "Cancellation request {} targets consultation in status {}",
                    request_id, status
                );
                (
                    RequestStatus::Rejected,
                    Some(format!("Consultation is already {}", status)),
                )
            }
            Err(e) => return Err(e),
        };

        self.settle_cancellation(request_id, outcome, processed_by, note, auth_token)
            .await
    }

    pub async fn reject_cancellation(
        &self,
        request_id: &Uuid,
        processed_by: &Uuid,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<CancellationRecord, ConsultationError> {
        let record = self.store.get_cancellation(request_id, auth_token).await?;
        if record.status != RequestStatus::Requested {
            return Err(ConsultationError::InvalidState(format!(
                "Request has already been {}",
                record.status
            )));
        }

        self.settle_cancellation(request_id, RequestStatus::Rejected, processed_by, note, auth_token)
            .await
    }

    async fn settle_cancellation(
        &self,
        request_id: &Uuid,
        outcome: RequestStatus,
        processed_by: &Uuid,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<CancellationRecord, ConsultationError> {
        let settled = self
            .store
            .settle_cancellation(request_id, outcome, processed_by, note.as_deref(), auth_token)
            .await?
            .ok_or_else(|| {
                ConsultationError::InvalidState(
                    "Request has already been processed".to_string(),
                )
            })?;

        info!("Cancellation request {} settled as {}", request_id, outcome);
        Ok(settled)
    }

    // ==========================================================================
    // RESCHEDULE REQUESTS
    // ==========================================================================

    pub async fn create_reschedule_request(
        &self,
        consultation_id: &Uuid,
        requested_by: Uuid,
        request: CreateRescheduleRequest,
        auth_token: &str,
    ) -> Result<RescheduleRequest, ConsultationError> {
        let consultation = self.consultations.get(consultation_id, auth_token).await?;
        if consultation.status.is_terminal() {
            return Err(ConsultationError::InvalidState(format!(
                "Consultation is already {}",
                consultation.status
            )));
        }

        let proposed: Consultation = Consultation {
            scheduled_date: request.new_date,
            scheduled_time: request.new_time,
            ..consultation
        };
        if proposed.scheduled_datetime() <= Utc::now() {
            return Err(ConsultationError::ValidationError(
                "The proposed schedule must be in the future".to_string(),
            ));
        }

        let record = RescheduleRequest {
            id: Uuid::new_v4(),
            consultation_id: *consultation_id,
            requested_by,
            requested_at: Utc::now(),
            new_date: request.new_date,
            new_time: request.new_time,
            new_duration: request.new_duration,
            reason: request.reason,
            status: RequestStatus::Requested,
            processed_by: None,
            processed_at: None,
            admin_note: None,
        };

        let created = self.store.create_reschedule(&record, auth_token).await?;
        info!(
            "Reschedule request {} opened for consultation {}",
            created.id, consultation_id
        );
        Ok(created)
    }

    pub async fn approve_reschedule(
        &self,
        request_id: &Uuid,
        processed_by: &Uuid,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<RescheduleRequest, ConsultationError> {
        let record = self.store.get_reschedule(request_id, auth_token).await?;
        if record.status != RequestStatus::Requested {
            return Err(ConsultationError::InvalidState(format!(
                "Request has already been {}",
                record.status
            )));
        }

        let (outcome, note) = match self
            .consultations
            .apply_approved_reschedule(
                &record.consultation_id,
                record.new_date,
                record.new_time,
                record.new_duration,
                auth_token,
            )
            .await
        {
            Ok(_) => (RequestStatus::Approved, note),
            Err(ConsultationError::ValidationError(msg))
            | Err(ConsultationError::InvalidState(msg)) => {
                warn!(
                    "Reschedule request {} could not be honored: {}",
                    request_id, msg
                );
                (RequestStatus::Rejected, Some(msg))
            }
            Err(ConsultationError::InvalidTransition { action: _, status }) => {
                warn!(
                    "Reschedule request {} targets consultation in status {}",
                    request_id, status
                );
                (
                    RequestStatus::Rejected,
                    Some(format!("Consultation is already {}", status)),
                )
            }
            Err(e) => return Err(e),
        };

        self.settle_reschedule(request_id, outcome, processed_by, note, auth_token)
            .await
    }

    pub async fn reject_reschedule_request(
        &self,
        request_id: &Uuid,
        processed_by: &Uuid,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<RescheduleRequest, ConsultationError> {
        let record = self.store.get_reschedule(request_id, auth_token).await?;
        if record.status != RequestStatus::Requested {
            return Err(ConsultationError::InvalidState(format!(
                "Request has already been {}",
                record.status
            )));
        }

        self.settle_reschedule(request_id, RequestStatus::Rejected, processed_by, note, auth_token)
            .await
    }

    async fn settle_reschedule(
        &self,
        request_id: &Uuid,
        outcome: RequestStatus,
        processed_by: &Uuid,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<RescheduleRequest, ConsultationError> {
        let settled = self
            .store
            .settle_reschedule(request_id, outcome, processed_by, note.as_deref(), auth_token)
            .await?
            .ok_or_else(|| {
                ConsultationError::InvalidState(
                    "Request has already been processed".to_string(),
                )
            })?;

        info!("Reschedule request {} settled as {}", request_id, outcome);
        Ok(settled)
    }
}
