// libs/consultation-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use integration_cell::models::{CalendarEvent, NotificationKind};
use integration_cell::services::calendar::{CalendarSync, GoogleCalendarClient};
use integration_cell::services::notifier::{Notifier, SupabaseNotifier};
use professor_cell::services::profile::ProfessorProfileService;
use professor_cell::services::rating::RatingAggregator;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BookConsultationRequest, Consultation, ConsultationError, ConsultationSearchQuery,
    ConsultationStatus, ProposeRescheduleRequest,
};
use crate::services::lifecycle::ConsultationLifecycle;
use crate::services::policy::CancellationPolicy;
use crate::services::store::ConsultationStore;

/// Orchestrates every consultation operation against its collaborators in a
/// fixed order:
///
///   1. persist the transition (fatal on failure),
///   2. sync the external calendar (best-effort, failures logged),
///   3. queue a notification (fire-and-forget).
///
/// A consultation is therefore never left claiming a calendar event that was
/// not created, and no notification ever precedes its state change.
pub struct ConsultationService {
    store: ConsultationStore,
    lifecycle: ConsultationLifecycle,
    profiles: ProfessorProfileService,
    ratings: RatingAggregator,
    calendar: Option<Arc<dyn CalendarSync>>,
    notifier: Arc<dyn Notifier>,
    default_notice_hours: i64,
}

impl ConsultationService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        // Calendar sync is optional: without credentials the service runs
        // with the integration disabled rather than failing at startup.
        let calendar: Option<Arc<dyn CalendarSync>> = match GoogleCalendarClient::new(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(_) => {
                warn!("Calendar sync not configured; consultations will not be synced");
                None
            }
        };

        Self::with_collaborators(
            supabase.clone(),
            config,
            calendar,
            Arc::new(SupabaseNotifier::with_client(supabase)),
        )
    }

    pub fn with_collaborators(
        supabase: Arc<SupabaseClient>,
        config: &AppConfig,
        calendar: Option<Arc<dyn CalendarSync>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store: ConsultationStore::new(Arc::clone(&supabase)),
            lifecycle: ConsultationLifecycle::new(),
            profiles: ProfessorProfileService::with_client(Arc::clone(&supabase), config),
            ratings: RatingAggregator::with_client(supabase, config),
            calendar,
            notifier,
            default_notice_hours: config.default_cancellation_notice_hours,
        }
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        self.store.get(consultation_id, auth_token).await
    }

    pub async fn search(
        &self,
        query: &ConsultationSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        self.store.search(query, auth_token).await
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn book(
        &self,
        student_id: Uuid,
        request: BookConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        if request.title.trim().is_empty() {
            return Err(ConsultationError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        let profile = self
            .profiles
            .get_profile(request.professor_id, auth_token)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let duration_minutes = request.duration_minutes.unwrap_or_else(|| {
            profile
                .as_ref()
                .map(|p| p.consultation_duration_default)
                .unwrap_or(30)
        });
        self.lifecycle.validate_duration(duration_minutes)?;

        let now = Utc::now();
        let mut consultation = Consultation {
            id: Uuid::new_v4(),
            student_id,
            professor_id: request.professor_id,
            title: request.title,
            description: request.description,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            duration_minutes,
            status: ConsultationStatus::Pending,
            confirmed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            calendar_event_id: None,
            meeting_link: request.meeting_link,
            location: request.location,
            notes: None,
            rating: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        };

        let scheduled = consultation.scheduled_datetime();
        if scheduled <= now {
            return Err(ConsultationError::ValidationError(
                "Consultations must be scheduled in the future".to_string(),
            ));
        }

        if let Some(profile) = &profile {
            let horizon = now + Duration::days(i64::from(profile.max_advance_booking_days));
            if scheduled > horizon {
                return Err(ConsultationError::ValidationError(format!(
                    "Consultations can be booked at most {} days in advance",
                    profile.max_advance_booking_days
                )));
            }
        }

        consultation = self.store.create(&consultation, auth_token).await?;
        info!(
            "Booked consultation {} (student {} -> professor {})",
            consultation.id, consultation.student_id, consultation.professor_id
        );

        self.dispatch_notification(
            NotificationKind::Booked,
            consultation.id,
            json!({ "professor_id": consultation.professor_id }),
        );

        Ok(consultation)
    }

    // ==========================================================================
    // LIFECYCLE TRANSITIONS
    // ==========================================================================

    pub async fn confirm(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let now = Utc::now();
        let next = self.lifecycle.confirm(&current, now)?;

        let patch = json!({
            "status": next.status,
            "confirmed_at": next.confirmed_at,
        });
        let confirmed = self
            .apply_guarded(consultation_id, ConsultationStatus::Pending, patch, None, "confirm", auth_token)
            .await?;

        // Calendar sync after the fact; a failed sync never unwinds the
        // confirmation, it just leaves calendar_event_id empty.
        let event_id = self.sync_calendar_create(&confirmed, auth_token).await;

        self.dispatch_notification(
            NotificationKind::Confirmed,
            confirmed.id,
            json!({ "scheduled_date": confirmed.scheduled_date }),
        );

        Ok(Consultation {
            calendar_event_id: event_id.or(confirmed.calendar_event_id.clone()),
            ..confirmed
        })
    }

    pub async fn cancel(
        &self,
        consultation_id: &Uuid,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let now = Utc::now();
        let policy = self.policy_for(&current.professor_id, auth_token).await?;
        let next = self.lifecycle.cancel(&current, reason, now, &policy)?;

        let patch = json!({
            "status": next.status,
            "cancelled_at": next.cancelled_at,
            "cancellation_reason": next.cancellation_reason,
        });
        let cancelled = self
            .apply_guarded(consultation_id, current.status, patch, None, "cancel", auth_token)
            .await?;

        self.sync_calendar_delete(&cancelled, auth_token).await;

        self.dispatch_notification(
            NotificationKind::Cancelled,
            cancelled.id,
            json!({ "reason": cancelled.cancellation_reason }),
        );

        Ok(cancelled)
    }

    pub async fn complete(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let next = self.lifecycle.complete(&current)?;

        let patch = json!({ "status": next.status });
        self.apply_guarded(
            consultation_id,
            ConsultationStatus::Confirmed,
            patch,
            None,
            "complete",
            auth_token,
        )
        .await
    }

    pub async fn mark_no_show(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let next = self.lifecycle.mark_no_show(&current)?;

        let patch = json!({ "status": next.status });
        self.apply_guarded(
            consultation_id,
            ConsultationStatus::Confirmed,
            patch,
            None,
            "mark as no-show",
            auth_token,
        )
        .await
    }

    pub async fn propose_reschedule(
        &self,
        consultation_id: &Uuid,
        request: ProposeRescheduleRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let now = Utc::now();
        let policy = self.policy_for(&current.professor_id, auth_token).await?;
        let next = self.lifecycle.propose_reschedule(
            &current,
            request.new_date,
            request.new_time,
            now,
            &policy,
        )?;

        let patch = json!({
            "status": next.status,
            "scheduled_date": next.scheduled_date,
            "scheduled_time": next.scheduled_time,
        });
        let proposed = self
            .apply_guarded(
                consultation_id,
                ConsultationStatus::Confirmed,
                patch,
                None,
                "propose reschedule for",
                auth_token,
            )
            .await?;

        self.dispatch_notification(
            NotificationKind::RescheduleProposed,
            proposed.id,
            json!({
                "new_date": proposed.scheduled_date,
                "new_time": proposed.scheduled_time,
            }),
        );

        Ok(proposed)
    }

    pub async fn accept_reschedule(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let now = Utc::now();
        let next = self.lifecycle.accept_reschedule(&current, now)?;

        let patch = json!({
            "status": next.status,
            "confirmed_at": next.confirmed_at,
        });
        let accepted = self
            .apply_guarded(
                consultation_id,
                ConsultationStatus::RescheduleProposed,
                patch,
                None,
                "accept reschedule for",
                auth_token,
            )
            .await?;

        // The event already exists from the original confirmation; move it,
        // or create one if the original sync never landed.
        let event_id = self.sync_calendar_upsert(&accepted, auth_token).await;

        self.dispatch_notification(
            NotificationKind::RescheduleAccepted,
            accepted.id,
            json!({ "scheduled_date": accepted.scheduled_date }),
        );

        Ok(Consultation {
            calendar_event_id: event_id.or(accepted.calendar_event_id.clone()),
            ..accepted
        })
    }

    pub async fn reject_reschedule(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let now = Utc::now();
        let next = self.lifecycle.reject_reschedule(&current, now)?;

        let patch = json!({
            "status": next.status,
            "cancelled_at": next.cancelled_at,
            "cancellation_reason": next.cancellation_reason,
        });
        let rejected = self
            .apply_guarded(
                consultation_id,
                ConsultationStatus::RescheduleProposed,
                patch,
                None,
                "reject reschedule for",
                auth_token,
            )
            .await?;

        self.sync_calendar_delete(&rejected, auth_token).await;

        self.dispatch_notification(
            NotificationKind::Cancelled,
            rejected.id,
            json!({ "reason": rejected.cancellation_reason }),
        );

        Ok(rejected)
    }

    pub async fn rate(
        &self,
        consultation_id: &Uuid,
        rating: i32,
        feedback: Option<String>,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let next = self.lifecycle.rate(&current, rating, feedback)?;

        // The extra filter makes the write race-safe against a concurrent
        // rating: only an unrated row matches.
        let patch = json!({
            "rating": next.rating,
            "feedback": next.feedback,
        });
        let rated = match self
            .store
            .update_guarded(
                consultation_id,
                ConsultationStatus::Completed,
                patch,
                Some("rating=is.null"),
                auth_token,
            )
            .await?
        {
            Some(consultation) => consultation,
            None => {
                return Err(ConsultationError::InvalidState(
                    "Consultation has already been rated".to_string(),
                ));
            }
        };

        // The cached aggregate must reflect this rating before we return.
        self.ratings
            .recalculate(rated.professor_id, auth_token)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        Ok(rated)
    }

    /// Admin removal. If the consultation carried a rating the professor's
    /// aggregate is recomputed so it never counts a deleted consultation.
    pub async fn delete(
        &self,
        consultation_id: &Uuid,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;

        self.store.delete(consultation_id, auth_token).await?;
        info!("Deleted consultation {}", consultation_id);

        self.sync_calendar_delete(&current, auth_token).await;

        if current.rating.is_some() {
            self.ratings
                .recalculate(current.professor_id, auth_token)
                .await
                .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;
        }

        Ok(())
    }

    /// Applies an approved reschedule request on behalf of the workflow
    /// service: schedule replaced, status `rescheduled`, calendar moved.
    pub async fn apply_approved_reschedule(
        &self,
        consultation_id: &Uuid,
        new_date: chrono::NaiveDate,
        new_time: chrono::NaiveTime,
        new_duration: Option<i32>,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let current = self.store.get(consultation_id, auth_token).await?;
        let next =
            self.lifecycle
                .apply_approved_reschedule(&current, new_date, new_time, new_duration)?;

        let patch = json!({
            "status": next.status,
            "scheduled_date": next.scheduled_date,
            "scheduled_time": next.scheduled_time,
            "duration_minutes": next.duration_minutes,
        });
        let rescheduled = self
            .apply_guarded(consultation_id, current.status, patch, None, "reschedule", auth_token)
            .await?;

        let event_id = self.sync_calendar_upsert(&rescheduled, auth_token).await;

        self.dispatch_notification(
            NotificationKind::RescheduleAccepted,
            rescheduled.id,
            json!({
                "new_date": rescheduled.scheduled_date,
                "new_time": rescheduled.scheduled_time,
            }),
        );

        Ok(Consultation {
            calendar_event_id: event_id.or(rescheduled.calendar_event_id.clone()),
            ..rescheduled
        })
    }

    /// Resolves the cancellation policy for a professor: their configured
    /// notice hours, or the system default when no profile row exists.
    pub async fn policy_for(
        &self,
        professor_id: &Uuid,
        auth_token: &str,
    ) -> Result<CancellationPolicy, ConsultationError> {
        let profile = self
            .profiles
            .get_profile(*professor_id, auth_token)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        let notice_hours = profile
            .map(|p| p.cancellation_notice_hours)
            .unwrap_or(self.default_notice_hours);

        Ok(CancellationPolicy::new(notice_hours))
    }

    // ==========================================================================
    // INTERNALS
    // ==========================================================================

    /// Persist a validated transition through a compare-and-swap PATCH. A
    /// miss means a concurrent writer changed the row since we read it; the
    /// caller's transition is re-judged against the fresh status.
    async fn apply_guarded(
        &self,
        consultation_id: &Uuid,
        expected_status: ConsultationStatus,
        patch: Value,
        extra_filter: Option<&str>,
        action: &'static str,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        match self
            .store
            .update_guarded(consultation_id, expected_status, patch, extra_filter, auth_token)
            .await?
        {
            Some(consultation) => Ok(consultation),
            None => {
                let fresh = self.store.get(consultation_id, auth_token).await?;
                Err(ConsultationError::InvalidTransition {
                    action,
                    status: fresh.status,
                })
            }
        }
    }

    fn calendar_event(consultation: &Consultation) -> CalendarEvent {
        CalendarEvent {
            summary: consultation.title.clone(),
            description: consultation.description.clone(),
            start: consultation.scheduled_datetime(),
            end: consultation.scheduled_end_datetime(),
            location: consultation.location.clone(),
        }
    }

    async fn sync_calendar_create(
        &self,
        consultation: &Consultation,
        auth_token: &str,
    ) -> Option<String> {
        let calendar = self.calendar.as_ref()?;

        match calendar.create_event(&Self::calendar_event(consultation)).await {
            Ok(event_id) => {
                if let Err(e) = self
                    .store
                    .set_calendar_event(&consultation.id, Some(&event_id), auth_token)
                    .await
                {
                    error!(
                        "Failed to persist calendar event id for consultation {}: {}",
                        consultation.id, e
                    );
                }
                Some(event_id)
            }
            Err(e) => {
                error!(
                    "Calendar sync failed for consultation {}: {}",
                    consultation.id, e
                );
                None
            }
        }
    }

    async fn sync_calendar_upsert(
        &self,
        consultation: &Consultation,
        auth_token: &str,
    ) -> Option<String> {
        let calendar = self.calendar.as_ref()?;

        match &consultation.calendar_event_id {
            Some(event_id) => {
                match calendar
                    .update_event(event_id, &Self::calendar_event(consultation))
                    .await
                {
                    Ok(event_id) => Some(event_id),
                    Err(e) => {
                        error!(
                            "Calendar update failed for consultation {}: {}",
                            consultation.id, e
                        );
                        None
                    }
                }
            }
            None => self.sync_calendar_create(consultation, auth_token).await,
        }
    }

    async fn sync_calendar_delete(&self, consultation: &Consultation, auth_token: &str) {
        let Some(calendar) = self.calendar.as_ref() else {
            return;
        };
        let Some(event_id) = &consultation.calendar_event_id else {
            return;
        };

        match calendar.delete_event(event_id).await {
            Ok(()) => {
                if let Err(e) = self
                    .store
                    .set_calendar_event(&consultation.id, None, auth_token)
                    .await
                {
                    error!(
                        "Failed to clear calendar event id for consultation {}: {}",
                        consultation.id, e
                    );
                }
            }
            Err(e) => {
                error!(
                    "Calendar delete failed for consultation {}: {}",
                    consultation.id, e
                );
            }
        }
    }

    /// Queue a notification without blocking the request. Failures are
    /// logged; a lost notification never affects the booking outcome.
    fn dispatch_notification(&self, kind: NotificationKind, consultation_id: Uuid, extra: Value) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            debug!("Dispatching {} notification for {}", kind, consultation_id);
            if let Err(e) = notifier.notify(kind, consultation_id, extra).await {
                warn!(
                    "Failed to queue {} notification for consultation {}: {}",
                    kind, consultation_id, e
                );
            }
        });
    }
}
