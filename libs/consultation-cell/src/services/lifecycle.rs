// libs/consultation-cell/src/services/lifecycle.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::models::{Consultation, ConsultationError, ConsultationStatus, ConsultationValidationRules};
use crate::services::policy::CancellationPolicy;

/// The consultation state machine. Every transition is a pure function from
/// a consultation to a new consultation value: the input is never mutated,
/// so a failed transition cannot leave partial state behind. Persistence of
/// the returned value is the service layer's job.
///
/// Authorization preconditions (enforced by the HTTP handlers, not here):
/// `confirm`, `complete`, `mark_no_show` and `propose_reschedule` require the
/// caller to be the consultation's professor; `accept_reschedule`,
/// `reject_reschedule` and `rate` require the student; `cancel` permits
/// either party.
pub struct ConsultationLifecycle {
    validation_rules: ConsultationValidationRules,
}

impl Default for ConsultationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsultationLifecycle {
    pub fn new() -> Self {
        Self {
            validation_rules: ConsultationValidationRules::default(),
        }
    }

    /// All statuses reachable from the given one.
    pub fn valid_transitions(&self, status: &ConsultationStatus) -> Vec<ConsultationStatus> {
        match status {
            ConsultationStatus::Pending => vec![
                ConsultationStatus::Confirmed,
                ConsultationStatus::Cancelled,
                ConsultationStatus::Rescheduled,
            ],
            ConsultationStatus::Confirmed => vec![
                ConsultationStatus::Completed,
                ConsultationStatus::Cancelled,
                ConsultationStatus::NoShow,
                ConsultationStatus::RescheduleProposed,
                ConsultationStatus::Rescheduled,
            ],
            ConsultationStatus::RescheduleProposed => vec![
                ConsultationStatus::Confirmed,
                ConsultationStatus::Cancelled,
                ConsultationStatus::Rescheduled,
            ],
            ConsultationStatus::Rescheduled => vec![
                ConsultationStatus::Confirmed,
                ConsultationStatus::Cancelled,
            ],
            // Terminal states
            ConsultationStatus::Cancelled
            | ConsultationStatus::Completed
            | ConsultationStatus::NoShow => vec![],
        }
    }

    /// pending -> confirmed. Professor action.
    pub fn confirm(
        &self,
        consultation: &Consultation,
        now: DateTime<Utc>,
    ) -> Result<Consultation, ConsultationError> {
        debug!("Confirming consultation {}", consultation.id);

        if consultation.status != ConsultationStatus::Pending {
            warn!(
                "Invalid confirm attempted on consultation {} in status {}",
                consultation.id, consultation.status
            );
            return Err(ConsultationError::InvalidTransition {
                action: "confirm",
                status: consultation.status,
            });
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::Confirmed;
        updated.confirmed_at = Some(now);
        Ok(updated)
    }

    /// pending|confirmed -> cancelled. Either party. A pending consultation
    /// can always be cancelled; a confirmed one only before the deadline.
    pub fn cancel(
        &self,
        consultation: &Consultation,
        reason: Option<String>,
        now: DateTime<Utc>,
        policy: &CancellationPolicy,
    ) -> Result<Consultation, ConsultationError> {
        debug!("Cancelling consultation {}", consultation.id);

        match consultation.status {
            ConsultationStatus::Pending => {}
            ConsultationStatus::Confirmed => {
                if !policy.can_act(consultation.scheduled_datetime(), now) {
                    warn!(
                        "Cancellation deadline passed for consultation {} (notice: {}h)",
                        consultation.id,
                        policy.notice_hours()
                    );
                    return Err(ConsultationError::PolicyViolation(format!(
                        "Cancellation requires at least {} hours notice",
                        policy.notice_hours()
                    )));
                }
            }
            status => {
                return Err(ConsultationError::InvalidTransition {
                    action: "cancel",
                    status,
                });
            }
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::Cancelled;
        updated.cancelled_at = Some(now);
        if reason.is_some() {
            updated.cancellation_reason = reason;
        }
        Ok(updated)
    }

    /// confirmed -> completed. Professor action.
    pub fn complete(&self, consultation: &Consultation) -> Result<Consultation, ConsultationError> {
        if consultation.status != ConsultationStatus::Confirmed {
            return Err(ConsultationError::InvalidTransition {
                action: "complete",
                status: consultation.status,
            });
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::Completed;
        Ok(updated)
    }

    /// confirmed -> no_show. Professor action.
    pub fn mark_no_show(
        &self,
        consultation: &Consultation,
    ) -> Result<Consultation, ConsultationError> {
        if consultation.status != ConsultationStatus::Confirmed {
            return Err(ConsultationError::InvalidTransition {
                action: "mark as no-show",
                status: consultation.status,
            });
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::NoShow;
        Ok(updated)
    }

    /// confirmed -> reschedule_proposed. Professor action, same deadline
    /// guard as cancellation. The proposed date/time replace the schedule;
    /// the student decides whether they stand.
    pub fn propose_reschedule(
        &self,
        consultation: &Consultation,
        new_date: Option<NaiveDate>,
        new_time: Option<NaiveTime>,
        now: DateTime<Utc>,
        policy: &CancellationPolicy,
    ) -> Result<Consultation, ConsultationError> {
        if consultation.status != ConsultationStatus::Confirmed {
            return Err(ConsultationError::InvalidTransition {
                action: "propose reschedule for",
                status: consultation.status,
            });
        }

        if !policy.can_act(consultation.scheduled_datetime(), now) {
            return Err(ConsultationError::PolicyViolation(format!(
                "Rescheduling requires at least {} hours notice",
                policy.notice_hours()
            )));
        }

        if new_date.is_none() && new_time.is_none() {
            return Err(ConsultationError::ValidationError(
                "A reschedule proposal needs a new date or time".to_string(),
            ));
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::RescheduleProposed;
        if let Some(date) = new_date {
            updated.scheduled_date = date;
        }
        if let Some(time) = new_time {
            updated.scheduled_time = time;
        }
        Ok(updated)
    }

    /// reschedule_proposed -> confirmed. Student action.
    pub fn accept_reschedule(
        &self,
        consultation: &Consultation,
        now: DateTime<Utc>,
    ) -> Result<Consultation, ConsultationError> {
        if consultation.status != ConsultationStatus::RescheduleProposed {
            return Err(ConsultationError::InvalidTransition {
                action: "accept reschedule for",
                status: consultation.status,
            });
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::Confirmed;
        updated.confirmed_at = Some(now);
        Ok(updated)
    }

    /// reschedule_proposed -> cancelled. Student action; no deadline guard,
    /// declining a proposal is always allowed.
    pub fn reject_reschedule(
        &self,
        consultation: &Consultation,
        now: DateTime<Utc>,
    ) -> Result<Consultation, ConsultationError> {
        if consultation.status != ConsultationStatus::RescheduleProposed {
            return Err(ConsultationError::InvalidTransition {
                action: "reject reschedule for",
                status: consultation.status,
            });
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::Cancelled;
        updated.cancelled_at = Some(now);
        updated.cancellation_reason = Some("Student rejected reschedule proposal".to_string());
        Ok(updated)
    }

    /// completed -> completed (sets rating/feedback). Student action; a
    /// rating can be set exactly once.
    pub fn rate(
        &self,
        consultation: &Consultation,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Consultation, ConsultationError> {
        if consultation.status != ConsultationStatus::Completed {
            return Err(ConsultationError::InvalidTransition {
                action: "rate",
                status: consultation.status,
            });
        }

        if consultation.rating.is_some() {
            return Err(ConsultationError::InvalidState(
                "Consultation has already been rated".to_string(),
            ));
        }

        if rating < self.validation_rules.min_rating || rating > self.validation_rules.max_rating {
            return Err(ConsultationError::ValidationError(format!(
                "Rating must be between {} and {}",
                self.validation_rules.min_rating, self.validation_rules.max_rating
            )));
        }

        let mut updated = consultation.clone();
        updated.rating = Some(rating);
        updated.feedback = feedback;
        Ok(updated)
    }

    /// Applies an approved reschedule request: new schedule, status
    /// `rescheduled`. Legal from any non-terminal status.
    pub fn apply_approved_reschedule(
        &self,
        consultation: &Consultation,
        new_date: NaiveDate,
        new_time: NaiveTime,
        new_duration: Option<i32>,
    ) -> Result<Consultation, ConsultationError> {
        if consultation.status.is_terminal() {
            return Err(ConsultationError::InvalidTransition {
                action: "reschedule",
                status: consultation.status,
            });
        }

        if let Some(duration) = new_duration {
            self.validate_duration(duration)?;
        }

        let mut updated = consultation.clone();
        updated.status = ConsultationStatus::Rescheduled;
        updated.scheduled_date = new_date;
        updated.scheduled_time = new_time;
        if let Some(duration) = new_duration {
            updated.duration_minutes = duration;
        }
        Ok(updated)
    }

    pub fn validate_duration(&self, duration_minutes: i32) -> Result<(), ConsultationError> {
        if duration_minutes < self.validation_rules.min_duration_minutes
            || duration_minutes > self.validation_rules.max_duration_minutes
        {
            return Err(ConsultationError::ValidationError(format!(
                "Duration must be between {} and {} minutes",
                self.validation_rules.min_duration_minutes,
                self.validation_rules.max_duration_minutes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use uuid::Uuid;

    fn consultation_in(status: ConsultationStatus, hours_ahead: i64) -> Consultation {
        let scheduled = Utc::now() + Duration::hours(hours_ahead);
        let now = Utc::now();
        Consultation {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            professor_id: Uuid::new_v4(),
            title: "Thesis supervision".to_string(),
            description: "Discuss chapter 2 draft".to_string(),
            scheduled_date: scheduled.date_naive(),
            scheduled_time: scheduled.time(),
            duration_minutes: 30,
            status,
            confirmed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            calendar_event_id: None,
            meeting_link: None,
            location: None,
            notes: None,
            rating: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_confirm_from_pending_sets_confirmed_at() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::Pending, 24);
        let now = Utc::now();

        let updated = lifecycle.confirm(&consultation, now).unwrap();

        assert_eq!(updated.status, ConsultationStatus::Confirmed);
        assert_eq!(updated.confirmed_at, Some(now));
    }

    #[test]
    fn test_confirm_from_non_pending_fails_without_mutation() {
        let lifecycle = ConsultationLifecycle::new();
        let now = Utc::now();

        for status in [
            ConsultationStatus::Confirmed,
            ConsultationStatus::Cancelled,
            ConsultationStatus::Completed,
            ConsultationStatus::NoShow,
            ConsultationStatus::RescheduleProposed,
        ] {
            let consultation = consultation_in(status, 24);
            let result = lifecycle.confirm(&consultation, now);

            assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
            // The input is untouched by a failed transition.
            assert_eq!(consultation.status, status);
            assert_eq!(consultation.confirmed_at, None);
        }
    }

    #[test]
    fn test_cancel_pending_ignores_deadline() {
        let lifecycle = ConsultationLifecycle::new();
        // 1 hour ahead with a 4 hour notice requirement.
        let consultation = consultation_in(ConsultationStatus::Pending, 1);
        let now = Utc::now();

        let updated = lifecycle
            .cancel(&consultation, Some("clash".to_string()), now, &CancellationPolicy::new(4))
            .unwrap();

        assert_eq!(updated.status, ConsultationStatus::Cancelled);
        assert_eq!(updated.cancelled_at, Some(now));
        assert_eq!(updated.cancellation_reason.as_deref(), Some("clash"));
    }

    #[test]
    fn test_cancel_confirmed_respects_deadline() {
        let lifecycle = ConsultationLifecycle::new();
        let policy = CancellationPolicy::new(4);
        let now = Utc::now();

        let within_deadline = consultation_in(ConsultationStatus::Confirmed, 24);
        assert!(lifecycle.cancel(&within_deadline, None, now, &policy).is_ok());

        let past_deadline = consultation_in(ConsultationStatus::Confirmed, 2);
        let result = lifecycle.cancel(&past_deadline, None, now, &policy);
        assert_matches!(result, Err(ConsultationError::PolicyViolation(_)));
        assert_eq!(past_deadline.status, ConsultationStatus::Confirmed);
    }

    #[test]
    fn test_cancel_from_terminal_state_is_invalid() {
        let lifecycle = ConsultationLifecycle::new();
        let now = Utc::now();
        let policy = CancellationPolicy::new(0);

        for status in [
            ConsultationStatus::Cancelled,
            ConsultationStatus::Completed,
            ConsultationStatus::NoShow,
        ] {
            let consultation = consultation_in(status, 24);
            let result = lifecycle.cancel(&consultation, None, now, &policy);
            assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn test_complete_and_no_show_require_confirmed() {
        let lifecycle = ConsultationLifecycle::new();

        let confirmed = consultation_in(ConsultationStatus::Confirmed, -1);
        assert_eq!(
            lifecycle.complete(&confirmed).unwrap().status,
            ConsultationStatus::Completed
        );
        assert_eq!(
            lifecycle.mark_no_show(&confirmed).unwrap().status,
            ConsultationStatus::NoShow
        );

        let pending = consultation_in(ConsultationStatus::Pending, -1);
        assert_matches!(
            lifecycle.complete(&pending),
            Err(ConsultationError::InvalidTransition { .. })
        );
        assert_matches!(
            lifecycle.mark_no_show(&pending),
            Err(ConsultationError::InvalidTransition { .. })
        );
    }

    #[test]
    fn test_propose_reschedule_updates_schedule() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::Confirmed, 48);
        let now = Utc::now();
        let policy = CancellationPolicy::new(4);

        let new_date = (Utc::now() + Duration::days(5)).date_naive();
        let new_time = NaiveTime::from_hms_opt(15, 30, 0).unwrap();

        let updated = lifecycle
            .propose_reschedule(&consultation, Some(new_date), Some(new_time), now, &policy)
            .unwrap();

        assert_eq!(updated.status, ConsultationStatus::RescheduleProposed);
        assert_eq!(updated.scheduled_date, new_date);
        assert_eq!(updated.scheduled_time, new_time);
    }

    #[test]
    fn test_propose_reschedule_past_deadline_fails() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::Confirmed, 2);
        let now = Utc::now();
        let policy = CancellationPolicy::new(4);

        let result = lifecycle.propose_reschedule(
            &consultation,
            Some((Utc::now() + Duration::days(5)).date_naive()),
            None,
            now,
            &policy,
        );

        assert_matches!(result, Err(ConsultationError::PolicyViolation(_)));
    }

    #[test]
    fn test_propose_reschedule_without_changes_fails() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::Confirmed, 48);

        let result = lifecycle.propose_reschedule(
            &consultation,
            None,
            None,
            Utc::now(),
            &CancellationPolicy::new(4),
        );

        assert_matches!(result, Err(ConsultationError::ValidationError(_)));
    }

    #[test]
    fn test_accept_reschedule_reconfirms() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::RescheduleProposed, 48);
        let now = Utc::now();

        let updated = lifecycle.accept_reschedule(&consultation, now).unwrap();

        assert_eq!(updated.status, ConsultationStatus::Confirmed);
        assert_eq!(updated.confirmed_at, Some(now));
    }

    #[test]
    fn test_reject_reschedule_cancels_with_reason() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::RescheduleProposed, 48);
        let now = Utc::now();

        let updated = lifecycle.reject_reschedule(&consultation, now).unwrap();

        assert_eq!(updated.status, ConsultationStatus::Cancelled);
        assert_eq!(updated.cancelled_at, Some(now));
        assert_eq!(
            updated.cancellation_reason.as_deref(),
            Some("Student rejected reschedule proposal")
        );
    }

    #[test]
    fn test_reschedule_decisions_require_proposal() {
        let lifecycle = ConsultationLifecycle::new();
        let now = Utc::now();
        let confirmed = consultation_in(ConsultationStatus::Confirmed, 48);

        assert_matches!(
            lifecycle.accept_reschedule(&confirmed, now),
            Err(ConsultationError::InvalidTransition { .. })
        );
        assert_matches!(
            lifecycle.reject_reschedule(&confirmed, now),
            Err(ConsultationError::InvalidTransition { .. })
        );
    }

    #[test]
    fn test_rate_only_when_completed() {
        let lifecycle = ConsultationLifecycle::new();

        let completed = consultation_in(ConsultationStatus::Completed, -24);
        let rated = lifecycle.rate(&completed, 5, Some("Very helpful".to_string())).unwrap();
        assert_eq!(rated.rating, Some(5));
        assert_eq!(rated.status, ConsultationStatus::Completed);

        for status in [
            ConsultationStatus::Pending,
            ConsultationStatus::Confirmed,
            ConsultationStatus::Cancelled,
            ConsultationStatus::NoShow,
        ] {
            let consultation = consultation_in(status, -24);
            assert_matches!(
                lifecycle.rate(&consultation, 5, None),
                Err(ConsultationError::InvalidTransition { .. })
            );
        }
    }

    #[test]
    fn test_rate_is_settable_once() {
        let lifecycle = ConsultationLifecycle::new();
        let mut consultation = consultation_in(ConsultationStatus::Completed, -24);
        consultation.rating = Some(4);

        assert_matches!(
            lifecycle.rate(&consultation, 5, None),
            Err(ConsultationError::InvalidState(_))
        );
    }

    #[test]
    fn test_rate_bounds() {
        let lifecycle = ConsultationLifecycle::new();
        let consultation = consultation_in(ConsultationStatus::Completed, -24);

        assert_matches!(
            lifecycle.rate(&consultation, 0, None),
            Err(ConsultationError::ValidationError(_))
        );
        assert_matches!(
            lifecycle.rate(&consultation, 6, None),
            Err(ConsultationError::ValidationError(_))
        );
        assert!(lifecycle.rate(&consultation, 1, None).is_ok());
        assert!(lifecycle.rate(&consultation, 5, None).is_ok());
    }

    #[test]
    fn test_apply_approved_reschedule_from_terminal_fails() {
        let lifecycle = ConsultationLifecycle::new();
        let new_date = (Utc::now() + Duration::days(3)).date_naive();
        let new_time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        for status in [
            ConsultationStatus::Cancelled,
            ConsultationStatus::Completed,
            ConsultationStatus::NoShow,
        ] {
            let consultation = consultation_in(status, 24);
            assert_matches!(
                lifecycle.apply_approved_reschedule(&consultation, new_date, new_time, None),
                Err(ConsultationError::InvalidTransition { .. })
            );
        }

        let confirmed = consultation_in(ConsultationStatus::Confirmed, 24);
        let updated = lifecycle
            .apply_approved_reschedule(&confirmed, new_date, new_time, Some(60))
            .unwrap();
        assert_eq!(updated.status, ConsultationStatus::Rescheduled);
        assert_eq!(updated.duration_minutes, 60);
    }

    #[test]
    fn test_duration_bounds() {
        let lifecycle = ConsultationLifecycle::new();

        assert!(lifecycle.validate_duration(14).is_err());
        assert!(lifecycle.validate_duration(241).is_err());
        assert!(lifecycle.validate_duration(15).is_ok());
        assert!(lifecycle.validate_duration(240).is_ok());
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        let lifecycle = ConsultationLifecycle::new();

        assert!(lifecycle.valid_transitions(&ConsultationStatus::Cancelled).is_empty());
        assert!(lifecycle.valid_transitions(&ConsultationStatus::Completed).is_empty());
        assert!(lifecycle.valid_transitions(&ConsultationStatus::NoShow).is_empty());
    }
}
