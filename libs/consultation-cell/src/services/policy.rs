// libs/consultation-cell/src/services/policy.rs
use chrono::{DateTime, Duration, Utc};

/// Deadline policy for cancelling or rescheduling a consultation. Pure
/// calculation over the scheduled instant and the professor's required
/// notice; "now" is always passed in so callers (and tests) control time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationPolicy {
    notice_hours: i64,
}

impl CancellationPolicy {
    pub fn new(notice_hours: i64) -> Self {
        // Notice hours are validated non-negative at the profile boundary;
        // clamp anyway so a bad row cannot invert the deadline.
        Self {
            notice_hours: notice_hours.max(0),
        }
    }

    pub fn notice_hours(&self) -> i64 {
        self.notice_hours
    }

    /// The last instant at which action is still permitted (exclusive).
    pub fn deadline(&self, scheduled: DateTime<Utc>) -> DateTime<Utc> {
        scheduled - Duration::hours(self.notice_hours)
    }

    /// Strictly before the deadline. With zero notice hours this permits
    /// action up to, but excluding, the scheduled instant itself.
    pub fn can_act(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now < self.deadline(scheduled)
    }

    pub fn hours_until_deadline(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let remaining = self.deadline(scheduled) - now;
        let seconds = remaining.num_seconds();
        if seconds <= 0 {
            return 0.0;
        }
        (seconds as f64 / 3600.0 * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_is_scheduled_minus_notice() {
        let policy = CancellationPolicy::new(4);
        let scheduled = Utc::now() + Duration::hours(24);

        assert_eq!(policy.deadline(scheduled), scheduled - Duration::hours(4));
    }

    #[test]
    fn test_boundary_is_not_cancellable() {
        // H hours ahead with N notice hours: cancellable iff H > N, strictly.
        let policy = CancellationPolicy::new(4);
        let now = Utc::now();

        let at_boundary = now + Duration::hours(4);
        assert!(!policy.can_act(at_boundary, now));

        let just_after_boundary = now + Duration::hours(4) + Duration::seconds(1);
        assert!(policy.can_act(just_after_boundary, now));
    }

    #[test]
    fn test_zero_notice_allows_until_scheduled_instant() {
        let policy = CancellationPolicy::new(0);
        let now = Utc::now();

        assert!(policy.can_act(now + Duration::seconds(1), now));
        // The scheduled instant itself is excluded.
        assert!(!policy.can_act(now, now));
        assert!(!policy.can_act(now - Duration::seconds(1), now));
    }

    #[test]
    fn test_24h_ahead_with_4h_notice_is_cancellable() {
        let policy = CancellationPolicy::new(4);
        let now = Utc::now();

        assert!(policy.can_act(now + Duration::hours(24), now));
    }

    #[test]
    fn test_2h_ahead_with_4h_notice_is_not_cancellable() {
        let policy = CancellationPolicy::new(4);
        let now = Utc::now();

        assert!(!policy.can_act(now + Duration::hours(2), now));
    }

    #[test]
    fn test_hours_until_deadline_never_negative() {
        let policy = CancellationPolicy::new(4);
        let now = Utc::now();

        assert_eq!(policy.hours_until_deadline(now + Duration::hours(2), now), 0.0);
        assert_eq!(policy.hours_until_deadline(now + Duration::hours(28), now), 24.0);
    }

    #[test]
    fn test_negative_notice_hours_clamped() {
        let policy = CancellationPolicy::new(-3);
        assert_eq!(policy.notice_hours(), 0);
    }
}
