//! crates/habit_tracker_core/src/clock.rs
//!
//! Time collaborators for the lifecycle engine. "Today" is always derived
//! from an injected clock plus a fixed-offset timezone policy, never from
//! ambient `Utc::now()` inside the rules, so tests can pin the calendar.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Decides which local calendar day a UTC instant falls on.
///
/// Day boundaries sit at local midnight in one fixed offset for the whole
/// deployment (default +9h), so "today" is stable for users in that zone.
#[derive(Debug, Clone, Copy)]
pub struct TimeZonePolicy {
    offset: FixedOffset,
}

impl TimeZonePolicy {
    /// Builds a policy from a whole-hour UTC offset. Offsets outside
    /// [-23, 23] are rejected.
    pub fn from_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(|offset| Self { offset })
    }

    /// The local calendar day containing `now`.
    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

impl Default for TimeZonePolicy {
    fn default() -> Self {
        // UTC+9, the deployment's home zone.
        Self {
            offset: FixedOffset::east_opt(9 * 3600).expect("+9h is a valid offset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn local_today_crosses_the_date_line() {
        let policy = TimeZonePolicy::default();
        // 2024-03-06 16:00 UTC is already 2024-03-07 01:00 at +9h.
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 16, 0, 0).unwrap();
        assert_eq!(
            policy.local_today(now),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
        );
        // 14:59 UTC is still the 6th locally.
        let earlier = Utc.with_ymd_and_hms(2024, 3, 6, 14, 59, 0).unwrap();
        assert_eq!(
            policy.local_today(earlier),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
        );
    }

    #[test]
    fn offset_hours_are_validated() {
        assert!(TimeZonePolicy::from_offset_hours(-5).is_some());
        assert!(TimeZonePolicy::from_offset_hours(24).is_none());
    }
}
