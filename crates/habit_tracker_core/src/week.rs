//! crates/habit_tracker_core/src/week.rs
//!
//! The period window calculator: pure date math, no side effects.
//!
//! Two window shapes exist on purpose. Creation anchors to Monday-aligned
//! calendar weeks; rollover anchors to the reset date itself, producing
//! rolling 7-day spans that drift away from calendar weeks over successive
//! rollovers. This asymmetry matches observed product behavior and must not
//! be "fixed" without product sign-off.

use chrono::{Datelike, Duration, NaiveDate};

/// The Monday-aligned week containing `today`: `[Monday, Sunday]`, both
/// bounds inclusive.
pub fn current_week_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

/// A rolling 7-day window starting at `anchor`: `[anchor, anchor + 6]`.
/// Used only by rollover; the anchor is whatever day the reset ran on.
pub fn rolling_window_from(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    (anchor, anchor + Duration::days(6))
}
