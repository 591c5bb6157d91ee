//! crates/habit_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Number of day slots in a checklist window.
pub const DAYS_PER_WEEK: usize = 7;

/// Minimum number of checked days required before a checklist item
/// may be promoted into the core habit list.
pub const PROMOTION_THRESHOLD: u8 = 5;

/// Hard ceiling on checklist rows a user may create per week via the
/// AI generator (3 goals x up to 3 generated items).
pub const WEEKLY_GENERATION_LIMIT: i64 = 9;

/// Bounds on how many task titles a single generation call may persist.
pub const MIN_GENERATED_TASKS: usize = 2;
pub const MAX_GENERATED_TASKS: usize = 3;

/// Maximum number of active goals a user may hold at once.
pub const MAX_ACTIVE_GOALS: i64 = 3;

/// A weekly checklist item: one habit candidate tracked over a 7-day window.
///
/// `day_checks[i]` is the flag for the day at offset `i` from `period_start`.
/// `is_completed` is the user's manual "whole checklist done" toggle and is
/// independent of the per-day flags. `promoted_to_core` is monotonic: once
/// true, the item has produced its core habit entry and never produces
/// another.
#[derive(Debug, Clone)]
pub struct WeeklyChecklistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub day_checks: [bool; DAYS_PER_WEEK],
    pub is_completed: bool,
    pub promoted_to_core: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklyChecklistItem {
    /// Counts the true day flags. Computed fresh from the flags every time;
    /// never cached, so promotion decisions see the current state.
    pub fn checked_count(&self) -> u8 {
        self.day_checks.iter().filter(|c| **c).count() as u8
    }

    /// An item is expired once its window lies entirely before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.period_end < today
    }
}

/// Immutable snapshot of a checklist window, written only by rollover.
#[derive(Debug, Clone)]
pub struct WeeklyChecklistHistoryRecord {
    pub id: Uuid,
    pub weekly_item_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub checked_count: i16,
    pub promoted_to_core: bool,
    pub created_at: DateTime<Utc>,
}

/// Difficulty tier of a core habit entry. Stored as a string in the
/// database; parsed into this closed set at the storage edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Unknown,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
            Difficulty::Unknown => "unknown",
        }
    }

    /// Unrecognized strings collapse to `Unknown` rather than failing,
    /// since legacy rows may carry free-form values.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "easy" => Difficulty::Easy,
            "normal" => Difficulty::Normal,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Unknown,
        }
    }
}

/// Whether a core habit entry is live or archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitStatus {
    Active,
    Archived,
}

impl HabitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitStatus::Active => "active",
            HabitStatus::Archived => "archived",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "archived" => HabitStatus::Archived,
            _ => HabitStatus::Active,
        }
    }
}

/// A permanent habit earned by (or manually added to) the tiered core list.
#[derive(Debug, Clone)]
pub struct CoreHabitEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub difficulty: Difficulty,
    pub status: HabitStatus,
    /// Back-reference to the weekly checklist item this entry was promoted
    /// from. `None` for manually created entries.
    pub source_weekly_item_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Active,
    Done,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Done => "done",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "done" => GoalStatus::Done,
            _ => GoalStatus::Active,
        }
    }
}

/// A user goal; drives AI-assisted generation of checklist items.
#[derive(Debug, Clone)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub rationale: String,
    pub category: Option<String>,
    pub target: Option<String>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}
