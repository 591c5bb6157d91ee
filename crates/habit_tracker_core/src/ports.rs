//! crates/habit_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    CoreHabitEntry, Difficulty, Goal, GoalStatus, HabitStatus, WeeklyChecklistHistoryRecord,
    WeeklyChecklistItem,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// `NotFound` deliberately covers both true absence and cross-user id
/// mismatches; callers must not be able to tell the two apart.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Insufficient progress: {0}")]
    InsufficientProgress(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Port
//=========================================================================================

/// Snapshot data for one rollover, passed to the store so the history
/// insert and the in-place reset commit together.
#[derive(Debug, Clone)]
pub struct RolloverSnapshot {
    pub title: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub checked_count: i16,
    pub promoted_to_core: bool,
}

/// Fields for a new core habit entry; ids and timestamps are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewCoreHabitEntry {
    pub user_id: Uuid,
    pub title: String,
    pub difficulty: Difficulty,
    pub status: HabitStatus,
    pub source_weekly_item_id: Option<Uuid>,
}

/// Fields for a new goal.
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub user_id: Uuid,
    pub title: String,
    pub rationale: String,
    pub category: Option<String>,
    pub target: Option<String>,
}

/// The persistence port. Every operation is scoped by the owning user id in
/// addition to any row id; an id that exists but belongs to another user
/// behaves exactly like a missing id.
///
/// Multi-step mutations (`archive_and_reset`,
/// `insert_core_entry_marking_promoted`, `delete_item_with_core_entry`) are
/// single calls so implementations can make each one atomic.
#[async_trait]
pub trait ChecklistStore: Send + Sync {
    // --- Weekly checklist items ---
    async fn list_checklist_items(&self, user_id: Uuid) -> PortResult<Vec<WeeklyChecklistItem>>;

    async fn get_checklist_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> PortResult<WeeklyChecklistItem>;

    async fn insert_checklist_item(
        &self,
        user_id: Uuid,
        title: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> PortResult<WeeklyChecklistItem>;

    async fn set_day_check(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        day_index: usize,
        value: bool,
    ) -> PortResult<()>;

    async fn set_completed(&self, user_id: Uuid, item_id: Uuid, value: bool) -> PortResult<()>;

    async fn delete_checklist_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()>;

    /// Deletes the item together with the core entry that references it,
    /// atomically, for items that have already been promoted.
    async fn delete_item_with_core_entry(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()>;

    /// Rows created for the user in `[start, end]`, by creation date in the
    /// deployment's local calendar. Feeds the weekly generation quota.
    async fn count_items_created_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<i64>;

    /// Atomically appends a history record for `item_id` and resets the
    /// same row to a fresh window with all flags cleared.
    async fn archive_and_reset(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        snapshot: RolloverSnapshot,
        new_start: NaiveDate,
        new_end: NaiveDate,
    ) -> PortResult<()>;

    // --- History ---
    async fn list_history(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<WeeklyChecklistHistoryRecord>>;

    // --- Core habits ---
    /// Atomically inserts the promoted entry and sets `promoted_to_core` on
    /// its source item. If either write fails, neither takes effect.
    async fn insert_core_entry_marking_promoted(
        &self,
        entry: NewCoreHabitEntry,
        source_item_id: Uuid,
    ) -> PortResult<CoreHabitEntry>;

    async fn insert_core_entry(&self, entry: NewCoreHabitEntry) -> PortResult<CoreHabitEntry>;

    async fn list_core_entries(&self, user_id: Uuid) -> PortResult<Vec<CoreHabitEntry>>;

    async fn set_core_entry_status(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        status: HabitStatus,
    ) -> PortResult<()>;

    async fn delete_core_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()>;

    // --- Goals ---
    async fn insert_goal(&self, goal: NewGoal) -> PortResult<Goal>;

    async fn get_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<Goal>;

    async fn list_goals(&self, user_id: Uuid) -> PortResult<Vec<Goal>>;

    async fn count_active_goals(&self, user_id: Uuid) -> PortResult<i64>;

    async fn set_goal_status(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        status: GoalStatus,
    ) -> PortResult<()>;

    async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// Generation Port
//=========================================================================================

/// The outbound text-generation collaborator: turns a goal into a handful
/// of short imperative task titles. The caller validates count and content;
/// nothing returned here is trusted as-is.
#[async_trait]
pub trait TaskGenerationService: Send + Sync {
    async fn generate_task_titles(&self, goal: &Goal) -> PortResult<Vec<String>>;
}
