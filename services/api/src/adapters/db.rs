//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ChecklistStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every query is scoped by both row id and owning user id, so a row that
//! belongs to another user surfaces as `NotFound` with no further detail.
//! The multi-step port operations (`archive_and_reset`,
//! `insert_core_entry_marking_promoted`, `delete_item_with_core_entry`) each
//! run inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use habit_tracker_core::domain::{
    CoreHabitEntry, Difficulty, Goal, GoalStatus, HabitStatus, WeeklyChecklistHistoryRecord,
    WeeklyChecklistItem,
};
use habit_tracker_core::ports::{
    ChecklistStore, NewCoreHabitEntry, NewGoal, PortError, PortResult, RolloverSnapshot,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ChecklistStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    /// Local day boundaries for creation-date bucketing in quota queries.
    local_offset: FixedOffset,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`. `offset_hours` is the deployment's fixed
    /// UTC offset, matching the core `TimeZonePolicy`.
    pub fn new(pool: PgPool, offset_hours: i32) -> Self {
        let local_offset = FixedOffset::east_opt(offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self { pool, local_offset }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// The UTC instant at which the given local calendar day begins.
    fn local_midnight_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        DateTime::<Utc>::from_naive_utc_and_offset(
            midnight - Duration::seconds(self.local_offset.local_minus_utc() as i64),
            Utc,
        )
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Upstream(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => PortError::Upstream(e.to_string()),
    }
}

const ITEM_COLUMNS: &str = "id, user_id, title, period_start, period_end, \
     check_0, check_1, check_2, check_3, check_4, check_5, check_6, \
     is_completed, promoted_to_core, created_at, updated_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct WeeklyItemRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    check_0: bool,
    check_1: bool,
    check_2: bool,
    check_3: bool,
    check_4: bool,
    check_5: bool,
    check_6: bool,
    is_completed: bool,
    promoted_to_core: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WeeklyItemRecord {
    fn to_domain(self) -> WeeklyChecklistItem {
        WeeklyChecklistItem {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            period_start: self.period_start,
            period_end: self.period_end,
            day_checks: [
                self.check_0,
                self.check_1,
                self.check_2,
                self.check_3,
                self.check_4,
                self.check_5,
                self.check_6,
            ],
            is_completed: self.is_completed,
            promoted_to_core: self.promoted_to_core,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HistoryRecord {
    id: Uuid,
    weekly_item_id: Uuid,
    user_id: Uuid,
    title: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    checked_count: i16,
    promoted_to_core: bool,
    created_at: DateTime<Utc>,
}

impl HistoryRecord {
    fn to_domain(self) -> WeeklyChecklistHistoryRecord {
        WeeklyChecklistHistoryRecord {
            id: self.id,
            weekly_item_id: self.weekly_item_id,
            user_id: self.user_id,
            title: self.title,
            period_start: self.period_start,
            period_end: self.period_end,
            checked_count: self.checked_count,
            promoted_to_core: self.promoted_to_core,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CoreHabitRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    difficulty: String,
    status: String,
    source_weekly_item_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl CoreHabitRecord {
    fn to_domain(self) -> CoreHabitEntry {
        CoreHabitEntry {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            // Stored as free-form strings; collapsed to the closed enum here,
            // at the storage edge only.
            difficulty: Difficulty::from_str_lossy(&self.difficulty),
            status: HabitStatus::from_str_lossy(&self.status),
            source_weekly_item_id: self.source_weekly_item_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct GoalRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    rationale: String,
    category: Option<String>,
    target: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl GoalRecord {
    fn to_domain(self) -> Goal {
        Goal {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            rationale: self.rationale,
            category: self.category,
            target: self.target,
            status: GoalStatus::from_str_lossy(&self.status),
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `ChecklistStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChecklistStore for DbAdapter {
    async fn list_checklist_items(&self, user_id: Uuid) -> PortResult<Vec<WeeklyChecklistItem>> {
        let records = sqlx::query_as::<_, WeeklyItemRecord>(&format!(
            "SELECT {ITEM_COLUMNS} FROM weekly_checklist_items WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_checklist_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> PortResult<WeeklyChecklistItem> {
        let record = sqlx::query_as::<_, WeeklyItemRecord>(&format!(
            "SELECT {ITEM_COLUMNS} FROM weekly_checklist_items WHERE id = $1 AND user_id = $2"
        ))
        .bind(item_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "checklist item"))?;
        Ok(record.to_domain())
    }

    async fn insert_checklist_item(
        &self,
        user_id: Uuid,
        title: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> PortResult<WeeklyChecklistItem> {
        let record = sqlx::query_as::<_, WeeklyItemRecord>(&format!(
            "INSERT INTO weekly_checklist_items (id, user_id, title, period_start, period_end) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ITEM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(period_start)
        .bind(period_end)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn set_day_check(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        day_index: usize,
        value: bool,
    ) -> PortResult<()> {
        // Column name is built from a validated index, never from input text.
        if day_index > 6 {
            return Err(PortError::Validation(format!(
                "day index must be between 0 and 6, got {day_index}"
            )));
        }
        let result = sqlx::query(&format!(
            "UPDATE weekly_checklist_items SET check_{day_index} = $1, updated_at = now() \
             WHERE id = $2 AND user_id = $3"
        ))
        .bind(value)
        .bind(item_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("checklist item not found".to_string()));
        }
        Ok(())
    }

    async fn set_completed(&self, user_id: Uuid, item_id: Uuid, value: bool) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE weekly_checklist_items SET is_completed = $1, updated_at = now() \
             WHERE id = $2 AND user_id = $3",
        )
        .bind(value)
        .bind(item_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("checklist item not found".to_string()));
        }
        Ok(())
    }

    async fn delete_checklist_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "DELETE FROM weekly_checklist_items WHERE id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("checklist item not found".to_string()));
        }
        Ok(())
    }

    async fn delete_item_with_core_entry(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The derived core entry goes first so no entry is left with a
        // dangling back-reference.
        sqlx::query(
            "DELETE FROM core_habits WHERE source_weekly_item_id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let result = sqlx::query(
            "DELETE FROM weekly_checklist_items WHERE id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("checklist item not found".to_string()));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn count_items_created_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<i64> {
        let from = self.local_midnight_utc(start);
        let until = self.local_midnight_utc(end + Duration::days(1));
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM weekly_checklist_items \
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count.0)
    }

    async fn archive_and_reset(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        snapshot: RolloverSnapshot,
        new_start: NaiveDate,
        new_end: NaiveDate,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO weekly_checklist_history \
             (id, weekly_item_id, user_id, title, period_start, period_end, checked_count, promoted_to_core) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(item_id)
        .bind(user_id)
        .bind(&snapshot.title)
        .bind(snapshot.period_start)
        .bind(snapshot.period_end)
        .bind(snapshot.checked_count)
        .bind(snapshot.promoted_to_core)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let result = sqlx::query(
            "UPDATE weekly_checklist_items SET \
             period_start = $1, period_end = $2, \
             check_0 = FALSE, check_1 = FALSE, check_2 = FALSE, check_3 = FALSE, \
             check_4 = FALSE, check_5 = FALSE, check_6 = FALSE, \
             is_completed = FALSE, promoted_to_core = FALSE, updated_at = now() \
             WHERE id = $3 AND user_id = $4",
        )
        .bind(new_start)
        .bind(new_end)
        .bind(item_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the history insert.
            return Err(PortError::NotFound("checklist item not found".to_string()));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn list_history(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<WeeklyChecklistHistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT id, weekly_item_id, user_id, title, period_start, period_end, \
             checked_count, promoted_to_core, created_at \
             FROM weekly_checklist_history WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_core_entry_marking_promoted(
        &self,
        entry: NewCoreHabitEntry,
        source_item_id: Uuid,
    ) -> PortResult<CoreHabitEntry> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, CoreHabitRecord>(
            "INSERT INTO core_habits (id, user_id, title, difficulty, status, source_weekly_item_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, user_id, title, difficulty, status, source_weekly_item_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(&entry.title)
        .bind(entry.difficulty.as_str())
        .bind(entry.status.as_str())
        .bind(entry.source_weekly_item_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let result = sqlx::query(
            "UPDATE weekly_checklist_items SET promoted_to_core = TRUE, updated_at = now() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(source_item_id)
        .bind(entry.user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("checklist item not found".to_string()));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn insert_core_entry(&self, entry: NewCoreHabitEntry) -> PortResult<CoreHabitEntry> {
        let record = sqlx::query_as::<_, CoreHabitRecord>(
            "INSERT INTO core_habits (id, user_id, title, difficulty, status, source_weekly_item_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, user_id, title, difficulty, status, source_weekly_item_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(&entry.title)
        .bind(entry.difficulty.as_str())
        .bind(entry.status.as_str())
        .bind(entry.source_weekly_item_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_core_entries(&self, user_id: Uuid) -> PortResult<Vec<CoreHabitEntry>> {
        let records = sqlx::query_as::<_, CoreHabitRecord>(
            "SELECT id, user_id, title, difficulty, status, source_weekly_item_id, created_at \
             FROM core_habits WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn set_core_entry_status(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        status: HabitStatus,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE core_habits SET status = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(status.as_str())
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("core habit not found".to_string()));
        }
        Ok(())
    }

    async fn delete_core_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM core_habits WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("core habit not found".to_string()));
        }
        Ok(())
    }

    async fn insert_goal(&self, goal: NewGoal) -> PortResult<Goal> {
        let record = sqlx::query_as::<_, GoalRecord>(
            "INSERT INTO goals (id, user_id, title, rationale, category, target, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active') \
             RETURNING id, user_id, title, rationale, category, target, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(goal.user_id)
        .bind(&goal.title)
        .bind(&goal.rationale)
        .bind(&goal.category)
        .bind(&goal.target)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<Goal> {
        let record = sqlx::query_as::<_, GoalRecord>(
            "SELECT id, user_id, title, rationale, category, target, status, created_at \
             FROM goals WHERE id = $1 AND user_id = $2",
        )
        .bind(goal_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "goal"))?;
        Ok(record.to_domain())
    }

    async fn list_goals(&self, user_id: Uuid) -> PortResult<Vec<Goal>> {
        let records = sqlx::query_as::<_, GoalRecord>(
            "SELECT id, user_id, title, rationale, category, target, status, created_at \
             FROM goals WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn count_active_goals(&self, user_id: Uuid) -> PortResult<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM goals WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count.0)
    }

    async fn set_goal_status(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        status: GoalStatus,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE goals SET status = $1 WHERE id = $2 AND user_id = $3")
            .bind(status.as_str())
            .bind(goal_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("goal not found".to_string()));
        }
        Ok(())
    }

    async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(goal_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("goal not found".to_string()));
        }
        Ok(())
    }
}
