//! crates/habit_tracker_core/src/lifecycle.rs
//!
//! The weekly checklist lifecycle engine: window creation, day-check rules,
//! rollover of expired windows into history, promotion into the core habit
//! list, and the AI-generation quota gate. All state lives behind the
//! `ChecklistStore` port; this module owns only the rules.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::{Clock, TimeZonePolicy};
use crate::domain::{
    CoreHabitEntry, Difficulty, Goal, GoalStatus, HabitStatus, WeeklyChecklistHistoryRecord,
    WeeklyChecklistItem, DAYS_PER_WEEK, MAX_ACTIVE_GOALS, MAX_GENERATED_TASKS,
    MIN_GENERATED_TASKS, PROMOTION_THRESHOLD, WEEKLY_GENERATION_LIMIT,
};
use crate::ports::{
    ChecklistStore, NewCoreHabitEntry, NewGoal, PortError, PortResult, RolloverSnapshot,
    TaskGenerationService,
};
use crate::week::{current_week_window, rolling_window_from};

/// Result of a promotion attempt that met the threshold.
#[derive(Debug, Clone)]
pub enum PromotionOutcome {
    /// A core entry was created and the source item flagged.
    Promoted(CoreHabitEntry),
    /// The item had already been promoted; nothing was written.
    AlreadyPromoted,
}

/// Drives all authorized state transitions on checklist items, core habits
/// and goals. One instance is shared across requests; it holds no mutable
/// state of its own.
pub struct ChecklistLifecycle {
    store: Arc<dyn ChecklistStore>,
    generator: Arc<dyn TaskGenerationService>,
    clock: Arc<dyn Clock>,
    tz: TimeZonePolicy,
}

impl ChecklistLifecycle {
    pub fn new(
        store: Arc<dyn ChecklistStore>,
        generator: Arc<dyn TaskGenerationService>,
        clock: Arc<dyn Clock>,
        tz: TimeZonePolicy,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
            tz,
        }
    }

    fn today(&self) -> chrono::NaiveDate {
        self.tz.local_today(self.clock.now_utc())
    }

    //=====================================================================================
    // Checklist item operations
    //=====================================================================================

    /// Creates a manual checklist item in the current Monday-aligned week.
    pub async fn create_checklist_item(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> PortResult<WeeklyChecklistItem> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PortError::Validation("title must not be empty".to_string()));
        }
        let (start, end) = current_week_window(self.today());
        self.store
            .insert_checklist_item(user_id, title, start, end)
            .await
    }

    /// Sets one day flag. Rejected once the checklist has been marked
    /// completed; setting the same value twice is allowed.
    pub async fn toggle_day_check(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        day_index: usize,
        value: bool,
    ) -> PortResult<()> {
        if day_index >= DAYS_PER_WEEK {
            return Err(PortError::Validation(format!(
                "day index must be between 0 and 6, got {day_index}"
            )));
        }
        let item = self.store.get_checklist_item(user_id, item_id).await?;
        if item.is_completed {
            return Err(PortError::Validation(
                "checklist is marked completed; day checks are frozen".to_string(),
            ));
        }
        self.store
            .set_day_check(user_id, item_id, day_index, value)
            .await
    }

    /// Toggles the whole-checklist completion flag. Independent of the day
    /// flags and of `promoted_to_core`.
    pub async fn toggle_completed(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        value: bool,
    ) -> PortResult<()> {
        // Existence check keeps cross-user ids indistinguishable from absence.
        self.store.get_checklist_item(user_id, item_id).await?;
        self.store.set_completed(user_id, item_id, value).await
    }

    /// Deletes a checklist item. A promoted item takes its core entry with
    /// it, in one atomic step, so no entry is left pointing at a dead row.
    pub async fn delete_checklist_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()> {
        let item = self.store.get_checklist_item(user_id, item_id).await?;
        if item.promoted_to_core {
            self.store.delete_item_with_core_entry(user_id, item_id).await
        } else {
            self.store.delete_checklist_item(user_id, item_id).await
        }
    }

    /// Returns the user's checklist, rolling over any expired windows first
    /// so callers never see a window that ended before today.
    pub async fn list_checklist(&self, user_id: Uuid) -> PortResult<Vec<WeeklyChecklistItem>> {
        self.rollover_expired(user_id).await?;
        self.store.list_checklist_items(user_id).await
    }

    //=====================================================================================
    // Rollover
    //=====================================================================================

    /// Archives every expired item into history and resets it in place to a
    /// rolling window starting today. Each item is one atomic store call;
    /// the batch as a whole is not transactional, so a mid-batch failure
    /// leaves earlier items rolled over (each rollover is self-contained).
    ///
    /// A no-op for items whose window has not ended; running it twice on
    /// the same day changes nothing the second time.
    pub async fn rollover_expired(&self, user_id: Uuid) -> PortResult<usize> {
        let today = self.today();
        let items = self.store.list_checklist_items(user_id).await?;
        let mut rolled = 0usize;
        for item in items.iter().filter(|i| i.is_expired(today)) {
            let snapshot = RolloverSnapshot {
                title: item.title.clone(),
                period_start: item.period_start,
                period_end: item.period_end,
                checked_count: item.checked_count() as i16,
                promoted_to_core: item.promoted_to_core,
            };
            let (new_start, new_end) = rolling_window_from(today);
            self.store
                .archive_and_reset(user_id, item.id, snapshot, new_start, new_end)
                .await?;
            rolled += 1;
        }
        if rolled > 0 {
            info!(user_id = %user_id, rolled, "rolled over expired checklist windows");
        }
        Ok(rolled)
    }

    /// Read-only view of past windows.
    pub async fn list_history(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<WeeklyChecklistHistoryRecord>> {
        self.store.list_history(user_id).await
    }

    //=====================================================================================
    // Promotion
    //=====================================================================================

    /// Promotes a checklist item into the core habit list.
    ///
    /// Requires at least `PROMOTION_THRESHOLD` checked days, counted fresh
    /// from the flags at decision time. An already-promoted item is a no-op;
    /// the entry insert and the flag update commit together, so promotion
    /// happens at most once per item.
    pub async fn promote(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        difficulty: Option<Difficulty>,
    ) -> PortResult<PromotionOutcome> {
        let item = self.store.get_checklist_item(user_id, item_id).await?;
        let checked = item.checked_count();
        if checked < PROMOTION_THRESHOLD {
            return Err(PortError::InsufficientProgress(format!(
                "{checked} of 7 days checked; {PROMOTION_THRESHOLD} are needed to promote"
            )));
        }
        if item.promoted_to_core {
            return Ok(PromotionOutcome::AlreadyPromoted);
        }
        let entry = NewCoreHabitEntry {
            user_id,
            title: item.title.clone(),
            difficulty: difficulty.unwrap_or(Difficulty::Easy),
            status: HabitStatus::Active,
            source_weekly_item_id: Some(item.id),
        };
        let created = self
            .store
            .insert_core_entry_marking_promoted(entry, item.id)
            .await?;
        info!(user_id = %user_id, item_id = %item_id, "promoted checklist item to core habit");
        Ok(PromotionOutcome::Promoted(created))
    }

    //=====================================================================================
    // AI-assisted generation
    //=====================================================================================

    /// Generates checklist items from a goal, behind the weekly quota gate.
    ///
    /// The quota is checked before the generator is invoked so a refused
    /// request never spends an external call. Generator output is validated
    /// here: blank titles are dropped, fewer than two usable titles rejects
    /// the whole response, more than three is truncated. Returns how many
    /// items were inserted.
    pub async fn generate_from_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<usize> {
        let goal = self.store.get_goal(user_id, goal_id).await?;

        let today = self.today();
        let (week_start, week_end) = current_week_window(today);
        let created_this_week = self
            .store
            .count_items_created_between(user_id, week_start, week_end)
            .await?;
        if created_this_week >= WEEKLY_GENERATION_LIMIT {
            return Err(PortError::QuotaExceeded(format!(
                "weekly generation limit of {WEEKLY_GENERATION_LIMIT} checklist items reached; try again next week"
            )));
        }

        let raw = self.generator.generate_task_titles(&goal).await?;
        let mut titles: Vec<String> = raw
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if titles.len() < MIN_GENERATED_TASKS {
            return Err(PortError::Upstream(format!(
                "task generator returned {} usable titles; expected {}-{}",
                titles.len(),
                MIN_GENERATED_TASKS,
                MAX_GENERATED_TASKS
            )));
        }
        if titles.len() > MAX_GENERATED_TASKS {
            warn!(
                goal_id = %goal_id,
                returned = titles.len(),
                "task generator exceeded the batch bound; truncating"
            );
            titles.truncate(MAX_GENERATED_TASKS);
        }

        let mut inserted = 0usize;
        for title in &titles {
            self.store
                .insert_checklist_item(user_id, title, week_start, week_end)
                .await?;
            inserted += 1;
        }
        info!(user_id = %user_id, goal_id = %goal_id, inserted, "generated checklist items from goal");
        Ok(inserted)
    }

    //=====================================================================================
    // Core habit operations
    //=====================================================================================

    /// Manually adds a core habit. Policy only allows manual creation in
    /// the easy tier; harder tiers must be earned through promotion.
    pub async fn create_core_habit(
        &self,
        user_id: Uuid,
        title: &str,
        difficulty: Difficulty,
    ) -> PortResult<CoreHabitEntry> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PortError::Validation("title must not be empty".to_string()));
        }
        if difficulty != Difficulty::Easy {
            return Err(PortError::Validation(
                "core habits can only be created manually in the easy tier".to_string(),
            ));
        }
        self.store
            .insert_core_entry(NewCoreHabitEntry {
                user_id,
                title: title.to_string(),
                difficulty,
                status: HabitStatus::Active,
                source_weekly_item_id: None,
            })
            .await
    }

    pub async fn list_core_habits(&self, user_id: Uuid) -> PortResult<Vec<CoreHabitEntry>> {
        self.store.list_core_entries(user_id).await
    }

    pub async fn set_core_habit_status(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        status: HabitStatus,
    ) -> PortResult<()> {
        self.store
            .set_core_entry_status(user_id, entry_id, status)
            .await
    }

    /// Deletes a core habit entry on its own; the source checklist item, if
    /// any, is untouched (its `promoted_to_core` flag stays true).
    pub async fn delete_core_habit(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.store.delete_core_entry(user_id, entry_id).await
    }

    //=====================================================================================
    // Goal operations
    //=====================================================================================

    /// Creates a goal, capped at `MAX_ACTIVE_GOALS` active goals per user.
    pub async fn create_goal(&self, goal: NewGoal) -> PortResult<Goal> {
        if goal.title.trim().is_empty() {
            return Err(PortError::Validation("title must not be empty".to_string()));
        }
        let active = self.store.count_active_goals(goal.user_id).await?;
        if active >= MAX_ACTIVE_GOALS {
            return Err(PortError::QuotaExceeded(format!(
                "at most {MAX_ACTIVE_GOALS} active goals are allowed; finish or delete one first"
            )));
        }
        self.store.insert_goal(goal).await
    }

    pub async fn list_goals(&self, user_id: Uuid) -> PortResult<Vec<Goal>> {
        self.store.list_goals(user_id).await
    }

    pub async fn set_goal_status(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        status: GoalStatus,
    ) -> PortResult<()> {
        self.store.get_goal(user_id, goal_id).await?;
        self.store.set_goal_status(user_id, goal_id, status).await
    }

    pub async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
        self.store.delete_goal(user_id, goal_id).await
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    //-------------------------------------------------------------------------------------
    // In-memory store double
    //-------------------------------------------------------------------------------------

    #[derive(Default)]
    struct MemState {
        items: Vec<WeeklyChecklistItem>,
        history: Vec<WeeklyChecklistHistoryRecord>,
        core: Vec<CoreHabitEntry>,
        goals: Vec<Goal>,
    }

    #[derive(Default)]
    struct MemStore {
        state: Mutex<MemState>,
    }

    impl MemStore {
        fn seed_item(&self, item: WeeklyChecklistItem) {
            self.state.lock().unwrap().items.push(item);
        }

        fn seed_goal(&self, goal: Goal) {
            self.state.lock().unwrap().goals.push(goal);
        }

        fn item(&self, id: Uuid) -> WeeklyChecklistItem {
            self.state
                .lock()
                .unwrap()
                .items
                .iter()
                .find(|i| i.id == id)
                .cloned()
                .unwrap()
        }

        fn core_entries(&self) -> Vec<CoreHabitEntry> {
            self.state.lock().unwrap().core.clone()
        }

        fn history(&self) -> Vec<WeeklyChecklistHistoryRecord> {
            self.state.lock().unwrap().history.clone()
        }
    }

    #[async_trait::async_trait]
    impl ChecklistStore for MemStore {
        async fn list_checklist_items(
            &self,
            user_id: Uuid,
        ) -> PortResult<Vec<WeeklyChecklistItem>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .items
                .iter()
                .filter(|i| i.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn get_checklist_item(
            &self,
            user_id: Uuid,
            item_id: Uuid,
        ) -> PortResult<WeeklyChecklistItem> {
            self.state
                .lock()
                .unwrap()
                .items
                .iter()
                .find(|i| i.id == item_id && i.user_id == user_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound("checklist item not found".to_string()))
        }

        async fn insert_checklist_item(
            &self,
            user_id: Uuid,
            title: &str,
            period_start: NaiveDate,
            period_end: NaiveDate,
        ) -> PortResult<WeeklyChecklistItem> {
            // Stamp creation inside the item's own window so the
            // created-this-week quota count sees it under a pinned clock.
            let created_at = Utc.from_utc_datetime(&period_start.and_hms_opt(12, 0, 0).unwrap());
            let item = WeeklyChecklistItem {
                id: Uuid::new_v4(),
                user_id,
                title: title.to_string(),
                period_start,
                period_end,
                day_checks: [false; 7],
                is_completed: false,
                promoted_to_core: false,
                created_at,
                updated_at: created_at,
            };
            self.state.lock().unwrap().items.push(item.clone());
            Ok(item)
        }

        async fn set_day_check(
            &self,
            user_id: Uuid,
            item_id: Uuid,
            day_index: usize,
            value: bool,
        ) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            let item = state
                .items
                .iter_mut()
                .find(|i| i.id == item_id && i.user_id == user_id)
                .ok_or_else(|| PortError::NotFound("checklist item not found".to_string()))?;
            item.day_checks[day_index] = value;
            Ok(())
        }

        async fn set_completed(
            &self,
            user_id: Uuid,
            item_id: Uuid,
            value: bool,
        ) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            let item = state
                .items
                .iter_mut()
                .find(|i| i.id == item_id && i.user_id == user_id)
                .ok_or_else(|| PortError::NotFound("checklist item not found".to_string()))?;
            item.is_completed = value;
            Ok(())
        }

        async fn delete_checklist_item(&self, user_id: Uuid, item_id: Uuid) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            state
                .items
                .retain(|i| !(i.id == item_id && i.user_id == user_id));
            Ok(())
        }

        async fn delete_item_with_core_entry(
            &self,
            user_id: Uuid,
            item_id: Uuid,
        ) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            state
                .core
                .retain(|c| c.source_weekly_item_id != Some(item_id));
            state
                .items
                .retain(|i| !(i.id == item_id && i.user_id == user_id));
            Ok(())
        }

        async fn count_items_created_between(
            &self,
            user_id: Uuid,
            start: NaiveDate,
            end: NaiveDate,
        ) -> PortResult<i64> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .items
                .iter()
                .filter(|i| {
                    i.user_id == user_id && {
                        let d = i.created_at.date_naive();
                        start <= d && d <= end
                    }
                })
                .count() as i64)
        }

        async fn archive_and_reset(
            &self,
            user_id: Uuid,
            item_id: Uuid,
            snapshot: RolloverSnapshot,
            new_start: NaiveDate,
            new_end: NaiveDate,
        ) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            state.history.push(WeeklyChecklistHistoryRecord {
                id: Uuid::new_v4(),
                weekly_item_id: item_id,
                user_id,
                title: snapshot.title,
                period_start: snapshot.period_start,
                period_end: snapshot.period_end,
                checked_count: snapshot.checked_count,
                promoted_to_core: snapshot.promoted_to_core,
                created_at: Utc::now(),
            });
            let item = state
                .items
                .iter_mut()
                .find(|i| i.id == item_id && i.user_id == user_id)
                .ok_or_else(|| PortError::NotFound("checklist item not found".to_string()))?;
            item.period_start = new_start;
            item.period_end = new_end;
            item.day_checks = [false; 7];
            item.is_completed = false;
            item.promoted_to_core = false;
            Ok(())
        }

        async fn list_history(
            &self,
            user_id: Uuid,
        ) -> PortResult<Vec<WeeklyChecklistHistoryRecord>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .history
                .iter()
                .filter(|h| h.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn insert_core_entry_marking_promoted(
            &self,
            entry: NewCoreHabitEntry,
            source_item_id: Uuid,
        ) -> PortResult<CoreHabitEntry> {
            let mut state = self.state.lock().unwrap();
            let created = CoreHabitEntry {
                id: Uuid::new_v4(),
                user_id: entry.user_id,
                title: entry.title,
                difficulty: entry.difficulty,
                status: entry.status,
                source_weekly_item_id: entry.source_weekly_item_id,
                created_at: Utc::now(),
            };
            state.core.push(created.clone());
            let item = state
                .items
                .iter_mut()
                .find(|i| i.id == source_item_id)
                .ok_or_else(|| PortError::NotFound("checklist item not found".to_string()))?;
            item.promoted_to_core = true;
            Ok(created)
        }

        async fn insert_core_entry(&self, entry: NewCoreHabitEntry) -> PortResult<CoreHabitEntry> {
            let created = CoreHabitEntry {
                id: Uuid::new_v4(),
                user_id: entry.user_id,
                title: entry.title,
                difficulty: entry.difficulty,
                status: entry.status,
                source_weekly_item_id: entry.source_weekly_item_id,
                created_at: Utc::now(),
            };
            self.state.lock().unwrap().core.push(created.clone());
            Ok(created)
        }

        async fn list_core_entries(&self, user_id: Uuid) -> PortResult<Vec<CoreHabitEntry>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .core
                .iter()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn set_core_entry_status(
            &self,
            user_id: Uuid,
            entry_id: Uuid,
            status: HabitStatus,
        ) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            let entry = state
                .core
                .iter_mut()
                .find(|c| c.id == entry_id && c.user_id == user_id)
                .ok_or_else(|| PortError::NotFound("core habit not found".to_string()))?;
            entry.status = status;
            Ok(())
        }

        async fn delete_core_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            state
                .core
                .retain(|c| !(c.id == entry_id && c.user_id == user_id));
            Ok(())
        }

        async fn insert_goal(&self, goal: NewGoal) -> PortResult<Goal> {
            let created = Goal {
                id: Uuid::new_v4(),
                user_id: goal.user_id,
                title: goal.title,
                rationale: goal.rationale,
                category: goal.category,
                target: goal.target,
                status: GoalStatus::Active,
                created_at: Utc::now(),
            };
            self.state.lock().unwrap().goals.push(created.clone());
            Ok(created)
        }

        async fn get_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<Goal> {
            self.state
                .lock()
                .unwrap()
                .goals
                .iter()
                .find(|g| g.id == goal_id && g.user_id == user_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound("goal not found".to_string()))
        }

        async fn list_goals(&self, user_id: Uuid) -> PortResult<Vec<Goal>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .goals
                .iter()
                .filter(|g| g.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn count_active_goals(&self, user_id: Uuid) -> PortResult<i64> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .goals
                .iter()
                .filter(|g| g.user_id == user_id && g.status == GoalStatus::Active)
                .count() as i64)
        }

        async fn set_goal_status(
            &self,
            user_id: Uuid,
            goal_id: Uuid,
            status: GoalStatus,
        ) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            let goal = state
                .goals
                .iter_mut()
                .find(|g| g.id == goal_id && g.user_id == user_id)
                .ok_or_else(|| PortError::NotFound("goal not found".to_string()))?;
            goal.status = status;
            Ok(())
        }

        async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            state
                .goals
                .retain(|g| !(g.id == goal_id && g.user_id == user_id));
            Ok(())
        }
    }

    //-------------------------------------------------------------------------------------
    // Generator double with a call counter
    //-------------------------------------------------------------------------------------

    struct CountingGenerator {
        calls: AtomicUsize,
        titles: Vec<String>,
    }

    impl CountingGenerator {
        fn returning(titles: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                titles: titles.iter().map(|t| t.to_string()).collect(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TaskGenerationService for CountingGenerator {
        async fn generate_task_titles(&self, _goal: &Goal) -> PortResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.titles.clone())
        }
    }

    //-------------------------------------------------------------------------------------
    // Fixtures
    //-------------------------------------------------------------------------------------

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A lifecycle pinned so that local "today" is Wednesday 2024-03-06.
    fn lifecycle_on_wednesday(
        store: Arc<MemStore>,
        generator: Arc<CountingGenerator>,
    ) -> ChecklistLifecycle {
        // 03:00 UTC is 12:00 local at +9h, safely inside the 6th.
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 6, 3, 0, 0).unwrap());
        ChecklistLifecycle::new(store, generator, Arc::new(clock), TimeZonePolicy::default())
    }

    fn seeded_item(
        user_id: Uuid,
        start: NaiveDate,
        checks: [bool; 7],
        promoted: bool,
    ) -> WeeklyChecklistItem {
        WeeklyChecklistItem {
            id: Uuid::new_v4(),
            user_id,
            title: "morning run".to_string(),
            period_start: start,
            period_end: start + chrono::Duration::days(6),
            day_checks: checks,
            is_completed: false,
            promoted_to_core: promoted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn seeded_goal(user_id: Uuid) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            user_id,
            title: "run a 10k".to_string(),
            rationale: "build endurance".to_string(),
            category: Some("health".to_string()),
            target: Some("10km".to_string()),
            status: GoalStatus::Active,
            created_at: Utc::now(),
        }
    }

    //-------------------------------------------------------------------------------------
    // Creation & mutation
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn create_anchors_to_monday_week() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();

        let item = lc.create_checklist_item(user, "  drink water  ").await.unwrap();
        assert_eq!(item.title, "drink water");
        assert_eq!(item.period_start, date(2024, 3, 4)); // preceding Monday
        assert_eq!(item.period_end, date(2024, 3, 10)); // following Sunday
        assert_eq!(item.checked_count(), 0);
        assert!(!item.is_completed);
        assert!(!item.promoted_to_core);
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store, gen);

        let err = lc
            .create_checklist_item(Uuid::new_v4(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn day_check_bounds_and_completion_freeze() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let item = seeded_item(user, date(2024, 3, 4), [false; 7], false);
        let id = item.id;
        store.seed_item(item);

        assert!(matches!(
            lc.toggle_day_check(user, id, 7, true).await.unwrap_err(),
            PortError::Validation(_)
        ));

        lc.toggle_day_check(user, id, 2, true).await.unwrap();
        // Idempotent re-set of the same value.
        lc.toggle_day_check(user, id, 2, true).await.unwrap();
        assert_eq!(store.item(id).checked_count(), 1);

        lc.toggle_completed(user, id, true).await.unwrap();
        assert!(matches!(
            lc.toggle_day_check(user, id, 3, true).await.unwrap_err(),
            PortError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn cross_user_access_looks_like_absence() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let item = seeded_item(owner, date(2024, 3, 4), [false; 7], false);
        let id = item.id;
        store.seed_item(item);

        let err = lc.toggle_day_check(intruder, id, 0, true).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    //-------------------------------------------------------------------------------------
    // Rollover
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn rollover_is_noop_for_live_windows() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        // Window ends Sunday the 10th; today is Wednesday the 6th.
        store.seed_item(seeded_item(user, date(2024, 3, 4), [true; 7], false));

        assert_eq!(lc.rollover_expired(user).await.unwrap(), 0);
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn rollover_archives_and_resets_in_place() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        // Expired window: ended Sunday 2024-03-03.
        let checks = [true, true, false, true, false, false, false];
        let item = seeded_item(user, date(2024, 2, 26), checks, true);
        let id = item.id;
        store.seed_item(item);

        assert_eq!(lc.rollover_expired(user).await.unwrap(), 1);

        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].checked_count, 3);
        assert_eq!(history[0].period_start, date(2024, 2, 26));
        assert_eq!(history[0].period_end, date(2024, 3, 3));
        assert!(history[0].promoted_to_core);

        let live = store.item(id);
        // Rolling window from today, not Monday-aligned (today is already a
        // Wednesday here, so assert the full span too).
        assert_eq!(live.period_start, date(2024, 3, 6));
        assert_eq!(live.period_end, date(2024, 3, 12));
        assert_eq!(live.checked_count(), 0);
        assert!(!live.promoted_to_core);
        assert!(!live.is_completed);

        // Second run on the same day: the window is live again, no-op.
        assert_eq!(lc.rollover_expired(user).await.unwrap(), 0);
        assert_eq!(store.history().len(), 1);
    }

    #[tokio::test]
    async fn list_checklist_rolls_over_first() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        store.seed_item(seeded_item(user, date(2024, 2, 26), [true; 7], false));

        let items = lc.list_checklist(user).await.unwrap();
        assert_eq!(items.len(), 1);
        // The returned item is already reset; no expired window escapes.
        assert_eq!(items[0].period_start, date(2024, 3, 6));
        assert_eq!(items[0].checked_count(), 0);
        assert_eq!(store.history().len(), 1);
    }

    //-------------------------------------------------------------------------------------
    // Promotion
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn promotion_below_threshold_fails_without_mutation() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let item = seeded_item(
            user,
            date(2024, 3, 4),
            [true, true, true, true, false, false, false],
            false,
        );
        let id = item.id;
        store.seed_item(item);

        let err = lc.promote(user, id, None).await.unwrap_err();
        assert!(matches!(err, PortError::InsufficientProgress(_)));
        assert!(store.core_entries().is_empty());
        assert!(!store.item(id).promoted_to_core);
    }

    #[tokio::test]
    async fn five_of_seven_promotes_once_and_only_once() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let item = seeded_item(
            user,
            date(2024, 3, 4),
            [true, true, true, true, true, false, false],
            false,
        );
        let id = item.id;
        store.seed_item(item);

        let outcome = lc.promote(user, id, None).await.unwrap();
        let entry = match outcome {
            PromotionOutcome::Promoted(e) => e,
            PromotionOutcome::AlreadyPromoted => panic!("expected a fresh promotion"),
        };
        assert_eq!(entry.title, "morning run");
        assert_eq!(entry.difficulty, Difficulty::Easy);
        assert_eq!(entry.status, HabitStatus::Active);
        assert_eq!(entry.source_weekly_item_id, Some(id));
        assert!(store.item(id).promoted_to_core);

        // Second attempt: no-op, still exactly one entry.
        let outcome = lc.promote(user, id, None).await.unwrap();
        assert!(matches!(outcome, PromotionOutcome::AlreadyPromoted));
        assert_eq!(store.core_entries().len(), 1);
    }

    #[tokio::test]
    async fn caller_may_pick_a_harder_tier_at_promotion() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let item = seeded_item(user, date(2024, 3, 4), [true; 7], false);
        let id = item.id;
        store.seed_item(item);

        let outcome = lc.promote(user, id, Some(Difficulty::Hard)).await.unwrap();
        match outcome {
            PromotionOutcome::Promoted(e) => assert_eq!(e.difficulty, Difficulty::Hard),
            PromotionOutcome::AlreadyPromoted => panic!("expected a fresh promotion"),
        }
    }

    //-------------------------------------------------------------------------------------
    // Deletion
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn deleting_promoted_item_cascades_to_core_entry() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let item = seeded_item(user, date(2024, 3, 4), [true; 7], false);
        let id = item.id;
        store.seed_item(item);
        lc.promote(user, id, None).await.unwrap();
        assert_eq!(store.core_entries().len(), 1);

        lc.delete_checklist_item(user, id).await.unwrap();
        assert!(store.core_entries().is_empty());
        assert!(lc.list_checklist(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_unpromoted_item_leaves_core_entries_alone() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();

        let unrelated = lc
            .create_core_habit(user, "floss", Difficulty::Easy)
            .await
            .unwrap();
        let item = seeded_item(user, date(2024, 3, 4), [false; 7], false);
        let id = item.id;
        store.seed_item(item);

        lc.delete_checklist_item(user, id).await.unwrap();
        let remaining = store.core_entries();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, unrelated.id);
    }

    //-------------------------------------------------------------------------------------
    // Generation gate
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn quota_refuses_before_calling_the_generator() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&["a", "b", "c"]));
        let lc = lifecycle_on_wednesday(store.clone(), gen.clone());
        let user = Uuid::new_v4();
        let goal = seeded_goal(user);
        let goal_id = goal.id;
        store.seed_goal(goal);

        // Fill the weekly quota: 9 rows created this week.
        for i in 0..9 {
            lc.create_checklist_item(user, &format!("task {i}"))
                .await
                .unwrap();
        }

        let err = lc.generate_from_goal(user, goal_id).await.unwrap_err();
        assert!(matches!(err, PortError::QuotaExceeded(_)));
        assert_eq!(gen.call_count(), 0);
    }

    #[tokio::test]
    async fn generation_inserts_validated_titles() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[
            " Stretch for 10 minutes ",
            "",
            "Prepare running shoes",
        ]));
        let lc = lifecycle_on_wednesday(store.clone(), gen.clone());
        let user = Uuid::new_v4();
        let goal = seeded_goal(user);
        let goal_id = goal.id;
        store.seed_goal(goal);

        let inserted = lc.generate_from_goal(user, goal_id).await.unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(gen.call_count(), 1);

        let items = lc.list_checklist(user).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.title == "Stretch for 10 minutes"));
        // Generated items land in the Monday-aligned current week.
        assert!(items.iter().all(|i| i.period_start == date(2024, 3, 4)));
    }

    #[tokio::test]
    async fn oversized_generator_output_is_truncated() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&["a", "b", "c", "d", "e"]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let goal = seeded_goal(user);
        let goal_id = goal.id;
        store.seed_goal(goal);

        assert_eq!(lc.generate_from_goal(user, goal_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn undersized_generator_output_is_rejected() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&["only one"]));
        let lc = lifecycle_on_wednesday(store.clone(), gen);
        let user = Uuid::new_v4();
        let goal = seeded_goal(user);
        let goal_id = goal.id;
        store.seed_goal(goal);

        let err = lc.generate_from_goal(user, goal_id).await.unwrap_err();
        assert!(matches!(err, PortError::Upstream(_)));
        assert!(lc.list_checklist(user).await.unwrap().is_empty());
    }

    //-------------------------------------------------------------------------------------
    // Core habits & goals
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn manual_core_habits_are_easy_only() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store, gen);
        let user = Uuid::new_v4();

        let entry = lc
            .create_core_habit(user, "floss", Difficulty::Easy)
            .await
            .unwrap();
        assert_eq!(entry.difficulty, Difficulty::Easy);
        assert_eq!(entry.source_weekly_item_id, None);

        let err = lc
            .create_core_habit(user, "deadlift", Difficulty::Hard)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn active_goal_cap_is_enforced() {
        let store = Arc::new(MemStore::default());
        let gen = Arc::new(CountingGenerator::returning(&[]));
        let lc = lifecycle_on_wednesday(store, gen);
        let user = Uuid::new_v4();

        for i in 0..3 {
            lc.create_goal(NewGoal {
                user_id: user,
                title: format!("goal {i}"),
                rationale: String::new(),
                category: None,
                target: None,
            })
            .await
            .unwrap();
        }
        let err = lc
            .create_goal(NewGoal {
                user_id: user,
                title: "one too many".to_string(),
                rationale: String::new(),
                category: None,
                target: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::QuotaExceeded(_)));
    }
}
