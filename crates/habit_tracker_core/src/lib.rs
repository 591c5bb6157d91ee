pub mod clock;
pub mod domain;
pub mod lifecycle;
pub mod ports;
pub mod week;

pub use clock::{Clock, FixedClock, SystemClock, TimeZonePolicy};
pub use domain::{
    CoreHabitEntry, Difficulty, Goal, GoalStatus, HabitStatus, WeeklyChecklistHistoryRecord,
    WeeklyChecklistItem,
};
pub use lifecycle::{ChecklistLifecycle, PromotionOutcome};
pub use ports::{
    ChecklistStore, NewCoreHabitEntry, NewGoal, PortError, PortResult, RolloverSnapshot,
    TaskGenerationService,
};
