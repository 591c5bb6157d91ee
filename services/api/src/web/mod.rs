pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers the server binary wires into the router.
pub use middleware::require_identity;
pub use rest::{
    create_checklist_handler, create_core_habit_handler, create_goal_handler,
    delete_checklist_handler, delete_core_habit_handler, delete_goal_handler,
    generate_from_goal_handler, list_checklist_handler, list_core_habits_handler,
    list_goals_handler, list_history_handler, promote_handler, set_completed_handler,
    set_core_habit_status_handler, set_day_check_handler, set_goal_status_handler,
};
