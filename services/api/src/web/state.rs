//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use habit_tracker_core::lifecycle::ChecklistLifecycle;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The lifecycle engine owns the store, generator and clock behind its
/// ports; handlers never touch those collaborators directly.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<ChecklistLifecycle>,
    pub config: Arc<Config>,
}
