//! State management module
//!
//! This module contains the timer model, the authoritative timer store, the
//! completion history and the application container tying them together.

pub mod app_state;
pub mod history;
pub mod timer;
pub mod timer_store;

// Re-export main types
pub use app_state::AppState;
pub use history::{CompletedRecord, HistoryLog};
pub use timer::{Timer, TimerId, TimerPatch, TimerStatus};
pub use timer_store::{CategorySummary, Lease, TickOutcome, TimerStore};
