//! Timer Keeper - countdown timers with categories and completion history
//!
//! This library provides the authoritative timer store, the per-timer
//! countdown scheduler, the completion history and the HTTP surface that
//! exposes them to UI clients.

pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{PersistenceError, ValidationError};
pub use state::{AppState, HistoryLog, Timer, TimerStatus, TimerStore};
pub use api::create_router;
pub use tasks::Scheduler;
pub use utils::signals::shutdown_signal;
