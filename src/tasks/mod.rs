//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod countdown;

// Re-export main types
pub use countdown::{countdown_scheduler_task, Scheduler, TICK_PERIOD};
