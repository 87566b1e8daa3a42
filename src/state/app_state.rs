//! Main application state management

use std::{sync::Arc, time::Instant};
use tracing::info;

use super::{HistoryLog, TimerStore};
use crate::storage::KeyValueStore;
use crate::tasks::Scheduler;

/// Application container: built once at startup, handed to every consumer,
/// and torn down explicitly at exit
pub struct AppState {
    /// Timers and categories
    pub store: Arc<TimerStore>,
    /// Completed timer records
    pub history: Arc<HistoryLog>,
    /// Countdown drivers for running timers
    pub scheduler: Arc<Scheduler>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    /// Load persisted state and start the countdown scheduler
    pub async fn start(
        kv: Arc<dyn KeyValueStore>,
        coalesce_ticks: bool,
        port: u16,
        host: String,
    ) -> Self {
        let history = Arc::new(HistoryLog::load(Arc::clone(&kv)).await);
        let store = Arc::new(
            TimerStore::load(kv, Arc::clone(&history))
                .await
                .with_coalesced_ticks(coalesce_ticks),
        );
        let scheduler = Scheduler::new(Arc::clone(&store));
        scheduler.spawn();

        Self {
            store,
            history,
            scheduler,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Stop every countdown and write pending state
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.store.flush().await;
        info!("Application state shut down");
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
