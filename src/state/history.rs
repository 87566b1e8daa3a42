//! Append-only log of completed timers

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use super::timer::{Timer, TimerId};
use crate::storage::{self, KeyValueStore, HISTORY_KEY};

/// Snapshot of a timer taken the moment it completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRecord {
    pub id: TimerId,
    pub name: String,
    pub duration: u64,
    pub category: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletedRecord {
    pub fn from_timer(timer: &Timer, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: timer.id,
            name: timer.name.clone(),
            duration: timer.duration,
            category: timer.category.clone(),
            completed_at,
        }
    }
}

pub struct HistoryLog {
    records: Mutex<Vec<CompletedRecord>>,
    kv: Arc<dyn KeyValueStore>,
    write_lock: tokio::sync::Mutex<()>,
    /// Records pushed since the last successful write
    pending: AtomicBool,
    update_tx: watch::Sender<Vec<CompletedRecord>>,
}

impl HistoryLog {
    /// Empty log backed by `kv`, without reading it
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_records(kv, Vec::new())
    }

    /// Load previously persisted records; corrupt or unreadable data starts empty
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let records = match storage::load_json::<Vec<CompletedRecord>>(kv.as_ref(), HISTORY_KEY).await {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load completion history, starting empty: {}", e);
                Vec::new()
            }
        };
        info!("Loaded {} completed timer records", records.len());
        Self::with_records(kv, records)
    }

    fn with_records(kv: Arc<dyn KeyValueStore>, records: Vec<CompletedRecord>) -> Self {
        let (update_tx, _) = watch::channel(records.clone());
        Self {
            records: Mutex::new(records),
            kv,
            write_lock: tokio::sync::Mutex::new(()),
            pending: AtomicBool::new(false),
            update_tx,
        }
    }

    /// Append a record and persist the log
    pub async fn append(&self, record: CompletedRecord) {
        self.push(record);
        self.persist().await;
    }

    /// Append a record in memory and notify subscribers without writing it.
    /// The record reaches storage on the next `persist` or `flush`.
    pub fn push(&self, record: CompletedRecord) {
        info!("Recording completion of '{}' ({}s)", record.name, record.duration);
        let mut records = self.lock();
        records.push(record);
        self.pending.store(true, Ordering::SeqCst);
        self.update_tx.send_replace(records.clone());
    }

    /// Write records pushed since the last write, if any
    pub async fn flush(&self) {
        if self.pending.load(Ordering::SeqCst) {
            self.persist().await;
        }
    }

    /// All records, most recently completed first
    pub fn records(&self) -> Vec<CompletedRecord> {
        let mut records = self.lock().clone();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        records
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the log and drop its persisted copy
    pub async fn clear(&self) {
        {
            let mut records = self.lock();
            records.clear();
            self.pending.store(false, Ordering::SeqCst);
            self.update_tx.send_replace(Vec::new());
        }
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.kv.remove(HISTORY_KEY).await {
            warn!("Failed to remove persisted history: {}", e);
        }
        info!("Completion history cleared");
    }

    /// Watch the log in insertion order
    pub fn subscribe(&self) -> watch::Receiver<Vec<CompletedRecord>> {
        self.update_tx.subscribe()
    }

    /// Write the whole log
    pub async fn persist(&self) {
        let _guard = self.write_lock.lock().await;
        let snapshot = {
            let records = self.lock();
            self.pending.store(false, Ordering::SeqCst);
            records.clone()
        };
        if let Err(e) = storage::save_json(self.kv.as_ref(), HISTORY_KEY, &snapshot).await {
            self.pending.store(true, Ordering::SeqCst);
            warn!("Failed to persist completion history: {}", e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CompletedRecord>> {
        // A poisoned lock still holds a consistent Vec: every mutation is a single push or clear
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::Duration;

    fn record(name: &str, completed_at: DateTime<Utc>) -> CompletedRecord {
        CompletedRecord::from_timer(&Timer::new(name, 5, "Study"), completed_at)
    }

    #[tokio::test]
    async fn records_are_read_newest_first() {
        let log = HistoryLog::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        log.append(record("first", now - Duration::seconds(10))).await;
        log.append(record("second", now)).await;
        log.append(record("middle", now - Duration::seconds(5))).await;

        let names: Vec<_> = log.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["second", "middle", "first"]);
    }

    #[tokio::test]
    async fn persisted_history_is_reloaded() {
        let kv = Arc::new(MemoryStore::new());
        let log = HistoryLog::new(kv.clone());
        log.append(record("Read", Utc::now())).await;

        let reloaded = HistoryLog::load(kv).await;
        assert_eq!(reloaded.records(), log.records());
    }

    #[tokio::test]
    async fn clear_removes_the_persisted_copy() {
        let kv = Arc::new(MemoryStore::new());
        let log = HistoryLog::new(kv.clone());
        log.append(record("Read", Utc::now())).await;
        assert!(kv.raw(HISTORY_KEY).await.is_some());

        log.clear().await;
        assert!(log.is_empty());
        assert!(kv.raw(HISTORY_KEY).await.is_none());
        assert!(log.subscribe().borrow().is_empty());
    }

    #[tokio::test]
    async fn corrupt_history_loads_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(HISTORY_KEY, "oops".to_string()).await.unwrap();

        let log = HistoryLog::load(kv).await;
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn write_failures_keep_the_record_in_memory() {
        let kv = Arc::new(MemoryStore::new());
        let log = HistoryLog::new(kv.clone());
        kv.fail_writes(true);

        log.append(record("Read", Utc::now())).await;
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn pushed_records_are_visible_before_they_are_written() {
        let kv = Arc::new(MemoryStore::new());
        let log = HistoryLog::new(kv.clone());
        let mut rx = log.subscribe();

        log.push(record("Read", Utc::now()));
        assert_eq!(log.len(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        assert!(kv.raw(HISTORY_KEY).await.is_none());

        log.flush().await;
        let persisted: Vec<CompletedRecord> =
            serde_json::from_str(&kv.raw(HISTORY_KEY).await.unwrap()).unwrap();
        assert_eq!(persisted, log.records());
    }

    #[tokio::test]
    async fn failed_writes_are_retried_by_flush() {
        let kv = Arc::new(MemoryStore::new());
        let log = HistoryLog::new(kv.clone());
        kv.fail_writes(true);
        log.append(record("Read", Utc::now())).await;
        assert!(kv.raw(HISTORY_KEY).await.is_none());

        kv.fail_writes(false);
        log.flush().await;
        assert!(kv.raw(HISTORY_KEY).await.is_some());
    }
}
