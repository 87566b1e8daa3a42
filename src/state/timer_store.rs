//! Authoritative store of timers and categories
//!
//! Every mutation runs synchronously under one lock, publishes the new
//! snapshot to watchers, and only then awaits persistence. Persistence
//! failures are logged and otherwise ignored: the in-memory state stays the
//! source of truth until the next successful write.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::history::{CompletedRecord, HistoryLog};
use super::timer::{self, Tick, Timer, TimerId, TimerPatch, TimerStatus};
use crate::error::ValidationError;
use crate::storage::{self, KeyValueStore, CATEGORIES_KEY, TIMERS_KEY};

/// Categories seeded on first launch
pub const DEFAULT_CATEGORIES: [&str; 3] = ["Workout", "Study", "Break"];

/// Identifies one uninterrupted Running stretch of a timer.
///
/// A lease is issued whenever a timer enters `Running` and revoked when it
/// leaves it (or its duration changes). Ticks carrying a revoked lease are
/// rejected.
pub type Lease = u64;

/// Outcome of a countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced,
    Completed,
    /// Timer gone, no longer running, or restarted under a newer lease
    Stale,
}

/// Per-category view used to drive bulk actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    pub timer_count: usize,
    pub any_running: bool,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Timers,
    Categories,
    Both,
}

#[derive(Debug, Default)]
struct Inner {
    timers: Vec<Timer>,
    categories: Vec<String>,
    leases: HashMap<TimerId, Lease>,
    next_lease: Lease,
    /// Timer changes not yet written (coalesced ticks)
    dirty: bool,
}

impl Inner {
    fn timer_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.id == id)
    }

    fn refresh_lease(&mut self, id: TimerId, running: bool) {
        if running {
            self.next_lease += 1;
            self.leases.insert(id, self.next_lease);
        } else {
            self.leases.remove(&id);
        }
    }
}

pub struct TimerStore {
    inner: Mutex<Inner>,
    kv: Arc<dyn KeyValueStore>,
    history: Arc<HistoryLog>,
    coalesce_ticks: bool,
    /// Serialises writes so an older snapshot never lands after a newer one
    write_lock: tokio::sync::Mutex<()>,
    timers_tx: watch::Sender<Vec<Timer>>,
    categories_tx: watch::Sender<Vec<String>>,
}

impl TimerStore {
    /// Empty store backed by `kv`, without reading it
    pub fn new(kv: Arc<dyn KeyValueStore>, history: Arc<HistoryLog>) -> Self {
        Self::from_parts(kv, history, Vec::new(), Vec::new())
    }

    /// Load persisted timers and categories.
    ///
    /// First launch (no `categories` key) seeds [`DEFAULT_CATEGORIES`].
    /// Timers persisted as Running are loaded Paused, since nothing ticked
    /// while the process was down.
    pub async fn load(kv: Arc<dyn KeyValueStore>, history: Arc<HistoryLog>) -> Self {
        let mut timers = match storage::load_json::<Vec<Timer>>(kv.as_ref(), TIMERS_KEY).await {
            Ok(timers) => timers.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load timers, starting empty: {}", e);
                Vec::new()
            }
        };
        let stored_categories =
            match storage::load_json::<Vec<String>>(kv.as_ref(), CATEGORIES_KEY).await {
                Ok(categories) => categories,
                Err(e) => {
                    warn!("Failed to load categories, starting empty: {}", e);
                    Some(Vec::new())
                }
            };

        timers.retain(|t| t.duration > 0);
        for timer in timers.iter_mut() {
            if timer.is_running() {
                timer.status = TimerStatus::Paused;
            }
            if timer.is_completed() {
                timer.elapsed = timer.duration;
            } else {
                timer.elapsed = timer.elapsed.min(timer.duration - 1);
            }
        }

        let seeded = stored_categories.is_none();
        let categories = stored_categories
            .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect());
        info!("Loaded {} timers in {} categories", timers.len(), categories.len());

        let store = Self::from_parts(kv, history, timers, categories);
        if seeded {
            info!("Seeding default categories");
            store.persist(Scope::Categories).await;
        }
        store
    }

    fn from_parts(
        kv: Arc<dyn KeyValueStore>,
        history: Arc<HistoryLog>,
        timers: Vec<Timer>,
        categories: Vec<String>,
    ) -> Self {
        let (timers_tx, _) = watch::channel(timers.clone());
        let (categories_tx, _) = watch::channel(categories.clone());
        Self {
            inner: Mutex::new(Inner { timers, categories, ..Default::default() }),
            kv,
            history,
            coalesce_ticks: false,
            write_lock: tokio::sync::Mutex::new(()),
            timers_tx,
            categories_tx,
        }
    }

    /// Defer persistence of countdown ticks until the next flush
    pub fn with_coalesced_ticks(mut self, coalesce: bool) -> Self {
        self.coalesce_ticks = coalesce;
        self
    }

    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn timers(&self) -> Vec<Timer> {
        self.lock().timers.clone()
    }

    pub fn timer(&self, id: TimerId) -> Option<Timer> {
        self.lock().timers.iter().find(|t| t.id == id).cloned()
    }

    pub fn categories(&self) -> Vec<String> {
        self.lock().categories.clone()
    }

    pub fn timers_in_category(&self, category: &str) -> Vec<Timer> {
        self.lock()
            .timers
            .iter()
            .filter(|t| t.category == category)
            .cloned()
            .collect()
    }

    pub fn categories_overview(&self) -> Vec<CategorySummary> {
        let inner = self.lock();
        let summaries = inner
            .categories
            .iter()
            .map(|name| {
                let members = inner.timers.iter().filter(|t| &t.category == name);
                let (timer_count, any_running) = members
                    .fold((0, false), |(count, running), t| (count + 1, running || t.is_running()));
                CategorySummary { name: name.clone(), timer_count, any_running }
            })
            .collect();
        summaries
    }

    /// Leases of Running timers that may be ticked
    pub fn active_leases(&self) -> HashMap<TimerId, Lease> {
        self.lock().leases.clone()
    }

    /// Revoke a timer's lease without touching its status
    pub fn release_lease(&self, id: TimerId) -> bool {
        self.lock().leases.remove(&id).is_some()
    }

    /// Issue a fresh lease for a timer that is Running
    pub fn renew_lease(&self, id: TimerId) -> Option<Lease> {
        let mut inner = self.lock();
        let running = inner.timer_mut(id).is_some_and(|t| t.is_running());
        if !running {
            return None;
        }
        inner.refresh_lease(id, true);
        inner.leases.get(&id).copied()
    }

    pub fn subscribe_timers(&self) -> watch::Receiver<Vec<Timer>> {
        self.timers_tx.subscribe()
    }

    pub fn subscribe_categories(&self) -> watch::Receiver<Vec<String>> {
        self.categories_tx.subscribe()
    }

    // ── Timer operations ─────────────────────────────────────────────

    /// Create a NotStarted timer in an existing category
    pub async fn add_timer(
        &self,
        name: &str,
        duration: u64,
        category: &str,
    ) -> Result<Timer, ValidationError> {
        timer::validate_new(name, duration, category)?;
        let timer = {
            let mut inner = self.lock();
            if !inner.categories.iter().any(|c| c == category) {
                return Err(ValidationError::UnknownCategory(category.to_string()));
            }
            let timer = Timer::new(name, duration, category);
            inner.timers.push(timer.clone());
            self.publish_timers(&inner);
            timer
        };
        info!("Added timer '{}' ({}s) to {}", timer.name, timer.duration, timer.category);
        self.persist(Scope::Timers).await;
        Ok(timer)
    }

    /// Merge `patch` into the timer. Unknown ids are ignored (`Ok(false)`).
    ///
    /// With `skip_persist` the change is only written by a later mutation or
    /// [`TimerStore::flush`].
    pub async fn update_timer(
        &self,
        id: TimerId,
        patch: TimerPatch,
        skip_persist: bool,
    ) -> Result<bool, ValidationError> {
        {
            let mut inner = self.lock();
            if let Some(category) = &patch.category {
                if !category.trim().is_empty() && !inner.categories.contains(category) {
                    return Err(ValidationError::UnknownCategory(category.clone()));
                }
            }
            let Some(timer) = inner.timer_mut(id) else {
                debug!("Ignoring update for unknown timer {}", id);
                return Ok(false);
            };
            let old_duration = timer.duration;
            timer.apply(patch)?;
            let restart = timer.is_running() && timer.duration != old_duration;
            if restart {
                inner.refresh_lease(id, true);
            }
            inner.dirty = true;
            self.publish_timers(&inner);
        }
        if !skip_persist {
            self.persist(Scope::Timers).await;
        }
        Ok(true)
    }

    pub async fn start_timer(&self, id: TimerId) -> bool {
        self.transition(id, "start", Timer::start).await
    }

    pub async fn pause_timer(&self, id: TimerId) -> bool {
        self.transition(id, "pause", Timer::pause).await
    }

    pub async fn reset_timer(&self, id: TimerId) -> bool {
        self.transition(id, "reset", Timer::reset).await
    }

    pub async fn delete_timer(&self, id: TimerId) -> bool {
        let removed = {
            let mut inner = self.lock();
            let before = inner.timers.len();
            inner.timers.retain(|t| t.id != id);
            inner.leases.remove(&id);
            let removed = inner.timers.len() != before;
            if removed {
                self.publish_timers(&inner);
            }
            removed
        };
        if removed {
            info!("Deleted timer {}", id);
            self.persist(Scope::Timers).await;
        }
        removed
    }

    /// Mark a timer completed and record it in the history.
    ///
    /// Absent or already completed timers are ignored, so duplicate
    /// completion signals produce a single record.
    pub async fn timer_completed(&self, id: TimerId) -> bool {
        let record = {
            let mut inner = self.lock();
            let now = Utc::now();
            let Some(timer) = inner.timer_mut(id) else {
                return false;
            };
            if !timer.complete(now) {
                return false;
            }
            let record = CompletedRecord::from_timer(timer, now);
            inner.leases.remove(&id);
            self.history.push(record.clone());
            self.publish_timers(&inner);
            record
        };
        self.finish(&record).await;
        true
    }

    /// Advance a running timer by one second on behalf of its countdown
    /// driver. The final second completes the timer in the same step.
    pub async fn tick(&self, id: TimerId, lease: Lease) -> TickOutcome {
        let (outcome, record) = {
            let mut inner = self.lock();
            if inner.leases.get(&id) != Some(&lease) {
                return TickOutcome::Stale;
            }
            let now = Utc::now();
            let Some(pos) = inner.timers.iter().position(|t| t.id == id) else {
                inner.leases.remove(&id);
                return TickOutcome::Stale;
            };
            let timer = &mut inner.timers[pos];
            let outcome = match timer.tick(now) {
                Tick::Advanced => (TickOutcome::Advanced, None),
                Tick::Finished => (TickOutcome::Completed, Some(CompletedRecord::from_timer(timer, now))),
                Tick::Ignored => (TickOutcome::Stale, None),
            };
            match outcome.0 {
                TickOutcome::Advanced => inner.dirty = true,
                _ => {
                    inner.leases.remove(&id);
                }
            }
            if let Some(record) = &outcome.1 {
                self.history.push(record.clone());
            }
            if outcome.0 != TickOutcome::Stale {
                self.publish_timers(&inner);
            }
            outcome
        };

        match record {
            Some(record) => self.finish(&record).await,
            None if outcome == TickOutcome::Advanced && !self.coalesce_ticks => {
                self.persist(Scope::Timers).await
            }
            None => {}
        }
        outcome
    }

    // ── Category operations ──────────────────────────────────────────

    /// Add a category. Returns false if it already existed.
    pub async fn add_category(&self, name: &str) -> Result<bool, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyCategoryName);
        }
        let added = {
            let mut inner = self.lock();
            if inner.categories.iter().any(|c| c == name) {
                false
            } else {
                inner.categories.push(name.to_string());
                self.categories_tx.send_replace(inner.categories.clone());
                true
            }
        };
        if added {
            info!("Added category '{}'", name);
            self.persist(Scope::Categories).await;
        }
        Ok(added)
    }

    /// Remove a category together with every timer filed under it
    pub async fn delete_category(&self, name: &str) -> bool {
        let (existed, removed) = {
            let mut inner = self.lock();
            let existed = inner.categories.iter().any(|c| c == name);
            inner.categories.retain(|c| c != name);

            let doomed: Vec<TimerId> =
                inner.timers.iter().filter(|t| t.category == name).map(|t| t.id).collect();
            for id in &doomed {
                inner.leases.remove(id);
            }
            inner.timers.retain(|t| t.category != name);

            if existed {
                self.categories_tx.send_replace(inner.categories.clone());
            }
            if !doomed.is_empty() {
                self.publish_timers(&inner);
            }
            (existed, doomed.len())
        };
        if !existed && removed == 0 {
            return false;
        }
        info!("Deleted category '{}' and {} of its timers", name, removed);
        self.persist(Scope::Both).await;
        true
    }

    pub async fn start_all_in_category(&self, category: &str) -> usize {
        self.transition_category(category, "start", Timer::start).await
    }

    pub async fn pause_all_in_category(&self, category: &str) -> usize {
        self.transition_category(category, "pause", Timer::pause).await
    }

    pub async fn reset_all_in_category(&self, category: &str) -> usize {
        self.transition_category(category, "reset", Timer::reset).await
    }

    /// Write timer changes deferred by coalesced ticks or `skip_persist`,
    /// and history records not yet written
    pub async fn flush(&self) {
        let dirty = self.lock().dirty;
        if dirty {
            debug!("Flushing pending timer changes");
            self.persist(Scope::Timers).await;
        }
        self.history.flush().await;
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn transition<F>(&self, id: TimerId, action: &str, apply: F) -> bool
    where
        F: FnOnce(&mut Timer) -> bool,
    {
        {
            let mut inner = self.lock();
            let Some(timer) = inner.timer_mut(id) else {
                debug!("Ignoring {} for unknown timer {}", action, id);
                return false;
            };
            if !apply(timer) {
                debug!("Ignoring {} for timer {} in state {}", action, id, timer.status.as_str());
                return false;
            }
            let running = timer.is_running();
            inner.refresh_lease(id, running);
            self.publish_timers(&inner);
        }
        info!("Timer {}: {}", id, action);
        self.persist(Scope::Timers).await;
        true
    }

    async fn transition_category<F>(&self, category: &str, action: &str, apply: F) -> usize
    where
        F: Fn(&mut Timer) -> bool,
    {
        let changed = {
            let mut inner = self.lock();
            let mut changed = Vec::new();
            for timer in inner.timers.iter_mut().filter(|t| t.category == category) {
                if apply(timer) {
                    changed.push((timer.id, timer.is_running()));
                }
            }
            for (id, running) in &changed {
                inner.refresh_lease(*id, *running);
            }
            if !changed.is_empty() {
                self.publish_timers(&inner);
            }
            changed.len()
        };
        if changed > 0 {
            info!("Category '{}': {} applied to {} timers", category, action, changed);
            self.persist(Scope::Timers).await;
        }
        changed
    }

    /// Write a completion that is already visible in memory
    async fn finish(&self, record: &CompletedRecord) {
        info!("Timer '{}' completed", record.name);
        self.persist(Scope::Timers).await;
        self.history.persist().await;
    }

    fn publish_timers(&self, inner: &Inner) {
        self.timers_tx.send_replace(inner.timers.clone());
    }

    async fn persist(&self, scope: Scope) {
        let _guard = self.write_lock.lock().await;
        let (timers, categories) = {
            let mut inner = self.lock();
            let timers = match scope {
                Scope::Timers | Scope::Both => {
                    inner.dirty = false;
                    Some(inner.timers.clone())
                }
                Scope::Categories => None,
            };
            let categories = match scope {
                Scope::Categories | Scope::Both => Some(inner.categories.clone()),
                Scope::Timers => None,
            };
            (timers, categories)
        };

        if let Some(timers) = timers {
            if let Err(e) = storage::save_json(self.kv.as_ref(), TIMERS_KEY, &timers).await {
                warn!("Failed to persist timers, keeping in-memory state: {}", e);
            }
        }
        if let Some(categories) = categories {
            if let Err(e) = storage::save_json(self.kv.as_ref(), CATEGORIES_KEY, &categories).await {
                warn!("Failed to persist categories, keeping in-memory state: {}", e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
