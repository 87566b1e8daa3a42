//! Countdown scheduler background task
//!
//! Every Running timer gets its own driver task ticking once per period.
//! The scheduler reconciles the set of drivers whenever the store publishes
//! a new timer snapshot: drivers are spawned for timers that entered Running
//! and cancelled for timers that left it, were deleted, or were restarted
//! under a new lease.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{task::JoinHandle, time::{interval_at, Instant}};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::state::{Lease, TickOutcome, TimerId, TimerStore};

/// Wall-clock length of one tick
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

struct Driver {
    lease: Lease,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Drivers {
    running: HashMap<TimerId, Driver>,
    /// Timers whose view was torn down; not driven until re-attached
    detached: HashSet<TimerId>,
}

pub struct Scheduler {
    store: Arc<TimerStore>,
    period: Duration,
    drivers: Mutex<Drivers>,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(store: Arc<TimerStore>) -> Arc<Self> {
        Self::with_period(store, TICK_PERIOD)
    }

    pub fn with_period(store: Arc<TimerStore>, period: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            period,
            drivers: Mutex::new(Drivers::default()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the reconciliation loop
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(countdown_scheduler_task(Arc::clone(self)))
    }

    /// Bring the drivers in line with the store's Running timers
    pub fn reconcile(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let mut drivers = self.lock();
        let leases = self.store.active_leases();
        let Drivers { running, detached } = &mut *drivers;

        detached.retain(|id| self.store.timer(*id).is_some());
        running.retain(|id, driver| {
            let keep = !detached.contains(id)
                && leases.get(id) == Some(&driver.lease)
                && !driver.handle.is_finished();
            if !keep {
                debug!("Cancelling countdown for timer {}", id);
                driver.cancel.cancel();
            }
            keep
        });

        for (id, lease) in leases {
            if detached.contains(&id) || running.contains_key(&id) {
                continue;
            }
            debug!("Starting countdown for timer {} (lease {})", id, lease);
            let cancel = self.shutdown.child_token();
            let handle = tokio::spawn(drive(
                Arc::clone(&self.store),
                id,
                lease,
                self.period,
                cancel.clone(),
            ));
            running.insert(id, Driver { lease, cancel, handle });
        }
    }

    /// Stop driving a timer whose view went away. Its status is left as is,
    /// but its lease is released so an in-flight tick cannot land.
    pub fn detach(&self, id: TimerId) {
        let driver = {
            let mut drivers = self.lock();
            drivers.detached.insert(id);
            drivers.running.remove(&id)
        };
        self.store.release_lease(id);
        if let Some(driver) = driver {
            debug!("Detached countdown for timer {}", id);
            driver.cancel.cancel();
        }
    }

    /// Resume driving a previously detached timer
    pub fn attach(&self, id: TimerId) {
        let was_detached = self.lock().detached.remove(&id);
        if was_detached && self.store.renew_lease(id).is_some() {
            self.reconcile();
        }
    }

    /// Timers with a live driver
    pub fn active_timers(&self) -> Vec<TimerId> {
        self.lock()
            .running
            .iter()
            .filter(|(_, d)| !d.handle.is_finished())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Timers whose view is currently detached
    pub fn detached_timers(&self) -> Vec<TimerId> {
        self.lock().detached.iter().copied().collect()
    }

    /// Cancel every driver, wait for them to stop, then flush pending ticks
    pub async fn shutdown(&self) {
        info!("Stopping countdown scheduler");
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> =
            self.lock().running.drain().map(|(_, driver)| driver.handle).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.store.flush().await;
    }

    fn lock(&self) -> MutexGuard<'_, Drivers> {
        self.drivers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Background task that reconciles countdown drivers on every timer change
pub async fn countdown_scheduler_task(scheduler: Arc<Scheduler>) {
    info!("Starting countdown scheduler task");

    let mut timers_rx = scheduler.store.subscribe_timers();
    scheduler.reconcile();

    loop {
        tokio::select! {
            changed = timers_rx.changed() => {
                if changed.is_err() {
                    debug!("Timer store dropped, stopping scheduler");
                    break;
                }
                scheduler.reconcile();
            }
            _ = scheduler.shutdown.cancelled() => break,
        }
    }
}

/// Tick one timer until it completes, goes stale or is cancelled
async fn drive(
    store: Arc<TimerStore>,
    id: TimerId,
    lease: Lease,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Countdown for timer {} cancelled", id);
                break;
            }
            _ = interval.tick() => {
                match store.tick(id, lease).await {
                    TickOutcome::Advanced => {}
                    TickOutcome::Completed => {
                        info!("Countdown for timer {} finished", id);
                        break;
                    }
                    TickOutcome::Stale => {
                        debug!("Timer {} no longer runs under lease {}, stopping", id, lease);
                        break;
                    }
                }
            }
        }
    }

    store.flush().await;
}
