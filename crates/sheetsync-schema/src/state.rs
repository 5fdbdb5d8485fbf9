//! Process-wide synchronization state.
//!
//! `SyncState` serializes sync cycles and remembers which template version
//! the table was last reconciled against. It never blocks query traffic;
//! only cycles take its lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;

#[derive(Debug, Default)]
struct Tracking {
    marker: Option<SystemTime>,
    last_failure: Option<Instant>,
    last_success_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Shared state coordinating the watcher and manual sync callers.
#[derive(Debug, Default)]
pub struct SyncState {
    cycle: tokio::sync::Mutex<()>,
    in_flight: AtomicBool,
    tracking: Mutex<Tracking>,
    cycles: AtomicU64,
    migrations: AtomicU64,
    failures: AtomicU64,
}

/// Held for the duration of one sync cycle.
#[derive(Debug)]
pub struct CycleGuard<'a> {
    state: &'a SyncState,
    _lock: tokio::sync::MutexGuard<'a, ()>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}

/// Point-in-time view of the synchronizer, for logs and status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// A cycle is currently running.
    pub syncing: bool,
    /// Cycles run since start, successful or not.
    pub cycles: u64,
    /// Cycles that changed the table.
    pub migrations_applied: u64,
    /// Cycles that failed.
    pub failures: u64,
    /// Template modification time the table was last reconciled against.
    pub template_modified: Option<DateTime<Utc>>,
    /// When the last successful cycle finished.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
}

impl SyncState {
    /// Creates a fresh state with no recorded template version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for any in-flight cycle to finish, then claims the cycle lock.
    pub async fn begin_cycle(&self) -> CycleGuard<'_> {
        let lock = self.cycle.lock().await;
        self.in_flight.store(true, Ordering::Release);
        CycleGuard { state: self, _lock: lock }
    }

    /// Returns whether a cycle is running right now.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns the template modification marker of the last settled cycle.
    #[must_use]
    pub fn recorded_marker(&self) -> Option<SystemTime> {
        self.tracking().marker
    }

    /// Returns whether `current` differs from the recorded marker.
    #[must_use]
    pub fn is_stale(&self, current: Option<SystemTime>) -> bool {
        self.tracking().marker != current
    }

    /// Returns whether enough time has passed since the last transient
    /// failure to try again.
    #[must_use]
    pub fn retry_allowed(&self, min_interval: Duration) -> bool {
        self.tracking()
            .last_failure
            .map_or(true, |at| at.elapsed() >= min_interval)
    }

    /// Records a settled, successful cycle against `marker`.
    pub(crate) fn record_success(&self, marker: Option<SystemTime>, migrated: bool) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if migrated {
            self.migrations.fetch_add(1, Ordering::Relaxed);
        }
        let mut tracking = self.tracking();
        tracking.marker = marker;
        tracking.last_failure = None;
        tracking.last_success_at = Some(Utc::now());
        tracking.last_error = None;
    }

    /// Records a failed cycle.
    ///
    /// Terminal failures settle `marker` so the same template is not retried;
    /// transient ones leave it stale and start the retry back-off.
    pub(crate) fn record_failure(&self, marker: Option<SystemTime>, error: &SyncError) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        let mut tracking = self.tracking();
        if error.is_transient() {
            tracking.last_failure = Some(Instant::now());
        } else {
            tracking.marker = marker;
            tracking.last_failure = None;
        }
        tracking.last_error = Some(error.to_string());
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let tracking = self.tracking();
        SyncStatus {
            syncing: self.is_syncing(),
            cycles: self.cycles.load(Ordering::Relaxed),
            migrations_applied: self.migrations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            template_modified: tracking.marker.map(DateTime::<Utc>::from),
            last_success_at: tracking.last_success_at,
            last_error: tracking.last_error.clone(),
        }
    }

    fn tracking(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
