//! Template change watcher.
//!
//! Two tasks cooperate:
//! 1. The watcher owns a poll timer. On each tick it compares the template's
//!    modification marker with the one recorded in [`SyncState`] and, if they
//!    differ, pushes a trigger into a single-slot channel.
//! 2. The worker drains that channel and runs one sync cycle per trigger.
//!
//! The channel holds at most one pending trigger, so any number of triggers
//! arriving while a cycle runs collapse into a single follow-up cycle that
//! reads the template as it is at that point.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::state::{SyncState, SyncStatus};
use crate::sync::Synchronizer;
use crate::template::TemplateSource;

/// Configuration for the watcher.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// How often the template's modification time is checked.
    pub poll_interval: Duration,
    /// Minimum wait after a transient failure before the next attempt.
    pub min_retry_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            min_retry_interval: Duration::from_secs(30),
        }
    }
}

/// Why a cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The watcher saw a new modification marker.
    TemplateChanged,
    /// Someone asked for a sync explicitly.
    Manual,
}

/// Runs the watcher and sync worker tasks.
pub struct SyncService;

impl SyncService {
    /// Starts watching the synchronizer's template.
    ///
    /// The caller should have run an initial [`Synchronizer::sync`] first;
    /// otherwise the first tick will trigger one.
    pub fn start<T: TemplateSource>(
        synchronizer: Arc<Synchronizer<T>>,
        config: WatchConfig,
    ) -> SyncHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            template = %synchronizer.template().path().display(),
            interval = ?config.poll_interval,
            "Watching template for changes"
        );

        let watcher = tokio::spawn(watch_template(
            Arc::clone(&synchronizer),
            trigger_tx.clone(),
            config.clone(),
            shutdown_rx,
        ));
        let worker = tokio::spawn(run_worker(
            Arc::clone(&synchronizer),
            trigger_rx,
            config.min_retry_interval,
        ));

        SyncHandle {
            trigger_tx,
            shutdown_tx,
            watcher,
            worker,
            state: Arc::clone(synchronizer.state()),
        }
    }
}

/// Handle to a running [`SyncService`].
pub struct SyncHandle {
    trigger_tx: mpsc::Sender<SyncTrigger>,
    shutdown_tx: watch::Sender<bool>,
    watcher: JoinHandle<()>,
    worker: JoinHandle<()>,
    state: Arc<SyncState>,
}

impl SyncHandle {
    /// Requests a sync cycle.
    ///
    /// Returns `false` if a cycle is already queued, in which case this
    /// request is folded into it.
    pub fn trigger(&self) -> bool {
        match self.trigger_tx.try_send(SyncTrigger::Manual) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Sync already queued, coalescing trigger");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Returns the synchronizer's current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.state.status()
    }

    /// Stops watching, lets queued cycles finish, and waits for both tasks.
    pub async fn shutdown(self) {
        // Ignore send errors -- the watcher may already be gone.
        let _ = self.shutdown_tx.send(true);
        drop(self.trigger_tx);
        let _ = self.watcher.await;
        let _ = self.worker.await;
        info!("Template watcher stopped");
    }
}

async fn watch_template<T: TemplateSource>(
    synchronizer: Arc<Synchronizer<T>>,
    trigger_tx: mpsc::Sender<SyncTrigger>,
    config: WatchConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick; startup runs its own sync.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        let state = synchronizer.state();
        if !state.is_stale(synchronizer.template().modified()) {
            continue;
        }
        if !state.retry_allowed(config.min_retry_interval) {
            debug!("Template changed but last attempt failed recently, waiting");
            continue;
        }

        match trigger_tx.try_send(SyncTrigger::TemplateChanged) {
            Ok(()) => info!(
                template = %synchronizer.template().path().display(),
                "Template change detected"
            ),
            Err(TrySendError::Full(_)) => debug!("Sync already queued"),
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

async fn run_worker<T: TemplateSource>(
    synchronizer: Arc<Synchronizer<T>>,
    mut trigger_rx: mpsc::Receiver<SyncTrigger>,
    min_retry_interval: Duration,
) {
    while let Some(trigger) = trigger_rx.recv().await {
        // A change trigger may have been queued while the previous cycle was
        // still running; re-check it against the state that cycle left.
        if trigger == SyncTrigger::TemplateChanged {
            let state = synchronizer.state();
            if !state.is_stale(synchronizer.template().modified()) {
                debug!("Template already synchronized, skipping queued trigger");
                continue;
            }
            if !state.retry_allowed(min_retry_interval) {
                debug!("Previous attempt failed recently, skipping queued trigger");
                continue;
            }
        }

        // Failures are logged and recorded by the synchronizer itself.
        if let Ok(report) = synchronizer.sync().await {
            debug!(?trigger, applied = ?report.applied, "Sync cycle finished");
        }
    }
}
