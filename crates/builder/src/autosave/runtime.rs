// Runtime driver for the auto-save scheduler: an owned tokio task that
// sleeps on the scheduler's next deadline, fires scheduled saves, and
// applies their outcomes.
//
// Timers live inside this task, never in process-wide state: dropping the
// runtime (or calling `shutdown()`) cancels everything. The persistence
// callback is awaited outside the builder lock, so mutations stay
// responsive during a slow save.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use tabula_common::types::Dashboard;

use crate::autosave::SaveKind;
use crate::builder::{BuilderStatus, DashboardBuilder};

/// Injected persistence callback. May be a network call, a file write, or
/// an in-memory stub. Must be idempotent-safe to retry; any `Err` counts
/// as a failed attempt.
#[async_trait]
pub trait DashboardSaver: Send + Sync {
    async fn save(&self, dashboard: &Dashboard) -> Result<()>;
}

struct Shared {
    builder: Mutex<DashboardBuilder>,
    wakeup: Notify,
}

/// Owns the builder and the auto-save driver task.
///
/// Lifecycle mirrors an embedded service handle: `shutdown()` requests the
/// driver to stop, `wait()` joins it, and dropping the handle shuts the
/// driver down.
pub struct BuilderRuntime {
    shared: Arc<Shared>,
    saver: Arc<dyn DashboardSaver>,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl BuilderRuntime {
    /// Spawn the driver task. Must be called from within a tokio runtime.
    pub fn start(builder: DashboardBuilder, saver: Arc<dyn DashboardSaver>) -> Self {
        let shared = Arc::new(Shared { builder: Mutex::new(builder), wakeup: Notify::new() });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let task =
            tokio::spawn(drive(Arc::clone(&shared), Arc::clone(&saver), shutdown_rx));
        debug!("auto-save driver started");
        Self { shared, saver, shutdown_tx, task: Some(task) }
    }

    /// Run a closure against the builder under the lock, then wake the
    /// driver so it re-reads the scheduler's deadlines.
    pub fn with_builder<R>(&self, f: impl FnOnce(&mut DashboardBuilder) -> R) -> R {
        let result = {
            let mut builder = lock_builder(&self.shared);
            f(&mut builder)
        };
        self.shared.wakeup.notify_one();
        result
    }

    /// Manual save: bypasses debounce and interval scheduling and does not
    /// chain a new scheduled cycle. Returns `Ok(false)` when dropped (clean
    /// document, or another save in flight); failures surface immediately
    /// and are not retried.
    pub async fn save_now(&self) -> Result<bool> {
        self.attempt(SaveKind::Manual).await
    }

    /// Forced save: runs regardless of dirty state. Returns `Ok(false)`
    /// only when another save is in flight.
    pub async fn force_save(&self) -> Result<bool> {
        self.attempt(SaveKind::Forced).await
    }

    async fn attempt(&self, kind: SaveKind) -> Result<bool> {
        let snapshot = self.with_builder(|builder| match kind {
            SaveKind::Manual => builder.begin_manual_save(),
            SaveKind::Forced => builder.begin_force_save(),
            SaveKind::Scheduled => None,
        });
        let Some(snapshot) = snapshot else {
            debug!(?kind, "save dropped by single-flight/dirty guard");
            return Ok(false);
        };

        let result = self.saver.save(&snapshot).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|error| error.to_string());
        self.with_builder(|builder| builder.complete_save(outcome, kind));

        match result {
            Ok(()) => Ok(true),
            Err(error) => Err(anyhow!("{kind:?} save failed: {error}")),
        }
    }

    /// Freeze timer scheduling without discarding dirty state. An
    /// in-flight save is allowed to complete and its result still applies.
    pub fn pause(&self) {
        self.with_builder(|builder| builder.pause_autosave());
    }

    /// Unfreeze timer scheduling; a dirty document re-arms the chain.
    pub fn resume(&self) {
        self.with_builder(|builder| builder.resume_autosave());
    }

    pub fn status(&self) -> BuilderStatus {
        lock_builder(&self.shared).status()
    }

    /// Request the driver task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Shut down and join the driver task.
    pub async fn wait(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for BuilderRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// A panicking closure inside `with_builder` can poison the lock; the
// builder state itself is still consistent (mutations commit atomically
// under the lock), so recover rather than cascade the panic.
fn lock_builder(shared: &Shared) -> MutexGuard<'_, DashboardBuilder> {
    shared.builder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn drive(
    shared: Arc<Shared>,
    saver: Arc<dyn DashboardSaver>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let deadline = lock_builder(&shared).next_autosave_deadline();

        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("auto-save driver shutting down");
                break;
            }
            _ = shared.wakeup.notified() => {
                // Scheduler state changed; recompute the deadline.
                continue;
            }
            _ = wait_until(deadline) => {}
        }

        let snapshot = lock_builder(&shared).poll_autosave_at(Instant::now());
        let Some(snapshot) = snapshot else {
            continue;
        };

        debug!(version = snapshot.version, "auto-save attempt starting");
        let result = saver.save(&snapshot).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|error| error.to_string());

        let mut builder = lock_builder(&shared);
        builder.complete_save(outcome, SaveKind::Scheduled);
        match result {
            Ok(()) => info!(version = snapshot.version, "dashboard auto-saved"),
            Err(error) => warn!(
                version = snapshot.version,
                retry_count = builder.scheduler().retry_count(),
                %error,
                "auto-save failed"
            ),
        }
    }
}

/// Sleep until the deadline, or forever when nothing is scheduled (the
/// wakeup notify interrupts either way).
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
