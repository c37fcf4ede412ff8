//! Per-job status cells shared by the status-change path and the executor.
//!
//! The store stays the source of truth; a cell mirrors the last status written
//! through the service so a running executor can observe pause/cancel between
//! batches without re-reading the whole job. A cell also carries the "runner"
//! flag that keeps at most one executor loop alive per job. Cells live while a
//! job is started or paused and are dropped when it turns terminal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use catalogsync_batch::JobStatus;
use catalogsync_core::JobId;

#[derive(Debug)]
pub struct JobSignal {
    status: watch::Sender<JobStatus>,
    running: AtomicBool,
}

impl JobSignal {
    fn new(status: JobStatus) -> Self {
        Self {
            status: watch::Sender::new(status),
            running: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    fn publish(&self, status: JobStatus) {
        self.status.send_replace(status);
    }
}

/// Held by the executor loop currently driving a job; releases the slot on drop.
#[derive(Debug)]
pub struct RunnerGuard {
    signal: Arc<JobSignal>,
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        self.signal.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct JobControl {
    cells: Mutex<HashMap<JobId, Arc<JobSignal>>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn cells(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Arc<JobSignal>>> {
        // Cells hold no invariants a panicking writer could break.
        self.cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cell for `id`, created with `initial` if missing.
    pub fn signal(&self, id: JobId, initial: JobStatus) -> Arc<JobSignal> {
        self.cells()
            .entry(id)
            .or_insert_with(|| Arc::new(JobSignal::new(initial)))
            .clone()
    }

    pub fn publish(&self, id: JobId, status: JobStatus) {
        let signal = self.signal(id, status);
        signal.publish(status);
    }

    pub fn current(&self, id: JobId) -> Option<JobStatus> {
        self.cells().get(&id).map(|s| s.status())
    }

    /// Claim the runner slot for `id`. `None` if another loop already holds it.
    pub fn try_acquire_runner(&self, id: JobId, status: JobStatus) -> Option<RunnerGuard> {
        let signal = self.signal(id, status);
        signal
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunnerGuard { signal })
    }

    /// Drop the cell once the job is terminal or deleted. A runner still
    /// holding it keeps its own handle.
    pub fn remove(&self, id: JobId) {
        self.cells().remove(&id);
    }
}
