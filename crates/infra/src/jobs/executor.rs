//! Concurrency-limited batch executor.
//!
//! One loop per job. Each tick claims up to `concurrency_limit` pending items,
//! runs them concurrently on a [`JoinSet`], waits for all of them, refreshes
//! progress and then decides whether to continue, stop, or finish the job.
//! Pause and cancel are observed between ticks only; in-flight items always run
//! to completion and their outcomes are recorded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use catalogsync_batch::{BatchJob, ItemRef, JobParams, JobStatus, LogEntry, Progress};
use catalogsync_core::{ItemEntryId, JobId};

use super::control::JobControl;
use super::registry::{ItemProcessor, ProcessorKey, ProcessorRegistry};
use super::store::{ItemUpdate, JobStore, JobStoreError};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum simultaneously in-flight item operations per job.
    pub concurrency_limit: usize,
    /// Name for logging
    pub name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            name: "batch-executor".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every item finished; the job reached this terminal status.
    Finished(JobStatus),
    /// Job-level fatal error; the job was moved to `failed`.
    Aborted,
    Paused,
    Cancelled,
    /// No pending items left but not every item is finished.
    Drained,
    /// The job was not `processing` when the run started.
    NotProcessing(JobStatus),
    /// Another loop already drives this job.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u32,
    pub dispatched: u64,
    pub outcome: RunOutcome,
}

/// Errors that end a run without a job-level outcome.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Drives `processing` jobs to completion.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    registry: Arc<ProcessorRegistry>,
    control: Arc<JobControl>,
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<ProcessorRegistry>,
        control: Arc<JobControl>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            control,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the job loop on the tokio runtime.
    pub fn spawn(self: &Arc<Self>, job_id: JobId) -> JoinHandle<()> {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            match executor.run(job_id).await {
                Ok(report) => debug!(
                    executor = %executor.config.name,
                    job_id = %job_id,
                    ticks = report.ticks,
                    dispatched = report.dispatched,
                    outcome = ?report.outcome,
                    "batch run ended"
                ),
                Err(e) => error!(
                    executor = %executor.config.name,
                    job_id = %job_id,
                    error = %e,
                    "batch run failed"
                ),
            }
        })
    }

    /// Drive `job_id` until it finishes, is paused or cancelled, or fails.
    pub async fn run(&self, job_id: JobId) -> Result<RunReport, ExecutorError> {
        let mut total = RunReport {
            ticks: 0,
            dispatched: 0,
            outcome: RunOutcome::AlreadyRunning,
        };

        loop {
            let job = self.load(job_id).await?;
            if job.status != JobStatus::Processing {
                total.outcome = RunOutcome::NotProcessing(job.status);
                return Ok(total);
            }

            let Some(guard) = self.control.try_acquire_runner(job_id, job.status) else {
                debug!(job_id = %job_id, "executor already running for job");
                return Ok(total);
            };

            // The status may have moved between the first read and taking the slot.
            let job = self.load(job_id).await?;
            let report = self.run_locked(job_id, job.status, job.params).await?;
            total.ticks += report.ticks;
            total.dispatched += report.dispatched;
            total.outcome = report.outcome;
            drop(guard);

            // A resume that raced with this loop winding down found the runner
            // slot taken; pick the job up again on its behalf.
            if report.outcome == RunOutcome::Paused
                && self.control.current(job_id) == Some(JobStatus::Processing)
            {
                continue;
            }
            return Ok(total);
        }
    }

    async fn load(&self, job_id: JobId) -> Result<BatchJob, ExecutorError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(ExecutorError::JobNotFound(job_id))
    }

    async fn run_locked(
        &self,
        job_id: JobId,
        status: JobStatus,
        params: JobParams,
    ) -> Result<RunReport, ExecutorError> {
        let mut report = RunReport {
            ticks: 0,
            dispatched: 0,
            outcome: RunOutcome::NotProcessing(status),
        };
        if status != JobStatus::Processing {
            if status.is_terminal() {
                self.control.remove(job_id);
            }
            return Ok(report);
        }

        let Some(processor) = self.registry.resolve(&params) else {
            let key = ProcessorKey::for_params(&params);
            warn!(job_id = %job_id, processor = %key, "no processor registered for job type");
            self.abort(job_id, format!("unsupported job type: {key}")).await;
            report.outcome = RunOutcome::Aborted;
            return Ok(report);
        };

        info!(
            executor = %self.config.name,
            job_id = %job_id,
            job_type = %params.kind(),
            concurrency_limit = self.config.concurrency_limit,
            "batch run started"
        );
        if let Err(e) = self
            .store
            .append_log(
                job_id,
                LogEntry::info(format!(
                    "executor started (concurrency limit {})",
                    self.config.concurrency_limit
                )),
            )
            .await
        {
            return self.fatal(job_id, report, e).await;
        }

        let params = Arc::new(params);
        loop {
            match self.control.current(job_id) {
                Some(JobStatus::Processing) => {}
                Some(JobStatus::Paused) => {
                    report.outcome = RunOutcome::Paused;
                    break;
                }
                Some(JobStatus::Cancelled) => {
                    report.outcome = RunOutcome::Cancelled;
                    break;
                }
                // Cell dropped by a cancel: the store has the final word.
                None => {
                    report.outcome = self.stopped_outcome(job_id).await;
                    break;
                }
                Some(other) => {
                    report.outcome = RunOutcome::NotProcessing(other);
                    break;
                }
            }

            let claimed = match self
                .store
                .claim_pending_items(job_id, self.config.concurrency_limit)
                .await
            {
                Ok(claimed) => claimed,
                Err(e) => return self.fatal(job_id, report, e).await,
            };

            if claimed.is_empty() {
                let progress = match self.store.refresh_progress(job_id).await {
                    Ok(p) => p,
                    Err(e) => return self.fatal(job_id, report, e).await,
                };
                report.outcome = match self.finish(job_id, progress).await {
                    Ok(Some(outcome)) => outcome,
                    Ok(None) => self.stopped_outcome(job_id).await,
                    Err(e) => return self.fatal(job_id, report, e).await,
                };
                break;
            }

            report.ticks += 1;
            report.dispatched += claimed.len() as u64;
            debug!(
                job_id = %job_id,
                tick = report.ticks,
                batch_size = claimed.len(),
                "dispatching batch"
            );

            if let Err(e) = self.dispatch(job_id, &processor, &params, claimed).await {
                return self.fatal(job_id, report, e).await;
            }

            let progress = match self.store.refresh_progress(job_id).await {
                Ok(p) => p,
                Err(e) => return self.fatal(job_id, report, e).await,
            };
            match self.finish(job_id, progress).await {
                Ok(Some(outcome)) => {
                    report.outcome = outcome;
                    break;
                }
                Ok(None) => {}
                Err(e) => return self.fatal(job_id, report, e).await,
            }
        }

        Ok(report)
    }

    /// Run one batch concurrently and wait for all of it.
    async fn dispatch(
        &self,
        job_id: JobId,
        processor: &Arc<dyn ItemProcessor>,
        params: &Arc<JobParams>,
        claimed: Vec<ItemRef>,
    ) -> Result<(), JobStoreError> {
        let mut set = JoinSet::new();
        let mut tasks: HashMap<tokio::task::Id, (ItemEntryId, Instant)> = HashMap::new();

        for item in claimed {
            let processor = Arc::clone(processor);
            let params = Arc::clone(params);
            let store = Arc::clone(&self.store);
            let entry_id = item.entry_id;
            let handle = set.spawn(async move {
                let started = Instant::now();
                let outcome = processor.process(&item, &params).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let update = match outcome {
                    Ok(result) => ItemUpdate::Succeeded {
                        result,
                        elapsed_ms,
                        at: Utc::now(),
                    },
                    Err(e) => {
                        debug!(job_id = %job_id, entry_id = %item.entry_id, error = %e, "item failed");
                        ItemUpdate::Failed {
                            message: e.to_string(),
                            elapsed_ms,
                            at: Utc::now(),
                        }
                    }
                };
                store.update_item_fields(job_id, item.entry_id, update).await
            });
            tasks.insert(handle.id(), (entry_id, Instant::now()));
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((_, Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Err(join_err) => {
                    let Some((entry_id, started)) = tasks.get(&join_err.id()).copied() else {
                        continue;
                    };
                    error!(job_id = %job_id, entry_id = %entry_id, "item processor panicked");
                    let update = ItemUpdate::Failed {
                        message: "item processor panicked".to_string(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        at: Utc::now(),
                    };
                    if let Err(e) = self.store.update_item_fields(job_id, entry_id, update).await {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Apply the terminal status implied by `progress`, if any.
    async fn finish(
        &self,
        job_id: JobId,
        progress: Progress,
    ) -> Result<Option<RunOutcome>, JobStoreError> {
        let Some(terminal) = progress.terminal_status() else {
            return Ok(None);
        };
        match self
            .store
            .transition_status(job_id, terminal, Some(LogEntry::info(progress.summary())))
            .await
        {
            Ok(_) => {
                self.control.remove(job_id);
                info!(
                    job_id = %job_id,
                    status = %terminal,
                    succeeded = progress.succeeded,
                    failed = progress.failed,
                    "batch job finished"
                );
                Ok(Some(RunOutcome::Finished(terminal)))
            }
            // Cancelled (or paused) while the last batch ran: leave it as is.
            Err(JobStoreError::InvalidTransition(_)) => Ok(Some(self.stopped_outcome(job_id).await)),
            Err(e) => Err(e),
        }
    }

    async fn stopped_outcome(&self, job_id: JobId) -> RunOutcome {
        let status = match self.store.get_job(job_id).await {
            Ok(Some(job)) => job.status,
            _ => return RunOutcome::Drained,
        };
        match status {
            JobStatus::Paused => RunOutcome::Paused,
            JobStatus::Cancelled => RunOutcome::Cancelled,
            JobStatus::Processing => RunOutcome::Drained,
            other if other.is_terminal() => RunOutcome::Finished(other),
            other => RunOutcome::NotProcessing(other),
        }
    }

    async fn fatal(
        &self,
        job_id: JobId,
        mut report: RunReport,
        err: JobStoreError,
    ) -> Result<RunReport, ExecutorError> {
        error!(job_id = %job_id, error = %err, "batch run aborted");
        self.abort(job_id, format!("batch processing error: {err}")).await;
        report.outcome = RunOutcome::Aborted;
        Ok(report)
    }

    /// Move the job to `failed` with an error log. Best effort.
    async fn abort(&self, job_id: JobId, message: String) {
        match self
            .store
            .transition_status(job_id, JobStatus::Failed, Some(LogEntry::error(message)))
            .await
        {
            Ok(_) => self.control.remove(job_id),
            Err(e) => error!(job_id = %job_id, error = %e, "failed to mark job as failed"),
        }
    }
}
