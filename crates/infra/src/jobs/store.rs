//! Batch job storage.
//!
//! Every operation is atomic at single-job or single-item granularity. Item
//! outcome writes are targeted by [`ItemEntryId`] so concurrent workers never
//! overwrite each other through whole-document saves.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalogsync_batch::{
    push_capped, BatchItem, BatchJob, ItemRef, ItemResult, ItemStatus, JobKind, JobStatus,
    LogEntry, Priority, Progress, TransitionError,
};
use catalogsync_core::{ItemEntryId, JobId, UserId};

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("item not found: {0}")]
    ItemNotFound(ItemEntryId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl<T> From<PoisonError<T>> for JobStoreError {
    fn from(_: PoisonError<T>) -> Self {
        JobStoreError::Storage("job store lock poisoned".to_string())
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub const MAX_PAGE_SIZE: u32 = 500;

    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(default_size)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None, 50)
    }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        let pages = total.div_ceil(pagination.page_size as u64) as u32;
        Self {
            items,
            page: pagination.page,
            pages,
            total,
        }
    }

    /// Slice an already-filtered, already-sorted collection.
    pub fn slice(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.page_size as usize)
            .collect();
        Self::new(items, pagination, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            pages: self.pages,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
    pub created_by: Option<UserId>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl JobFilter {
    pub fn matches(&self, job: &JobSummary) -> bool {
        self.kind.is_none_or(|k| job.kind == k)
            && self.status.is_none_or(|s| job.status == s)
            && self.created_by.is_none_or(|u| job.created_by == u)
            && self.created_from.is_none_or(|from| job.created_at >= from)
            && self.created_to.is_none_or(|to| job.created_at <= to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
}

/// Job record without items and logs, used for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub description: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: Progress,
    pub priority: Priority,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&BatchJob> for JobSummary {
    fn from(job: &BatchJob) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            description: job.description.clone(),
            kind: job.kind(),
            status: job.status,
            progress: job.progress,
            priority: job.priority,
            created_by: job.created_by,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// Partial update of job-level fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub progress: Option<Progress>,
}

impl JobFields {
    pub fn progress(progress: Progress) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }
}

/// Targeted item write.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    Succeeded {
        result: ItemResult,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    Failed {
        message: String,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
}

impl ItemUpdate {
    /// Apply to an item that is currently `processing`.
    pub fn apply(self, item: &mut BatchItem) -> Result<(), JobStoreError> {
        if item.status != ItemStatus::Processing {
            return Err(JobStoreError::Conflict(format!(
                "item {} is {}, not processing",
                item.entry_id,
                item.status.as_str()
            )));
        }
        match self {
            ItemUpdate::Succeeded {
                result,
                elapsed_ms,
                at,
            } => item.record_success(result, elapsed_ms, at),
            ItemUpdate::Failed {
                message,
                elapsed_ms,
                at,
            } => item.record_failure(message, elapsed_ms, at),
        }
        Ok(())
    }
}

/// Batch job store abstraction.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &BatchJob) -> Result<(), JobStoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>, JobStoreError>;

    /// Jobs matching `filter`, newest first.
    async fn list_jobs(
        &self,
        filter: &JobFilter,
        pagination: Pagination,
    ) -> Result<Page<JobSummary>, JobStoreError>;

    async fn update_job_fields(&self, id: JobId, fields: JobFields) -> Result<(), JobStoreError>;

    /// Check-and-set through the state machine, stamping timestamps and
    /// appending `log` in the same write. Returns the previous status.
    async fn transition_status(
        &self,
        id: JobId,
        to: JobStatus,
        log: Option<LogEntry>,
    ) -> Result<JobStatus, JobStoreError>;

    /// Mark up to `limit` pending items (in insertion order) as `processing`
    /// and return them. Returns nothing unless the job is `processing`.
    async fn claim_pending_items(
        &self,
        id: JobId,
        limit: usize,
    ) -> Result<Vec<ItemRef>, JobStoreError>;

    async fn update_item_fields(
        &self,
        id: JobId,
        entry_id: ItemEntryId,
        update: ItemUpdate,
    ) -> Result<(), JobStoreError>;

    async fn list_items(
        &self,
        id: JobId,
        filter: ItemFilter,
        pagination: Pagination,
    ) -> Result<Page<BatchItem>, JobStoreError>;

    async fn append_log(&self, id: JobId, entry: LogEntry) -> Result<(), JobStoreError>;

    async fn list_logs(&self, id: JobId) -> Result<Vec<LogEntry>, JobStoreError>;

    /// Remove a job. Refused while the job is `processing`.
    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError>;

    /// Recompute progress from the persisted items and store it.
    async fn refresh_progress(&self, id: JobId) -> Result<Progress, JobStoreError> {
        let job = self
            .get_job(id)
            .await?
            .ok_or(JobStoreError::NotFound(id))?;
        let progress = Progress::compute(&job.items);
        self.update_job_fields(id, JobFields::progress(progress))
            .await?;
        Ok(progress)
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, BatchJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_job<R>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut BatchJob) -> Result<R, JobStoreError>,
    ) -> Result<R, JobStoreError> {
        let mut jobs = self.jobs.write()?;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        f(job)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &BatchJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>, JobStoreError> {
        Ok(self.jobs.read()?.get(&id).cloned())
    }

    async fn list_jobs(
        &self,
        filter: &JobFilter,
        pagination: Pagination,
    ) -> Result<Page<JobSummary>, JobStoreError> {
        let jobs = self.jobs.read()?;
        let mut matching: Vec<JobSummary> = jobs
            .values()
            .map(JobSummary::from)
            .filter(|j| filter.matches(j))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::slice(matching, pagination))
    }

    async fn update_job_fields(&self, id: JobId, fields: JobFields) -> Result<(), JobStoreError> {
        self.with_job(id, |job| {
            if let Some(name) = fields.name {
                job.name = name;
            }
            if let Some(description) = fields.description {
                job.description = description;
            }
            if let Some(priority) = fields.priority {
                job.priority = priority;
            }
            if let Some(progress) = fields.progress {
                job.progress = progress;
            }
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn transition_status(
        &self,
        id: JobId,
        to: JobStatus,
        log: Option<LogEntry>,
    ) -> Result<JobStatus, JobStoreError> {
        self.with_job(id, |job| {
            let from = job.status;
            job.transition(to, Utc::now())?;
            if let Some(entry) = log {
                job.add_log(entry);
            }
            Ok(from)
        })
    }

    async fn claim_pending_items(
        &self,
        id: JobId,
        limit: usize,
    ) -> Result<Vec<ItemRef>, JobStoreError> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Processing {
                return Ok(Vec::new());
            }
            let claimed: Vec<ItemRef> = job
                .items
                .iter_mut()
                .filter(|i| i.status == ItemStatus::Pending)
                .take(limit)
                .map(|i| {
                    i.status = ItemStatus::Processing;
                    i.to_ref()
                })
                .collect();
            Ok(claimed)
        })
    }

    async fn update_item_fields(
        &self,
        id: JobId,
        entry_id: ItemEntryId,
        update: ItemUpdate,
    ) -> Result<(), JobStoreError> {
        self.with_job(id, |job| {
            let item = job
                .item_mut(entry_id)
                .ok_or(JobStoreError::ItemNotFound(entry_id))?;
            update.apply(item)
        })
    }

    async fn list_items(
        &self,
        id: JobId,
        filter: ItemFilter,
        pagination: Pagination,
    ) -> Result<Page<BatchItem>, JobStoreError> {
        let jobs = self.jobs.read()?;
        let job = jobs.get(&id).ok_or(JobStoreError::NotFound(id))?;
        let matching: Vec<BatchItem> = job
            .items
            .iter()
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        Ok(Page::slice(matching, pagination))
    }

    async fn append_log(&self, id: JobId, entry: LogEntry) -> Result<(), JobStoreError> {
        self.with_job(id, |job| {
            push_capped(&mut job.logs, entry);
            Ok(())
        })
    }

    async fn list_logs(&self, id: JobId) -> Result<Vec<LogEntry>, JobStoreError> {
        let jobs = self.jobs.read()?;
        let job = jobs.get(&id).ok_or(JobStoreError::NotFound(id))?;
        Ok(job.logs.clone())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write()?;
        match jobs.get(&id) {
            None => Err(JobStoreError::NotFound(id)),
            Some(job) if job.status == JobStatus::Processing => Err(JobStoreError::Conflict(
                "cannot delete a job while it is processing".to_string(),
            )),
            Some(_) => {
                jobs.remove(&id);
                Ok(())
            }
        }
    }
}
