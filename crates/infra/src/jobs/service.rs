//! Batch job application service.
//!
//! Entry point used by the HTTP layer: creation with item resolution, status
//! changes, queries and deletion, all subject to the ownership rule (admins see
//! every job, everyone else only the jobs they created).

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use catalogsync_batch::{
    BatchItem, BatchJob, ItemType, JobKind, JobParams, JobStatus, LogEntry, NewBatchJob,
    ParamsError, Priority, TransitionError,
};
use catalogsync_catalog::ProductFilter;
use catalogsync_core::{DomainError, JobId, ProductId, UserId};

use super::control::JobControl;
use super::executor::JobExecutor;
use super::store::{ItemFilter, JobFilter, JobStore, JobStoreError, JobSummary, Page, Pagination};
use crate::catalog::{CatalogError, ProductCatalog};

/// Default page sizes for job and item listings.
pub const JOB_PAGE_SIZE: u32 = 10;
pub const ITEM_PAGE_SIZE: u32 = 50;

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Principal {
    pub fn can_access(&self, job_owner: UserId) -> bool {
        self.is_admin || self.user_id == job_owner
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchJobError {
    #[error("batch job not found")]
    NotFound,
    #[error("not allowed to access this batch job")]
    Forbidden,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    InvalidTransition(TransitionError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(JobStoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<JobStoreError> for BatchJobError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(_) => BatchJobError::NotFound,
            JobStoreError::InvalidTransition(t) => BatchJobError::InvalidTransition(t),
            JobStoreError::Conflict(msg) => BatchJobError::Conflict(msg),
            other => BatchJobError::Store(other),
        }
    }
}

impl From<DomainError> for BatchJobError {
    fn from(err: DomainError) -> Self {
        BatchJobError::Validation(err.to_string())
    }
}

impl From<ParamsError> for BatchJobError {
    fn from(err: ParamsError) -> Self {
        BatchJobError::Validation(err.to_string())
    }
}

/// Where the items of a new job come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSource {
    ProductIds(Vec<ProductId>),
    Filter(ProductFilter),
    Items(Vec<(String, ItemType)>),
}

#[derive(Debug, Clone)]
pub struct CreateBatchJob {
    pub name: String,
    pub description: String,
    pub kind: JobKind,
    pub params: Value,
    pub source: ItemSource,
    pub priority: Option<u8>,
    pub start_immediately: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub name: String,
    pub sku: String,
}

/// Item with the product it refers to, when that product still exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: BatchItem,
    pub product: Option<ProductInfo>,
}

pub struct BatchJobService {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn ProductCatalog>,
    control: Arc<JobControl>,
    executor: Arc<JobExecutor>,
}

impl BatchJobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn ProductCatalog>,
        control: Arc<JobControl>,
        executor: Arc<JobExecutor>,
    ) -> Self {
        Self {
            store,
            catalog,
            control,
            executor,
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: CreateBatchJob,
    ) -> Result<BatchJob, BatchJobError> {
        let params = JobParams::from_parts(input.kind, input.params)?;
        let items = self.resolve_items(input.kind, input.source).await?;
        let priority = match input.priority {
            Some(p) => Priority::new(p)?,
            None => Priority::default(),
        };

        let job = BatchJob::new(NewBatchJob {
            name: input.name,
            description: input.description,
            params,
            items,
            priority,
            created_by: principal.user_id,
        })?;
        self.store.create_job(&job).await?;
        info!(
            job_id = %job.id,
            job_type = %job.kind(),
            items = job.items.len(),
            created_by = %principal.user_id,
            "batch job created"
        );

        if input.start_immediately {
            self.change_status(job.id, JobStatus::Processing).await?;
        }
        self.load(job.id).await
    }

    async fn resolve_items(
        &self,
        kind: JobKind,
        source: ItemSource,
    ) -> Result<Vec<BatchItem>, BatchJobError> {
        let items: Vec<BatchItem> = match (kind.targets_products(), source) {
            (true, ItemSource::ProductIds(ids)) => ids
                .into_iter()
                .map(|id| BatchItem::new(id.to_string(), ItemType::Product))
                .collect(),
            (true, ItemSource::Filter(filter)) => self
                .catalog
                .find_ids(&filter)
                .await?
                .into_iter()
                .map(|id| BatchItem::new(id.to_string(), ItemType::Product))
                .collect(),
            (false, ItemSource::Items(items)) => items
                .into_iter()
                .map(|(id, item_type)| BatchItem::new(id, item_type))
                .collect(),
            (true, ItemSource::Items(_)) => {
                return Err(BatchJobError::Validation(format!(
                    "{kind} jobs take product_ids or a filter"
                )));
            }
            (false, _) => {
                return Err(BatchJobError::Validation(
                    "custom jobs take an explicit item list".to_string(),
                ));
            }
        };
        if items.is_empty() {
            return Err(BatchJobError::Validation(
                "no items to process".to_string(),
            ));
        }
        Ok(items)
    }

    /// Request a status change on behalf of a caller.
    ///
    /// Only `processing` (start/resume), `paused` and `cancelled` can be requested.
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: JobId,
        target: JobStatus,
    ) -> Result<BatchJob, BatchJobError> {
        if !matches!(
            target,
            JobStatus::Processing | JobStatus::Paused | JobStatus::Cancelled
        ) {
            return Err(BatchJobError::Validation(format!(
                "status {target} cannot be requested"
            )));
        }
        self.authorize(principal, id).await?;
        self.change_status(id, target).await?;
        self.load(id).await
    }

    async fn change_status(&self, id: JobId, target: JobStatus) -> Result<(), BatchJobError> {
        let current = self.load(id).await?.status;
        let message = match (current, target) {
            (JobStatus::Paused, JobStatus::Processing) => "batch processing resumed",
            (_, JobStatus::Processing) => "batch processing started",
            (_, JobStatus::Paused) => "batch processing paused",
            _ => "batch job cancelled",
        };

        let from = self
            .store
            .transition_status(id, target, Some(LogEntry::info(message)))
            .await?;
        if target.is_terminal() {
            self.control.remove(id);
        } else {
            self.control.publish(id, target);
        }
        info!(job_id = %id, from = %from, to = %target, "batch job status changed");

        if target == JobStatus::Processing {
            self.executor.spawn(id);
        }
        Ok(())
    }

    pub async fn get(&self, principal: &Principal, id: JobId) -> Result<BatchJob, BatchJobError> {
        let job = self.load(id).await?;
        if !principal.can_access(job.created_by) {
            return Err(BatchJobError::Forbidden);
        }
        Ok(job)
    }

    pub async fn list_jobs(
        &self,
        principal: &Principal,
        mut filter: JobFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<JobSummary>, BatchJobError> {
        if !principal.is_admin {
            filter.created_by = Some(principal.user_id);
        }
        let pagination = Pagination::new(page, page_size, JOB_PAGE_SIZE);
        Ok(self.store.list_jobs(&filter, pagination).await?)
    }

    pub async fn list_items(
        &self,
        principal: &Principal,
        id: JobId,
        filter: ItemFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<ItemView>, BatchJobError> {
        self.authorize(principal, id).await?;
        let pagination = Pagination::new(page, page_size, ITEM_PAGE_SIZE);
        let items = self.store.list_items(id, filter, pagination).await?;

        let mut views = Vec::with_capacity(items.items.len());
        for item in &items.items {
            views.push(ItemView {
                item: item.clone(),
                product: self.product_info(item).await?,
            });
        }
        Ok(Page {
            items: views,
            page: items.page,
            pages: items.pages,
            total: items.total,
        })
    }

    async fn product_info(&self, item: &BatchItem) -> Result<Option<ProductInfo>, BatchJobError> {
        if item.item_type != ItemType::Product {
            return Ok(None);
        }
        let Ok(id) = item.item_id.parse::<ProductId>() else {
            return Ok(None);
        };
        Ok(self.catalog.get(id).await?.map(|p| ProductInfo {
            name: p.name,
            sku: p.sku,
        }))
    }

    pub async fn list_logs(
        &self,
        principal: &Principal,
        id: JobId,
    ) -> Result<Vec<LogEntry>, BatchJobError> {
        self.authorize(principal, id).await?;
        Ok(self.store.list_logs(id).await?)
    }

    /// Admin only; refused while the job is processing.
    pub async fn delete(&self, principal: &Principal, id: JobId) -> Result<(), BatchJobError> {
        if !principal.is_admin {
            return Err(BatchJobError::Forbidden);
        }
        self.store.delete_job(id).await?;
        self.control.remove(id);
        info!(job_id = %id, deleted_by = %principal.user_id, "batch job deleted");
        Ok(())
    }

    async fn load(&self, id: JobId) -> Result<BatchJob, BatchJobError> {
        self.store
            .get_job(id)
            .await?
            .ok_or(BatchJobError::NotFound)
    }

    async fn authorize(&self, principal: &Principal, id: JobId) -> Result<(), BatchJobError> {
        let job = self.load(id).await?;
        if principal.can_access(job.created_by) {
            Ok(())
        } else {
            Err(BatchJobError::Forbidden)
        }
    }
}
