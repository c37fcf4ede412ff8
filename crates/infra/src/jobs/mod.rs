//! Batch job engine: storage, processor registry, job control and executor.
//!
//! ## Components
//!
//! - `JobStore`: persistence for jobs, items and logs (in-memory or Postgres)
//! - `ProcessorRegistry`: job type -> `ItemProcessor`, fixed at startup
//! - `JobControl`: per-job status cells observed by running executors
//! - `JobExecutor`: concurrency-limited loop driving one job to completion
//! - `BatchJobService`: creation, status changes and queries with ownership checks

pub mod control;
pub mod executor;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod registry;
pub mod service;
pub mod store;

pub use control::{JobControl, JobSignal, RunnerGuard};
pub use executor::{ExecutorConfig, ExecutorError, JobExecutor, RunOutcome, RunReport};
#[cfg(feature = "postgres")]
pub use postgres::PostgresJobStore;
pub use registry::{ItemProcessor, ProcessorError, ProcessorKey, ProcessorRegistry};
pub use service::{
    BatchJobError, BatchJobService, CreateBatchJob, ItemSource, ItemView, Principal, ProductInfo,
    ITEM_PAGE_SIZE, JOB_PAGE_SIZE,
};
pub use store::{
    InMemoryJobStore, ItemFilter, ItemUpdate, JobFields, JobFilter, JobStore, JobStoreError,
    JobSummary, Page, Pagination,
};
