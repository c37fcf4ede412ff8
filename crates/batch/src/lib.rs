//! Batch job domain module.
//!
//! A batch job is one logical unit of bulk work ("reprice 5,000 products")
//! decomposed into independently tracked items. This crate holds the job and
//! item records, the job status state machine, the progress aggregator, the
//! capped job log and the typed per-job-type parameters.
//!
//! Everything here is deterministic and IO-free; scheduling, storage and the
//! item processors live in `catalogsync-infra`.

pub mod item;
pub mod job;
pub mod log;
pub mod params;
pub mod progress;
pub mod status;

pub use item::{BatchItem, ItemRef, ItemResult, ItemStatus, ItemType};
pub use job::{BatchJob, JobKind, NewBatchJob, Priority};
pub use log::{push_capped, LogEntry, LogLevel, MAX_LOG_ENTRIES};
pub use params::{
    CategoryUpdateParams, CustomParams, DeleteParams, JobParams, MarketplaceSyncParams,
    ParamsError, PriceUpdateParams, StatusUpdateParams, StockUpdateParams,
};
pub use progress::Progress;
pub use status::{JobStatus, TransitionError};
