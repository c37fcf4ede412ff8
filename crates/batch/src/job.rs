//! Batch job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalogsync_core::{DomainError, DomainResult, ItemEntryId, JobId, UserId};

use crate::item::BatchItem;
use crate::log::{push_capped, LogEntry};
use crate::params::JobParams;
use crate::progress::Progress;
use crate::status::{JobStatus, TransitionError};

/// Closed set of job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ProductPriceUpdate,
    ProductStockUpdate,
    ProductStatusUpdate,
    ProductMarketplaceSync,
    ProductCategoryUpdate,
    ProductDelete,
    Custom,
}

impl JobKind {
    pub const ALL: [JobKind; 7] = [
        JobKind::ProductPriceUpdate,
        JobKind::ProductStockUpdate,
        JobKind::ProductStatusUpdate,
        JobKind::ProductMarketplaceSync,
        JobKind::ProductCategoryUpdate,
        JobKind::ProductDelete,
        JobKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ProductPriceUpdate => "product_price_update",
            JobKind::ProductStockUpdate => "product_stock_update",
            JobKind::ProductStatusUpdate => "product_status_update",
            JobKind::ProductMarketplaceSync => "product_marketplace_sync",
            JobKind::ProductCategoryUpdate => "product_category_update",
            JobKind::ProductDelete => "product_delete",
            JobKind::Custom => "custom",
        }
    }

    /// Built-in product job types resolve their items from the product catalog.
    pub fn targets_products(&self) -> bool {
        !matches!(self, JobKind::Custom)
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job type: {s}")))
    }
}

/// Informational priority, 1 (default) to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 3;

    pub fn new(value: u8) -> DomainResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::validation(format!(
                "priority must be between {} and {}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u8> for Priority {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

/// Input for [`BatchJob::new`].
#[derive(Debug, Clone)]
pub struct NewBatchJob {
    pub name: String,
    pub description: String,
    pub params: JobParams,
    pub items: Vec<BatchItem>,
    pub priority: Priority,
    pub created_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub name: String,
    pub description: String,
    pub params: JobParams,
    pub status: JobStatus,
    pub items: Vec<BatchItem>,
    pub progress: Progress,
    pub priority: Priority,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
}

impl BatchJob {
    /// Build a `pending` job with every item `pending`.
    pub fn new(input: NewBatchJob) -> DomainResult<Self> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name must not be empty"));
        }
        if input.items.is_empty() {
            return Err(DomainError::validation("a batch job needs at least one item"));
        }

        let now = Utc::now();
        let items: Vec<BatchItem> = input
            .items
            .into_iter()
            .map(|i| BatchItem::new(i.item_id, i.item_type))
            .collect();
        let progress = Progress::compute(&items);

        let mut job = Self {
            id: JobId::new(),
            name,
            description: input.description,
            params: input.params,
            status: JobStatus::Pending,
            items,
            progress,
            priority: input.priority,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            logs: Vec::new(),
        };
        job.add_log(LogEntry::info(format!(
            "batch job created ({} items)",
            job.items.len()
        )));
        Ok(job)
    }

    pub fn kind(&self) -> JobKind {
        self.params.kind()
    }

    /// Move through the state machine, stamping `started_at` / `completed_at`.
    pub fn transition(&mut self, to: JobStatus, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.transition(to)?;
        if to == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(at);
        }
        if to.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
        self.updated_at = at;
        Ok(())
    }

    pub fn add_log(&mut self, entry: LogEntry) {
        push_capped(&mut self.logs, entry);
    }

    pub fn refresh_progress(&mut self) -> Progress {
        self.progress = Progress::compute(&self.items);
        self.progress
    }

    pub fn item(&self, entry_id: ItemEntryId) -> Option<&BatchItem> {
        self.items.iter().find(|i| i.entry_id == entry_id)
    }

    pub fn item_mut(&mut self, entry_id: ItemEntryId) -> Option<&mut BatchItem> {
        self.items.iter_mut().find(|i| i.entry_id == entry_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::item::{ItemStatus, ItemType};
    use crate::log::MAX_LOG_ENTRIES;

    fn new_job(n: usize) -> BatchJob {
        BatchJob::new(NewBatchJob {
            name: "reprice".to_string(),
            description: String::new(),
            params: JobParams::from_parts(JobKind::ProductDelete, json!({})).unwrap(),
            items: (0..n)
                .map(|i| BatchItem::new(format!("p-{i}"), ItemType::Product))
                .collect(),
            priority: Priority::default(),
            created_by: UserId::new(),
        })
        .unwrap()
    }

    #[test]
    fn new_job_is_pending_with_creation_log() {
        let job = new_job(4);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress.total, 4);
        assert!(job.items.iter().all(|i| i.status == ItemStatus::Pending));
        assert_eq!(job.logs.len(), 1);
        assert_eq!(job.logs[0].message, "batch job created (4 items)");
    }

    #[test]
    fn rejects_empty_item_list() {
        let result = BatchJob::new(NewBatchJob {
            name: "x".to_string(),
            description: String::new(),
            params: JobParams::from_parts(JobKind::ProductDelete, json!({})).unwrap(),
            items: Vec::new(),
            priority: Priority::default(),
            created_by: UserId::new(),
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn started_at_is_set_once() {
        let mut job = new_job(1);
        let first = Utc::now();
        job.transition(JobStatus::Processing, first).unwrap();
        job.transition(JobStatus::Paused, Utc::now()).unwrap();
        job.transition(JobStatus::Processing, Utc::now()).unwrap();
        assert_eq!(job.started_at, Some(first));
        assert!(job.completed_at.is_none());

        job.transition(JobStatus::Cancelled, Utc::now()).unwrap();
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn terminal_job_rejects_transition_and_stays_unchanged() {
        let mut job = new_job(1);
        job.transition(JobStatus::Cancelled, Utc::now()).unwrap();
        let before = job.clone();

        let err = job.transition(JobStatus::Processing, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: JobStatus::Cancelled,
                to: JobStatus::Processing
            }
        );
        assert_eq!(job, before);
    }

    #[test]
    fn log_is_capped() {
        let mut job = new_job(1);
        for i in 0..130 {
            job.add_log(LogEntry::info(format!("tick {i}")));
        }
        assert_eq!(job.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(job.logs.last().unwrap().message, "tick 129");
    }

    #[test]
    fn priority_bounds() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(4).is_err());
        assert_eq!(Priority::new(3).unwrap().get(), 3);
        assert!(serde_json::from_value::<Priority>(json!(9)).is_err());
    }

    #[test]
    fn job_kind_parses_wire_names() {
        assert_eq!("custom".parse::<JobKind>().unwrap(), JobKind::Custom);
        assert!("product_rename".parse::<JobKind>().is_err());
    }
}
