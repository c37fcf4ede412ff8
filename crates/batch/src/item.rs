//! Items: the independently tracked units of work inside a batch job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalogsync_core::ItemEntryId;

/// Kind of entity an item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Product,
    Category,
    Marketplace,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Product => "product",
            ItemType::Category => "category",
            ItemType::Marketplace => "marketplace",
        }
    }
}

impl core::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(ItemType::Product),
            "category" => Ok(ItemType::Category),
            "marketplace" => Ok(ItemType::Marketplace),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

impl core::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "completed" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// Outcome reported by an item processor.
///
/// A processor may complete normally and still report `success = false`
/// (e.g. the product no longer exists); such items count as failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ItemResult {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// What a processor gets to see of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub entry_id: ItemEntryId,
    pub item_id: String,
    pub item_type: ItemType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub entry_id: ItemEntryId,
    pub item_id: String,
    pub item_type: ItemType,
    pub status: ItemStatus,
    pub result: Option<ItemResult>,
    pub errors: Vec<String>,
    /// Duration of the last attempt in milliseconds.
    pub processing_time_ms: Option<u64>,
    pub retry_count: u32,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl BatchItem {
    pub fn new(item_id: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            entry_id: ItemEntryId::new(),
            item_id: item_id.into(),
            item_type,
            status: ItemStatus::Pending,
            result: None,
            errors: Vec::new(),
            processing_time_ms: None,
            retry_count: 0,
            last_processed_at: None,
        }
    }

    pub fn to_ref(&self) -> ItemRef {
        ItemRef {
            entry_id: self.entry_id,
            item_id: self.item_id.clone(),
            item_type: self.item_type,
        }
    }

    /// Counts as succeeded for progress purposes.
    pub fn succeeded(&self) -> bool {
        self.status == ItemStatus::Completed && self.result.as_ref().is_some_and(|r| r.success)
    }

    /// Counts as failed for progress purposes.
    pub fn failed(&self) -> bool {
        match self.status {
            ItemStatus::Failed => true,
            ItemStatus::Completed => !self.result.as_ref().is_some_and(|r| r.success),
            _ => false,
        }
    }

    pub fn record_success(&mut self, result: ItemResult, elapsed_ms: u64, at: DateTime<Utc>) {
        self.status = ItemStatus::Completed;
        self.result = Some(result);
        self.processing_time_ms = Some(elapsed_ms);
        self.last_processed_at = Some(at);
    }

    pub fn record_failure(&mut self, message: impl Into<String>, elapsed_ms: u64, at: DateTime<Utc>) {
        let message = message.into();
        self.status = ItemStatus::Failed;
        self.result = Some(ItemResult::rejected(message.clone()));
        self.errors = vec![message];
        self.processing_time_ms = Some(elapsed_ms);
        self.last_processed_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_items_start_pending() {
        let item = BatchItem::new("p-1", ItemType::Product);
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(!item.succeeded());
        assert!(!item.failed());
        assert_eq!(item.retry_count, 0);
    }

    #[test]
    fn completed_without_success_counts_as_failed() {
        let mut item = BatchItem::new("p-1", ItemType::Product);
        item.record_success(ItemResult::rejected("product not found"), 3, Utc::now());
        assert_eq!(item.status, ItemStatus::Completed);
        assert!(item.failed());
        assert!(!item.succeeded());
        assert!(item.errors.is_empty());
    }

    #[test]
    fn failure_records_message_and_result() {
        let mut item = BatchItem::new("p-1", ItemType::Product);
        item.record_failure("boom", 7, Utc::now());
        assert_eq!(item.errors, vec!["boom".to_string()]);
        assert_eq!(item.result.as_ref().map(|r| r.success), Some(false));
        assert_eq!(item.processing_time_ms, Some(7));
        assert!(item.last_processed_at.is_some());
    }
}
