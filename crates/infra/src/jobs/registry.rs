//! Item processor contract and registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use catalogsync_batch::{ItemRef, ItemResult, JobKind, JobParams};

use crate::catalog::CatalogError;
use crate::marketplace::MarketplaceError;

/// Error raised by a processor. The item is recorded as failed with this message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    #[error("{0}")]
    Failed(String),
    #[error("unexpected params: expected {expected}, got {actual}")]
    ParamsMismatch { expected: JobKind, actual: JobKind },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),
}

impl ProcessorError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Transformation applied to a single item of a batch job.
///
/// A processor reports domain-level misses (unknown product, unsupported
/// marketplace) as `Ok` with `success = false`; `Err` is reserved for failures
/// of the operation itself.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &ItemRef, params: &JobParams)
        -> Result<ItemResult, ProcessorError>;
}

/// Registry key: a built-in job type or a named custom processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessorKey {
    Builtin(JobKind),
    Custom(String),
}

impl ProcessorKey {
    pub fn for_params(params: &JobParams) -> Self {
        match params.custom_processor() {
            Some(name) => ProcessorKey::Custom(name.to_string()),
            None => ProcessorKey::Builtin(params.kind()),
        }
    }
}

impl fmt::Display for ProcessorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKey::Builtin(kind) => write!(f, "{kind}"),
            ProcessorKey::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Maps job types to processors. Populated at startup, read-only afterwards.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<ProcessorKey, Arc<dyn ItemProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: ProcessorKey, processor: Arc<dyn ItemProcessor>) {
        self.processors.insert(key, processor);
    }

    pub fn register_builtin(&mut self, kind: JobKind, processor: Arc<dyn ItemProcessor>) {
        self.register(ProcessorKey::Builtin(kind), processor);
    }

    pub fn register_custom(&mut self, name: impl Into<String>, processor: Arc<dyn ItemProcessor>) {
        self.register(ProcessorKey::Custom(name.into()), processor);
    }

    pub fn resolve(&self, params: &JobParams) -> Option<Arc<dyn ItemProcessor>> {
        self.processors
            .get(&ProcessorKey::for_params(params))
            .cloned()
    }

    pub fn contains(&self, key: &ProcessorKey) -> bool {
        self.processors.contains_key(key)
    }

    /// Built-in job types that have no processor yet.
    pub fn missing_builtins(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| *kind != JobKind::Custom)
            .filter(|kind| !self.contains(&ProcessorKey::Builtin(*kind)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.processors.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("ProcessorRegistry").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo;

    #[async_trait]
    impl ItemProcessor for Echo {
        async fn process(
            &self,
            item: &ItemRef,
            _params: &JobParams,
        ) -> Result<ItemResult, ProcessorError> {
            Ok(ItemResult::ok(item.item_id.clone(), json!(null)))
        }
    }

    #[test]
    fn resolves_builtin_and_custom_keys() {
        let mut registry = ProcessorRegistry::new();
        registry.register_builtin(JobKind::ProductDelete, Arc::new(Echo));
        registry.register_custom("reindex", Arc::new(Echo));

        let delete = JobParams::from_parts(JobKind::ProductDelete, json!({})).unwrap();
        let reindex =
            JobParams::from_parts(JobKind::Custom, json!({ "processor": "reindex" })).unwrap();
        let unknown =
            JobParams::from_parts(JobKind::Custom, json!({ "processor": "export" })).unwrap();
        let status =
            JobParams::from_parts(JobKind::ProductStatusUpdate, json!({ "status": "active" }))
                .unwrap();

        assert!(registry.resolve(&delete).is_some());
        assert!(registry.resolve(&reindex).is_some());
        assert!(registry.resolve(&unknown).is_none());
        assert!(registry.resolve(&status).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn reports_builtins_without_a_processor() {
        let mut registry = ProcessorRegistry::new();
        assert_eq!(registry.missing_builtins().len(), 6);

        registry.register_builtin(JobKind::ProductDelete, Arc::new(Echo));
        registry.register_custom("reindex", Arc::new(Echo));
        let missing = registry.missing_builtins();

        assert_eq!(missing.len(), 5);
        assert!(!missing.contains(&JobKind::ProductDelete));
        assert!(!missing.contains(&JobKind::Custom));
        assert!(registry.contains(&ProcessorKey::Custom("reindex".into())));
    }

    #[test]
    fn key_display() {
        assert_eq!(
            ProcessorKey::Builtin(JobKind::ProductPriceUpdate).to_string(),
            "product_price_update"
        );
        assert_eq!(ProcessorKey::Custom("x".into()).to_string(), "custom:x");
    }
}
