//! Built-in item processors for the product job types.
//!
//! Each processor loads the product through the [`ProductCatalog`], applies
//! the edit with the catalog domain rules and saves it back. A product that no
//! longer exists is reported as an unsuccessful outcome, not an error.

pub mod marketplace_sync;
pub mod product;

use std::sync::Arc;

use catalogsync_batch::{ItemRef, JobKind, JobParams};
use catalogsync_catalog::Product;
use catalogsync_core::ProductId;

use crate::catalog::ProductCatalog;
use crate::jobs::registry::{ProcessorError, ProcessorRegistry};
use crate::marketplace::MarketplaceDirectory;

pub use marketplace_sync::MarketplaceSyncProcessor;
pub use product::{
    CategoryUpdateProcessor, DeleteProcessor, PriceUpdateProcessor, StatusUpdateProcessor,
    StockUpdateProcessor,
};

/// Register a processor for every built-in job type.
pub fn register_builtin(
    registry: &mut ProcessorRegistry,
    catalog: Arc<dyn ProductCatalog>,
    marketplaces: Arc<MarketplaceDirectory>,
) {
    registry.register_builtin(
        JobKind::ProductPriceUpdate,
        Arc::new(PriceUpdateProcessor::new(catalog.clone())),
    );
    registry.register_builtin(
        JobKind::ProductStockUpdate,
        Arc::new(StockUpdateProcessor::new(catalog.clone())),
    );
    registry.register_builtin(
        JobKind::ProductStatusUpdate,
        Arc::new(StatusUpdateProcessor::new(catalog.clone())),
    );
    registry.register_builtin(
        JobKind::ProductCategoryUpdate,
        Arc::new(CategoryUpdateProcessor::new(catalog.clone())),
    );
    registry.register_builtin(
        JobKind::ProductDelete,
        Arc::new(DeleteProcessor::new(catalog.clone())),
    );
    registry.register_builtin(
        JobKind::ProductMarketplaceSync,
        Arc::new(MarketplaceSyncProcessor::new(catalog, marketplaces)),
    );
}

/// Load the product an item points at. `None` if the id is malformed or unknown.
pub(crate) async fn load_product(
    catalog: &dyn ProductCatalog,
    item: &ItemRef,
) -> Result<Option<Product>, ProcessorError> {
    let Ok(id) = item.item_id.parse::<ProductId>() else {
        return Ok(None);
    };
    Ok(catalog.get(id).await?)
}

pub(crate) fn not_found(item: &ItemRef) -> catalogsync_batch::ItemResult {
    catalogsync_batch::ItemResult::rejected(format!("product not found: {}", item.item_id))
}

pub(crate) fn mismatch(expected: JobKind, params: &JobParams) -> ProcessorError {
    ProcessorError::ParamsMismatch {
        expected,
        actual: params.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryProductCatalog;

    #[test]
    fn every_builtin_job_type_gets_a_processor() {
        let mut registry = ProcessorRegistry::new();
        register_builtin(
            &mut registry,
            Arc::new(InMemoryProductCatalog::new()),
            Arc::new(MarketplaceDirectory::new()),
        );

        assert!(registry.missing_builtins().is_empty());
        assert_eq!(registry.len(), 6);
    }
}
