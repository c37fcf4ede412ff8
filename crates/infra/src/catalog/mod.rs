//! Product catalog access used by job creation and the built-in processors.

pub mod in_memory;

use async_trait::async_trait;

use catalogsync_catalog::{Product, ProductFilter};
use catalogsync_core::ProductId;

pub use in_memory::InMemoryProductCatalog;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Product repository.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;

    /// Insert or replace.
    async fn save(&self, product: &Product) -> Result<(), CatalogError>;

    /// Returns whether a product was removed.
    async fn delete(&self, id: ProductId) -> Result<bool, CatalogError>;

    /// Ids of every product matching `filter`, in catalog order.
    async fn find_ids(&self, filter: &ProductFilter) -> Result<Vec<ProductId>, CatalogError>;
}
