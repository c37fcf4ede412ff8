use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use catalogsync_catalog::{Product, ProductFilter};
use catalogsync_core::ProductId;

use super::{CatalogError, ProductCatalog};

/// In-memory catalog for tests/dev. Ordered by id, which is creation order for UUIDv7 ids.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CatalogError {
    CatalogError::Unavailable("catalog lock poisoned".to_string())
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.products.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn save(&self, product: &Product) -> Result<(), CatalogError> {
        self.products
            .write()
            .map_err(poisoned)?
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn delete(&self, id: ProductId) -> Result<bool, CatalogError> {
        Ok(self.products.write().map_err(poisoned)?.remove(&id).is_some())
    }

    async fn find_ids(&self, filter: &ProductFilter) -> Result<Vec<ProductId>, CatalogError> {
        Ok(self
            .products
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|p| filter.matches(p))
            .map(|p| p.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_catalog::ProductStatus;

    #[tokio::test]
    async fn find_ids_applies_filter() {
        let mut active = Product::new("Active mug", "MUG-1", 1_000);
        active.status = ProductStatus::Active;
        let draft = Product::new("Draft mug", "MUG-2", 1_000);
        let catalog = InMemoryProductCatalog::with_products([active.clone(), draft]);

        let filter = ProductFilter {
            status: Some(ProductStatus::Active),
            ..ProductFilter::default()
        };
        assert_eq!(catalog.find_ids(&filter).await.unwrap(), vec![active.id]);
        assert_eq!(catalog.find_ids(&ProductFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn save_and_delete() {
        let catalog = InMemoryProductCatalog::new();
        let product = Product::new("Mug", "MUG-1", 1_000);
        catalog.save(&product).await.unwrap();
        assert_eq!(catalog.get(product.id).await.unwrap(), Some(product.clone()));
        assert!(catalog.delete(product.id).await.unwrap());
        assert!(!catalog.delete(product.id).await.unwrap());
        assert!(catalog.is_empty());
    }
}
