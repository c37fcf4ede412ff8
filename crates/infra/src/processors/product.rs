//! Processors that edit or remove catalog products.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use catalogsync_batch::{ItemRef, ItemResult, JobKind, JobParams};

use super::{load_product, mismatch, not_found};
use crate::catalog::ProductCatalog;
use crate::jobs::registry::{ItemProcessor, ProcessorError};

pub struct PriceUpdateProcessor {
    catalog: Arc<dyn ProductCatalog>,
}

impl PriceUpdateProcessor {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ItemProcessor for PriceUpdateProcessor {
    async fn process(
        &self,
        item: &ItemRef,
        params: &JobParams,
    ) -> Result<ItemResult, ProcessorError> {
        let JobParams::ProductPriceUpdate(p) = params else {
            return Err(mismatch(JobKind::ProductPriceUpdate, params));
        };
        let Some(mut product) = load_product(self.catalog.as_ref(), item).await? else {
            return Ok(not_found(item));
        };

        let change = product.apply_price(p.price_type, &p.adjustment);
        self.catalog.save(&product).await?;

        Ok(ItemResult::ok(
            format!("price updated: {} -> {}", change.old_price, change.new_price),
            json!({
                "name": product.name,
                "sku": product.sku,
                "price_type": change.price_type,
                "old_price": change.old_price,
                "new_price": change.new_price,
            }),
        ))
    }
}

pub struct StockUpdateProcessor {
    catalog: Arc<dyn ProductCatalog>,
}

impl StockUpdateProcessor {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ItemProcessor for StockUpdateProcessor {
    async fn process(
        &self,
        item: &ItemRef,
        params: &JobParams,
    ) -> Result<ItemResult, ProcessorError> {
        let JobParams::ProductStockUpdate(p) = params else {
            return Err(mismatch(JobKind::ProductStockUpdate, params));
        };
        let Some(mut product) = load_product(self.catalog.as_ref(), item).await? else {
            return Ok(not_found(item));
        };

        let change = product.apply_stock(&p.adjustment);
        self.catalog.save(&product).await?;

        Ok(ItemResult::ok(
            format!("stock updated: {} -> {}", change.old_stock, change.new_stock),
            json!({
                "name": product.name,
                "sku": product.sku,
                "old_stock": change.old_stock,
                "new_stock": change.new_stock,
                "variants": product.variants.len(),
            }),
        ))
    }
}

pub struct StatusUpdateProcessor {
    catalog: Arc<dyn ProductCatalog>,
}

impl StatusUpdateProcessor {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ItemProcessor for StatusUpdateProcessor {
    async fn process(
        &self,
        item: &ItemRef,
        params: &JobParams,
    ) -> Result<ItemResult, ProcessorError> {
        let JobParams::ProductStatusUpdate(p) = params else {
            return Err(mismatch(JobKind::ProductStatusUpdate, params));
        };
        let Some(mut product) = load_product(self.catalog.as_ref(), item).await? else {
            return Ok(not_found(item));
        };

        let change = product.set_status(p.status);
        let message = if change.is_noop() {
            format!("status already {}", change.new_status)
        } else {
            self.catalog.save(&product).await?;
            format!("status changed: {} -> {}", change.old_status, change.new_status)
        };

        Ok(ItemResult::ok(
            message,
            json!({
                "name": product.name,
                "old_status": change.old_status,
                "new_status": change.new_status,
            }),
        ))
    }
}

pub struct CategoryUpdateProcessor {
    catalog: Arc<dyn ProductCatalog>,
}

impl CategoryUpdateProcessor {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ItemProcessor for CategoryUpdateProcessor {
    async fn process(
        &self,
        item: &ItemRef,
        params: &JobParams,
    ) -> Result<ItemResult, ProcessorError> {
        let JobParams::ProductCategoryUpdate(p) = params else {
            return Err(mismatch(JobKind::ProductCategoryUpdate, params));
        };
        let Some(mut product) = load_product(self.catalog.as_ref(), item).await? else {
            return Ok(not_found(item));
        };

        let change = product.apply_categories(p.action, &p.category_ids);
        self.catalog.save(&product).await?;

        Ok(ItemResult::ok(
            format!("categories updated ({} -> {})", change.old_categories.len(), change.new_categories.len()),
            json!({
                "name": product.name,
                "old_categories": change.old_categories,
                "new_categories": change.new_categories,
            }),
        ))
    }
}

pub struct DeleteProcessor {
    catalog: Arc<dyn ProductCatalog>,
}

impl DeleteProcessor {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ItemProcessor for DeleteProcessor {
    async fn process(
        &self,
        item: &ItemRef,
        params: &JobParams,
    ) -> Result<ItemResult, ProcessorError> {
        if !matches!(params, JobParams::ProductDelete(_)) {
            return Err(mismatch(JobKind::ProductDelete, params));
        }
        let Some(product) = load_product(self.catalog.as_ref(), item).await? else {
            return Ok(not_found(item));
        };

        if !self.catalog.delete(product.id).await? {
            return Ok(not_found(item));
        }

        Ok(ItemResult::ok(
            format!("product deleted: {}", product.name),
            json!({ "name": product.name, "sku": product.sku }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use catalogsync_batch::{BatchItem, ItemType};
    use catalogsync_catalog::{CategoryAction, Product, ProductStatus, Variant};
    use catalogsync_core::CategoryId;

    use super::*;
    use crate::catalog::InMemoryProductCatalog;

    fn item_for(product: &Product) -> ItemRef {
        BatchItem::new(product.id.to_string(), ItemType::Product).to_ref()
    }

    fn params(kind: JobKind, raw: serde_json::Value) -> JobParams {
        JobParams::from_parts(kind, raw).unwrap()
    }

    #[tokio::test]
    async fn price_update_saves_product_and_scales_variants() {
        let mut product = Product::new("Shirt", "SH-1", 10_000);
        product.variants = vec![Variant {
            option_combination: "Blue/M".to_string(),
            price: 12_000,
            stock: 3,
            sku: None,
        }];
        let catalog = Arc::new(InMemoryProductCatalog::with_products([product.clone()]));
        let processor = PriceUpdateProcessor::new(catalog.clone());

        let result = processor
            .process(
                &item_for(&product),
                &params(
                    JobKind::ProductPriceUpdate,
                    json!({ "action": "increase", "percent_value": 10.0 }),
                ),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data["new_price"], 11_000);
        let saved = catalog.get(product.id).await.unwrap().unwrap();
        assert_eq!(saved.regular_price, 11_000);
        assert_eq!(saved.variants[0].price, 13_200);
    }

    #[tokio::test]
    async fn missing_product_is_unsuccessful_not_error() {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let processor = StockUpdateProcessor::new(catalog);
        let ghost = Product::new("Ghost", "GH-1", 1);

        let result = processor
            .process(
                &item_for(&ghost),
                &params(JobKind::ProductStockUpdate, json!({ "action": "set", "value": 5 })),
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.message.starts_with("product not found"));
    }

    #[tokio::test]
    async fn status_update_is_success_when_already_equal() {
        let mut product = Product::new("Mug", "MUG-1", 1);
        product.status = ProductStatus::Active;
        let catalog = Arc::new(InMemoryProductCatalog::with_products([product.clone()]));
        let processor = StatusUpdateProcessor::new(catalog);

        let result = processor
            .process(
                &item_for(&product),
                &params(JobKind::ProductStatusUpdate, json!({ "status": "active" })),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.message, "status already active");
    }

    #[tokio::test]
    async fn category_add_merges() {
        let existing = CategoryId::new();
        let added = CategoryId::new();
        let mut product = Product::new("Mug", "MUG-1", 1);
        product.categories = vec![existing];
        let catalog = Arc::new(InMemoryProductCatalog::with_products([product.clone()]));
        let processor = CategoryUpdateProcessor::new(catalog.clone());

        processor
            .process(
                &item_for(&product),
                &params(
                    JobKind::ProductCategoryUpdate,
                    json!({ "action": CategoryAction::Add, "category_ids": [existing, added] }),
                ),
            )
            .await
            .unwrap();

        let saved = catalog.get(product.id).await.unwrap().unwrap();
        assert_eq!(saved.categories, vec![existing, added]);
    }

    #[tokio::test]
    async fn delete_reports_name_and_sku() {
        let product = Product::new("Mug", "MUG-1", 1);
        let catalog = Arc::new(InMemoryProductCatalog::with_products([product.clone()]));
        let processor = DeleteProcessor::new(catalog.clone());

        let result = processor
            .process(&item_for(&product), &params(JobKind::ProductDelete, json!({})))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data, json!({ "name": "Mug", "sku": "MUG-1" }));
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn wrong_params_are_an_error() {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let processor = DeleteProcessor::new(catalog);
        let product = Product::new("Mug", "MUG-1", 1);

        let err = processor
            .process(
                &item_for(&product),
                &params(JobKind::ProductStatusUpdate, json!({ "status": "draft" })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ParamsMismatch { .. }));
    }
}
