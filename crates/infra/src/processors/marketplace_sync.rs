use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use catalogsync_batch::{ItemRef, ItemResult, JobKind, JobParams};
use catalogsync_catalog::{ListingStatus, MarketplaceListing};

use super::{load_product, mismatch, not_found};
use crate::catalog::ProductCatalog;
use crate::jobs::registry::{ItemProcessor, ProcessorError};
use crate::marketplace::MarketplaceDirectory;

/// Pushes a product to a marketplace and records the listing on the product.
///
/// The item succeeds only when the marketplace reports the listing as `active`.
pub struct MarketplaceSyncProcessor {
    catalog: Arc<dyn ProductCatalog>,
    marketplaces: Arc<MarketplaceDirectory>,
}

impl MarketplaceSyncProcessor {
    pub fn new(catalog: Arc<dyn ProductCatalog>, marketplaces: Arc<MarketplaceDirectory>) -> Self {
        Self {
            catalog,
            marketplaces,
        }
    }
}

#[async_trait]
impl ItemProcessor for MarketplaceSyncProcessor {
    async fn process(
        &self,
        item: &ItemRef,
        params: &JobParams,
    ) -> Result<ItemResult, ProcessorError> {
        let JobParams::ProductMarketplaceSync(p) = params else {
            return Err(mismatch(JobKind::ProductMarketplaceSync, params));
        };
        let Some(mut product) = load_product(self.catalog.as_ref(), item).await? else {
            return Ok(not_found(item));
        };
        let Some(marketplace) = self.marketplaces.marketplace(p.marketplace_id) else {
            return Ok(ItemResult::rejected(format!(
                "marketplace not found: {}",
                p.marketplace_id
            )));
        };
        let Some(client) = self.marketplaces.client(&marketplace.code) else {
            return Ok(ItemResult::rejected(format!(
                "unsupported marketplace: {}",
                marketplace.code
            )));
        };

        let push = client
            .push_product(&marketplace, &product, p.account_id.as_deref())
            .await?;

        product.upsert_listing(MarketplaceListing {
            marketplace_id: marketplace.id,
            external_product_id: push.external_product_id.clone(),
            status: push.status,
            last_sync_date: Utc::now(),
            errors: push.errors.clone(),
        });
        self.catalog.save(&product).await?;

        let data = json!({
            "marketplace_name": marketplace.name,
            "status": push.status,
            "external_product_id": push.external_product_id,
            "errors": push.errors,
        });
        if push.status == ListingStatus::Active {
            Ok(ItemResult::ok(
                format!("product synced to {}", marketplace.name),
                data,
            ))
        } else {
            let reason = if push.errors.is_empty() {
                "unknown error".to_string()
            } else {
                push.errors.join(", ")
            };
            Ok(ItemResult {
                success: false,
                message: format!("product sync failed: {reason}"),
                data,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use catalogsync_batch::{BatchItem, ItemType};
    use catalogsync_catalog::{Product, ProductStatus};
    use catalogsync_core::MarketplaceId;

    use super::*;
    use crate::catalog::InMemoryProductCatalog;
    use crate::marketplace::{InMemoryMarketplace, Marketplace};

    fn sync_params(id: MarketplaceId) -> JobParams {
        JobParams::from_parts(
            JobKind::ProductMarketplaceSync,
            json!({ "marketplace_id": id }),
        )
        .unwrap()
    }

    fn setup(product: &Product) -> (Arc<InMemoryProductCatalog>, MarketplaceSyncProcessor, Marketplace) {
        let catalog = Arc::new(InMemoryProductCatalog::with_products([product.clone()]));
        let directory = MarketplaceDirectory::new().with_client("naver", Arc::new(InMemoryMarketplace::new()));
        let naver = Marketplace::new("Naver SmartStore", "naver");
        directory.add_marketplace(naver.clone());
        let processor = MarketplaceSyncProcessor::new(catalog.clone(), Arc::new(directory));
        (catalog, processor, naver)
    }

    #[tokio::test]
    async fn active_listing_is_recorded_on_product() {
        let mut product = Product::new("Mug", "MUG-1", 1_000);
        product.status = ProductStatus::Active;
        let (catalog, processor, naver) = setup(&product);
        let item = BatchItem::new(product.id.to_string(), ItemType::Product).to_ref();

        let result = processor.process(&item, &sync_params(naver.id)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.data["external_product_id"], "naver-MUG-1");
        let saved = catalog.get(product.id).await.unwrap().unwrap();
        let listing = saved.listing(naver.id).unwrap();
        assert_eq!(listing.status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn rejected_listing_is_unsuccessful_but_recorded() {
        let product = Product::new("Mug", "MUG-1", 1_000);
        let (catalog, processor, naver) = setup(&product);
        let item = BatchItem::new(product.id.to_string(), ItemType::Product).to_ref();

        let result = processor.process(&item, &sync_params(naver.id)).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.message, "product sync failed: product status is draft");
        let saved = catalog.get(product.id).await.unwrap().unwrap();
        assert_eq!(saved.listing(naver.id).unwrap().status, ListingStatus::Rejected);
    }

    #[tokio::test]
    async fn unknown_marketplace_or_code_is_unsuccessful() {
        let product = Product::new("Mug", "MUG-1", 1_000);
        let (_, processor, _) = setup(&product);
        let item = BatchItem::new(product.id.to_string(), ItemType::Product).to_ref();

        let result = processor
            .process(&item, &sync_params(MarketplaceId::new()))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.starts_with("marketplace not found"));

        let gmarket = Marketplace::new("Gmarket", "gmarket");
        processor.marketplaces.add_marketplace(gmarket.clone());
        let result = processor.process(&item, &sync_params(gmarket.id)).await.unwrap();
        assert_eq!(result.message, "unsupported marketplace: gmarket");
    }
}
