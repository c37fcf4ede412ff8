use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use catalogsync_catalog::{ListingStatus, Product, ProductStatus};
use catalogsync_core::ProductId;

use super::{ListingPush, Marketplace, MarketplaceClient, MarketplaceError};

/// Simulated marketplace for tests/dev.
///
/// Active products are listed as `active`; anything else is `rejected`.
/// External ids are stable per product.
#[derive(Debug, Default)]
pub struct InMemoryMarketplace {
    listings: Mutex<HashMap<ProductId, String>>,
    accounts: Option<Vec<String>>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept pushes for these account ids.
    pub fn with_accounts(accounts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            listings: Mutex::default(),
            accounts: Some(accounts.into_iter().map(Into::into).collect()),
        }
    }

    pub fn listed(&self) -> usize {
        self.listings.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MarketplaceClient for InMemoryMarketplace {
    async fn push_product(
        &self,
        marketplace: &Marketplace,
        product: &Product,
        account_id: Option<&str>,
    ) -> Result<ListingPush, MarketplaceError> {
        if let Some(accounts) = &self.accounts {
            let account = account_id.unwrap_or_default();
            if !accounts.iter().any(|a| a == account) {
                return Err(MarketplaceError::AccountNotFound(account.to_string()));
            }
        }

        let mut listings = self
            .listings
            .lock()
            .map_err(|_| MarketplaceError::Request("listing table poisoned".to_string()))?;
        let external_product_id = listings
            .entry(product.id)
            .or_insert_with(|| format!("{}-{}", marketplace.code, product.sku))
            .clone();

        if product.status == ProductStatus::Active {
            Ok(ListingPush {
                external_product_id,
                status: ListingStatus::Active,
                errors: Vec::new(),
            })
        } else {
            Ok(ListingPush {
                external_product_id,
                status: ListingStatus::Rejected,
                errors: vec![format!("product status is {}", product.status)],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_active_products_with_stable_id() {
        let client = InMemoryMarketplace::new();
        let mp = Marketplace::new("Naver SmartStore", "naver");
        let mut product = Product::new("Mug", "MUG-1", 1_000);
        product.status = ProductStatus::Active;

        let first = client.push_product(&mp, &product, None).await.unwrap();
        let second = client.push_product(&mp, &product, None).await.unwrap();
        assert_eq!(first.status, ListingStatus::Active);
        assert_eq!(first.external_product_id, "naver-MUG-1");
        assert_eq!(first.external_product_id, second.external_product_id);
        assert_eq!(client.listed(), 1);
    }

    #[tokio::test]
    async fn rejects_inactive_and_unknown_accounts() {
        let client = InMemoryMarketplace::with_accounts(["acct-1"]);
        let mp = Marketplace::new("Coupang", "coupang");
        let product = Product::new("Mug", "MUG-1", 1_000);

        let push = client.push_product(&mp, &product, Some("acct-1")).await.unwrap();
        assert_eq!(push.status, ListingStatus::Rejected);
        assert_eq!(push.errors, vec!["product status is draft".to_string()]);

        assert!(matches!(
            client.push_product(&mp, &product, Some("acct-2")).await,
            Err(MarketplaceError::AccountNotFound(_))
        ));
    }
}
