//! Marketplace integration seam.
//!
//! Each marketplace is configured with a `code` (`naver`, `coupang`,
//! `eleventh`, ...) and the directory maps that code to a client. Wire formats
//! of the individual marketplaces live behind [`MarketplaceClient`].

pub mod in_memory;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use catalogsync_catalog::{ListingStatus, Product};
use catalogsync_core::MarketplaceId;

pub use in_memory::InMemoryMarketplace;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MarketplaceError {
    #[error("marketplace request failed: {0}")]
    Request(String),
    #[error("marketplace account not found: {0}")]
    AccountNotFound(String),
}

/// A configured marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marketplace {
    pub id: MarketplaceId,
    pub name: String,
    pub code: String,
}

impl Marketplace {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: MarketplaceId::new(),
            name: name.into(),
            code: code.into(),
        }
    }
}

/// What a marketplace reports back after a product push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPush {
    pub external_product_id: String,
    pub status: ListingStatus,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Create or update the listing of `product` on `marketplace`.
    async fn push_product(
        &self,
        marketplace: &Marketplace,
        product: &Product,
        account_id: Option<&str>,
    ) -> Result<ListingPush, MarketplaceError>;
}

/// Configured marketplaces plus the client registered for each code.
#[derive(Default)]
pub struct MarketplaceDirectory {
    marketplaces: RwLock<HashMap<MarketplaceId, Marketplace>>,
    clients: HashMap<String, Arc<dyn MarketplaceClient>>,
}

impl MarketplaceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, code: impl Into<String>, client: Arc<dyn MarketplaceClient>) -> Self {
        self.clients.insert(code.into(), client);
        self
    }

    pub fn add_marketplace(&self, marketplace: Marketplace) {
        if let Ok(mut all) = self.marketplaces.write() {
            all.insert(marketplace.id, marketplace);
        }
    }

    pub fn marketplace(&self, id: MarketplaceId) -> Option<Marketplace> {
        self.marketplaces.read().ok()?.get(&id).cloned()
    }

    pub fn client(&self, code: &str) -> Option<Arc<dyn MarketplaceClient>> {
        self.clients.get(code).cloned()
    }
}

impl std::fmt::Debug for MarketplaceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<&String> = self.clients.keys().collect();
        codes.sort();
        f.debug_struct("MarketplaceDirectory")
            .field("clients", &codes)
            .finish()
    }
}
