use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalogsync_core::{CategoryId, MarketplaceId, ProductId};

use crate::adjust::{scale, AdjustAction, Adjustment, CategoryAction, PriceType};

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    OutOfStock,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One purchasable option combination of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub option_combination: String,
    pub price: u64,
    pub stock: u64,
    pub sku: Option<String>,
}

/// Listing status reported by a marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Inactive,
    Pending,
    Rejected,
}

/// Where (and how) a product is listed on an external marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceListing {
    pub marketplace_id: MarketplaceId,
    pub external_product_id: String,
    pub status: ListingStatus,
    pub last_sync_date: DateTime<Utc>,
    pub errors: Vec<String>,
}

/// Catalog record for a product.
///
/// Prices are in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub regular_price: u64,
    pub sale_price: Option<u64>,
    pub stock: u64,
    pub status: ProductStatus,
    pub categories: Vec<CategoryId>,
    pub variants: Vec<Variant>,
    pub marketplaces: Vec<MarketplaceListing>,
}

/// Outcome of a price edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceChange {
    pub price_type: PriceType,
    pub old_price: u64,
    pub new_price: u64,
}

/// Outcome of a stock edit (totals across variants when present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub old_stock: u64,
    pub new_stock: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub old_status: ProductStatus,
    pub new_status: ProductStatus,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.old_status == self.new_status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryChange {
    pub old_categories: Vec<CategoryId>,
    pub new_categories: Vec<CategoryId>,
}

impl Product {
    pub fn new(name: impl Into<String>, sku: impl Into<String>, regular_price: u64) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            sku: sku.into(),
            regular_price,
            sale_price: None,
            stock: 0,
            status: ProductStatus::Draft,
            categories: Vec::new(),
            variants: Vec::new(),
            marketplaces: Vec::new(),
        }
    }

    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn total_stock(&self) -> u64 {
        if self.has_variants() {
            self.variants.iter().map(|v| v.stock).sum()
        } else {
            self.stock
        }
    }

    /// Apply a price edit to the selected price field and carry it over to variants.
    ///
    /// `set` scales variant prices by `new / old`; percentage edits scale them by the
    /// same factor; fixed edits shift them by the same amount.
    pub fn apply_price(&mut self, price_type: PriceType, adj: &Adjustment) -> PriceChange {
        let current = match price_type {
            PriceType::Sale => self.sale_price.filter(|p| *p > 0).unwrap_or(self.regular_price),
            PriceType::Regular => self.regular_price,
        };
        let next = adj.apply(current);

        match price_type {
            PriceType::Regular => self.regular_price = next,
            PriceType::Sale => self.sale_price = Some(next),
        }

        if adj.action == AdjustAction::Set {
            // No base to scale from; variant prices stay as they are.
            if current > 0 {
                let ratio = next as f64 / current as f64;
                for v in &mut self.variants {
                    v.price = scale(v.price, ratio).max(0) as u64;
                }
            }
        } else {
            for v in &mut self.variants {
                v.price = adj.apply(v.price);
            }
        }

        PriceChange {
            price_type,
            old_price: current,
            new_price: next,
        }
    }

    /// Apply a stock edit to every variant, or to the product when it has none.
    pub fn apply_stock(&mut self, adj: &Adjustment) -> StockChange {
        let old_stock = self.total_stock();
        if self.has_variants() {
            for v in &mut self.variants {
                v.stock = adj.apply(v.stock);
            }
        } else {
            self.stock = adj.apply(self.stock);
        }
        StockChange {
            old_stock,
            new_stock: self.total_stock(),
        }
    }

    pub fn set_status(&mut self, status: ProductStatus) -> StatusChange {
        let old_status = self.status;
        self.status = status;
        StatusChange {
            old_status,
            new_status: status,
        }
    }

    pub fn apply_categories(&mut self, action: CategoryAction, ids: &[CategoryId]) -> CategoryChange {
        let old_categories = self.categories.clone();
        let new_categories = match action {
            CategoryAction::Replace => ids.to_vec(),
            CategoryAction::Add => {
                let mut merged = old_categories.clone();
                for id in ids {
                    if !merged.contains(id) {
                        merged.push(*id);
                    }
                }
                merged
            }
            CategoryAction::Remove => old_categories
                .iter()
                .copied()
                .filter(|c| !ids.contains(c))
                .collect(),
        };
        self.categories = new_categories.clone();
        CategoryChange {
            old_categories,
            new_categories,
        }
    }

    /// Insert or replace the listing for `listing.marketplace_id`.
    pub fn upsert_listing(&mut self, listing: MarketplaceListing) {
        match self
            .marketplaces
            .iter_mut()
            .find(|m| m.marketplace_id == listing.marketplace_id)
        {
            Some(existing) => *existing = listing,
            None => self.marketplaces.push(listing),
        }
    }

    pub fn listing(&self, marketplace_id: MarketplaceId) -> Option<&MarketplaceListing> {
        self.marketplaces.iter().find(|m| m.marketplace_id == marketplace_id)
    }
}

/// Product selection criteria used to resolve the items of a bulk job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring of the product name.
    #[serde(default)]
    pub name_contains: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(status) = self.status {
            if product.status != status {
                return false;
            }
        }
        if let Some(cat) = self.category_id {
            if !product.categories.contains(&cat) {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            if !product.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(price: u64, stock: u64) -> Variant {
        Variant {
            option_combination: "Red/L".to_string(),
            price,
            stock,
            sku: None,
        }
    }

    #[test]
    fn sale_price_falls_back_to_regular() {
        let mut p = Product::new("Mug", "MUG-1", 10_000);
        let change = p.apply_price(PriceType::Sale, &Adjustment::by_percent(AdjustAction::Decrease, 20.0));
        assert_eq!(change.old_price, 10_000);
        assert_eq!(change.new_price, 8_000);
        assert_eq!(p.sale_price, Some(8_000));
        assert_eq!(p.regular_price, 10_000);
    }

    #[test]
    fn set_price_scales_variants_by_ratio() {
        let mut p = Product::new("Shirt", "SH-1", 20_000);
        p.variants = vec![variant(20_000, 1), variant(25_000, 1)];

        p.apply_price(PriceType::Regular, &Adjustment::set(10_000));

        assert_eq!(p.regular_price, 10_000);
        assert_eq!(p.variants[0].price, 10_000);
        assert_eq!(p.variants[1].price, 12_500);
    }

    #[test]
    fn fixed_price_change_shifts_variants_and_clamps() {
        let mut p = Product::new("Shirt", "SH-1", 20_000);
        p.variants = vec![variant(20_000, 1), variant(1_000, 1)];

        p.apply_price(PriceType::Regular, &Adjustment::by_amount(AdjustAction::Decrease, 5_000));

        assert_eq!(p.regular_price, 15_000);
        assert_eq!(p.variants[0].price, 15_000);
        assert_eq!(p.variants[1].price, 0);
    }

    #[test]
    fn set_price_from_zero_leaves_variants() {
        let mut p = Product::new("Free", "FR-1", 0);
        p.variants = vec![variant(700, 1)];
        p.apply_price(PriceType::Regular, &Adjustment::set(1_000));
        assert_eq!(p.variants[0].price, 700);
    }

    #[test]
    fn stock_change_applies_per_variant() {
        let mut p = Product::new("Shirt", "SH-1", 20_000);
        p.variants = vec![variant(1, 10), variant(1, 4)];

        let change = p.apply_stock(&Adjustment::by_amount(AdjustAction::Decrease, 5));

        assert_eq!(change.old_stock, 14);
        assert_eq!(change.new_stock, 5);
        assert_eq!(p.variants[1].stock, 0);
    }

    #[test]
    fn stock_change_without_variants_uses_product_stock() {
        let mut p = Product::new("Mug", "MUG-1", 1);
        p.stock = 7;
        let change = p.apply_stock(&Adjustment::set(30));
        assert_eq!(change, StockChange { old_stock: 7, new_stock: 30 });
    }

    #[test]
    fn category_add_deduplicates_and_remove_filters() {
        let a = CategoryId::new();
        let b = CategoryId::new();
        let mut p = Product::new("Mug", "MUG-1", 1);
        p.categories = vec![a];

        let added = p.apply_categories(CategoryAction::Add, &[a, b]);
        assert_eq!(added.new_categories, vec![a, b]);

        let removed = p.apply_categories(CategoryAction::Remove, &[a]);
        assert_eq!(removed.new_categories, vec![b]);
    }

    #[test]
    fn upsert_listing_replaces_existing_entry() {
        let mp = MarketplaceId::new();
        let mut p = Product::new("Mug", "MUG-1", 1);
        let listing = |status| MarketplaceListing {
            marketplace_id: mp,
            external_product_id: "ext-1".to_string(),
            status,
            last_sync_date: Utc::now(),
            errors: Vec::new(),
        };

        p.upsert_listing(listing(ListingStatus::Pending));
        p.upsert_listing(listing(ListingStatus::Active));

        assert_eq!(p.marketplaces.len(), 1);
        assert_eq!(p.listing(mp).unwrap().status, ListingStatus::Active);
    }

    #[test]
    fn filter_matches_all_given_criteria() {
        let cat = CategoryId::new();
        let mut p = Product::new("Blue Mug", "MUG-1", 1);
        p.status = ProductStatus::Active;
        p.categories = vec![cat];

        let filter = ProductFilter {
            status: Some(ProductStatus::Active),
            category_id: Some(cat),
            name_contains: Some("mug".to_string()),
        };
        assert!(filter.matches(&p));

        let other = ProductFilter {
            status: Some(ProductStatus::Inactive),
            ..filter
        };
        assert!(!other.matches(&p));
    }
}
