//! Product catalog domain module.
//!
//! This crate contains the catalog record and the business rules for bulk edits
//! (price, stock, status, categories, marketplace listings), implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod adjust;
pub mod product;

pub use adjust::{AdjustAction, Adjustment, CategoryAction, PriceType};
pub use product::{
    CategoryChange, ListingStatus, MarketplaceListing, PriceChange, Product, ProductFilter,
    ProductStatus, StatusChange, StockChange, Variant,
};
