//! Infrastructure layer: batch job engine, storage adapters, catalog and marketplace seams.

pub mod catalog;
pub mod jobs;
pub mod marketplace;
pub mod processors;
