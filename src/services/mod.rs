//! Storefront services: pure calculators and the store-backed collaborators that feed them

pub mod currency;
pub mod inventory_summary;
pub mod pricing;
pub mod product_query;
pub mod promotions;
pub mod sales_analytics;
pub mod stock_resolver;
pub mod variation_catalog;
