//! Storefront Core
//!
//! Pricing, stock and inventory analytics for a multi-brand storefront.
//!
//! ## Features
//! - Variation catalog normalization (color / size / style / material)
//! - Stock resolution for a variation selection
//! - Per-unit price breakdown with quantity tiers, promotions, tax and shipping
//! - Sales analytics and velocity classification
//! - Inventory overviews and fleet-wide stock statistics
//! - Currency conversion with a provider fallback chain

use axum::http::StatusCode;
use thiserror::Error;

pub mod config;
pub mod domain;
pub mod events;
pub mod services;
pub mod store;

pub use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl StorefrontError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for StorefrontError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { collection, id } => Self::NotFound {
                entity: collection_entity(&collection),
                id,
            },
            other => Self::Store(other),
        }
    }
}

fn collection_entity(collection: &str) -> &'static str {
    match collection {
        store::collections::PRODUCTS => "Product",
        store::collections::VARIATIONS => "Variation",
        store::collections::IMAGES => "Image",
        store::collections::ORDER_ITEMS => "Order item",
        store::collections::PROMOTIONS => "Promotion",
        _ => "Document",
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: StorefrontError = StoreError::NotFound { collection: "products".into(), id: "p1".into() }.into();
        assert!(matches!(err, StorefrontError::NotFound { entity: "Product", .. }));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_backend_failure_is_not_not_found() {
        let err: StorefrontError = StoreError::Backend("connection refused".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(StorefrontError::validation("bad").status_code() == StatusCode::UNPROCESSABLE_ENTITY);
    }
}
