//! Promotions collaborator

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::aggregates::{Selection, VariationType};
use crate::domain::value_objects::DataSource;
use crate::services::pricing::Promotion;
use crate::store::{collections, optional_collection, DocumentStore, ListQuery, StoreError};

#[async_trait]
pub trait PromotionSource: Send + Sync {
    async fn active_promotions(&self, product_id: &str, selection: &Selection) -> Result<Vec<Promotion>, StoreError>;
}

/// Promotion document. A missing `product_id` applies to every product; a
/// `variation_type`/`option_id` pair restricts it to selections containing
/// that option.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct PromotionRecord {
    name: String,
    discount: Decimal,
    product_id: Option<String>,
    variation_type: Option<VariationType>,
    option_id: Option<String>,
}

impl PromotionRecord {
    fn applies_to(&self, product_id: &str, selection: &Selection) -> bool {
        let product_matches = self.product_id.as_deref().map_or(true, |p| p == product_id);
        let option_matches = match (&self.variation_type, &self.option_id) {
            (Some(t), Some(option_id)) => selection.get(*t) == Some(option_id.as_str()),
            _ => true,
        };
        product_matches && option_matches
    }
}

pub struct StorePromotionSource { store: Arc<dyn DocumentStore> }

impl StorePromotionSource {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }
}

#[async_trait]
impl PromotionSource for StorePromotionSource {
    async fn active_promotions(&self, product_id: &str, selection: &Selection) -> Result<Vec<Promotion>, StoreError> {
        let query = ListQuery::new().filter("is_active", true);
        let Some(docs) = optional_collection(self.store.list(collections::PROMOTIONS, &query).await)? else {
            return Ok(vec![]);
        };
        let mut promotions = Vec::new();
        for doc in docs {
            let record: PromotionRecord = doc.decode()?;
            if record.discount > Decimal::ZERO && record.applies_to(product_id, selection) {
                promotions.push(Promotion { promotion_id: doc.id, name: record.name, discount: record.discount });
            }
        }
        Ok(promotions)
    }
}

/// Pricing still renders when promotions cannot be read; the result is tagged
/// `Fallback` so callers can tell.
pub async fn load_promotions(source: &dyn PromotionSource, product_id: &str, selection: &Selection) -> (Vec<Promotion>, DataSource) {
    match source.active_promotions(product_id, selection).await {
        Ok(promotions) => (promotions, DataSource::Live),
        Err(e) => {
            tracing::warn!(product_id, error = %e, "promotions unavailable, pricing without them");
            (vec![], DataSource::Fallback)
        }
    }
}
