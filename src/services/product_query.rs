//! Product queries over the document store
//!
//! Decodes product, variation, image and order-line documents into domain
//! types. Everything derived from them is computed by the pure services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::domain::aggregates::{ImageRecord, OrderLine, OrderLineRecord, Product, ProductError, ProductImage, ProductRecord, RawVariationRow};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::DataSource;
use crate::services::sales_analytics::{self, SalesAnalytics};
use crate::services::variation_catalog::{group_rows, normalize};
use crate::store::{collections, optional_collection, Document, DocumentStore, ListQuery};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockAlert {
    pub id: String,
    pub product_id: String,
    pub alert_type: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StockAlertRecord {
    product_id: String,
    alert_type: String,
    message: Option<String>,
    is_resolved: bool,
}

#[derive(Clone)]
pub struct ProductQueryService {
    store: Arc<dyn DocumentStore>,
}

impl ProductQueryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }

    /// The product with its normalized variation groups and images.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> Result<Product> {
        let doc = self.store.get(collections::PRODUCTS, id).await?;
        let product = decode_product(doc)?;

        let by_product = ListQuery::new().filter("product_id", id).sort_asc("sort_order");
        let (variation_docs, image_docs) = futures::try_join!(
            self.optional_list(collections::VARIATIONS, &by_product),
            self.optional_list(collections::IMAGES, &by_product),
        )?;

        let mut rows = Vec::with_capacity(variation_docs.len());
        for doc in variation_docs {
            let mut row: RawVariationRow = doc.decode()?;
            row.id.get_or_insert(doc.id);
            rows.push(row);
        }
        let images = image_docs.into_iter()
            .map(|doc| -> Result<ProductImage> { Ok(doc.decode::<ImageRecord>()?.into_image(doc.id)) })
            .collect::<Result<Vec<_>>>()?;

        let variations = normalize(id, group_rows(rows));
        tracing::debug!(product_id = id, groups = variations.len(), images = images.len(), "assembled product");
        Ok(product.with_variations(variations).with_images(images))
    }

    /// Newest first. Documents without `is_active` count as active.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, active_only: bool, page: u32, per_page: u32) -> Result<Page<Product>> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let products = self.catalog(active_only).await?;
        let total = products.len();
        let data = products.into_iter()
            .skip((page as usize - 1).saturating_mul(per_page as usize))
            .take(per_page as usize)
            .collect();
        Ok(Page { data, total, page, per_page })
    }

    /// Every product without variations or images, newest first.
    pub async fn catalog(&self, active_only: bool) -> Result<Vec<Product>> {
        let docs = self.store.list(collections::PRODUCTS, &ListQuery::new().sort_desc(ListQuery::CREATED_AT)).await?;
        let mut products = Vec::with_capacity(docs.len());
        for doc in docs {
            let product = decode_product(doc)?;
            if !active_only || product.is_active() {
                products.push(product);
            }
        }
        Ok(products)
    }

    /// Order lines for a product, oldest first. An unprovisioned collection has no lines.
    pub async fn order_lines(&self, product_id: &str) -> Result<Vec<OrderLine>> {
        let query = ListQuery::new().filter("product_id", product_id).sort_asc(ListQuery::CREATED_AT);
        let docs = self.optional_list(collections::ORDER_ITEMS, &query).await?;
        docs.into_iter()
            .map(|doc| -> Result<OrderLine> { Ok(doc.decode::<OrderLineRecord>()?.into_line(doc.id, doc.created_at)) })
            .collect()
    }

    /// Analytics never fail for a known product: unreadable order history
    /// yields zeroed analytics tagged `Fallback`.
    #[tracing::instrument(skip(self, product), fields(product_id = product.id()))]
    pub async fn sales_analytics(&self, product: &Product, now: DateTime<Utc>) -> SalesAnalytics {
        match self.order_lines(product.id()).await {
            Ok(lines) => sales_analytics::aggregate(product.id(), product.price(), &lines, now),
            Err(e) => {
                tracing::warn!(error = %e, "order history unavailable, reporting empty analytics");
                SalesAnalytics::empty(product.id(), DataSource::Fallback)
            }
        }
    }

    /// Unresolved alerts, newest first. `None` when the deployment never
    /// provisioned alerts; a failed query is still an error.
    #[tracing::instrument(skip(self))]
    pub async fn stock_alerts(&self) -> Result<Option<Vec<StockAlert>>> {
        let query = ListQuery::new().sort_desc(ListQuery::CREATED_AT);
        let Some(docs) = optional_collection(self.store.list(collections::INVENTORY_ALERTS, &query).await)? else {
            return Ok(None);
        };
        let mut alerts = Vec::new();
        for doc in docs {
            let record: StockAlertRecord = doc.decode()?;
            if !record.is_resolved {
                alerts.push(StockAlert { id: doc.id, product_id: record.product_id, alert_type: record.alert_type, message: record.message, created_at: doc.created_at });
            }
        }
        Ok(Some(alerts))
    }

    /// Soft delete. Returns the events raised so the caller can publish them.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: &str) -> Result<Vec<DomainEvent>> {
        let mut product = decode_product(self.store.get(collections::PRODUCTS, id).await?)?;
        product.deactivate().map_err(|e| match e {
            ProductError::AlreadyInactive => StorefrontError::validation(format!("Product {} is already inactive", id)),
        })?;
        self.store.update(collections::PRODUCTS, id, json!({ "is_active": false })).await?;
        tracing::info!(product_id = id, "product deactivated");
        Ok(product.take_events())
    }

    async fn optional_list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>> {
        Ok(optional_collection(self.store.list(collection, query).await)?.unwrap_or_default())
    }
}

fn decode_product(doc: Document) -> Result<Product> {
    let record: ProductRecord = doc.decode()?;
    Ok(Product::from_record(doc.id, record, doc.created_at, doc.updated_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::VariationType;
    use crate::domain::events::ProductEvent;
    use crate::services::sales_analytics::SalesVelocity;
    use crate::store::testing::BrokenStore;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use rust_decimal::Decimal;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert("products", Document::new("p1", json!({ "name": "Scrub Top", "price": 45.99, "stock_quantity": 12 }), now - Duration::days(3))).await.unwrap();
        store.insert("products", Document::new("p2", json!({ "name": "Clog", "price": 80, "is_active": true }), now - Duration::days(2))).await.unwrap();
        store.insert("products", Document::new("p3", json!({ "name": "Old Cap", "price": 12, "is_active": false }), now - Duration::days(1))).await.unwrap();

        store.create("product_variations", "v1", json!({ "product_id": "p1", "variation_type": "size", "variation_value": "M", "stock_quantity": 4, "sort_order": 1 })).await.unwrap();
        store.create("product_variations", "v2", json!({ "product_id": "p1", "variation_type": "color", "variation_value": "Navy", "stock_quantity": 0, "sort_order": 0 })).await.unwrap();
        store.create("product_variations", "v3", json!({ "product_id": "p1", "variation_type": "size", "variation_value": "2X", "price_modifier": 3, "sort_order": 2 })).await.unwrap();
        store.create("product_variations", "v4", json!({ "product_id": "p2", "variation_type": "size", "variation_value": "9" })).await.unwrap();
        store.create("product_images", "i1", json!({ "product_id": "p1", "url": "https://cdn.example/p1.jpg", "sort_order": 0 })).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_product_assembles_groups_and_images() {
        let service = ProductQueryService::new(Arc::new(seeded().await));
        let product = service.get_product("p1").await.unwrap();
        let types: Vec<VariationType> = product.variations().iter().map(|g| g.variation_type).collect();
        assert_eq!(types, vec![VariationType::Color, VariationType::Size]);
        assert_eq!(product.variations()[1].options.len(), 2);
        assert_eq!(product.variations()[1].options[1].price_modifier, Decimal::new(3, 0));
        assert!(!product.variations()[0].options[0].available);
        assert_eq!(product.images().len(), 1);
        assert_eq!(product.images()[0].id, "i1");
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let service = ProductQueryService::new(Arc::new(seeded().await));
        let err = service.get_product("nope").await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotFound { entity: "Product", .. }));
    }

    #[tokio::test]
    async fn test_list_products_pages_active_newest_first() {
        let service = ProductQueryService::new(Arc::new(seeded().await));
        let page = service.list_products(true, 1, 1).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.data[0].id(), "p2");
        let page = service.list_products(true, 2, 1).await.unwrap();
        assert_eq!(page.data[0].id(), "p1");
        assert_eq!(service.list_products(false, 1, 20).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_list_products_far_past_the_end_is_empty() {
        let service = ProductQueryService::new(Arc::new(seeded().await));
        let page = service.list_products(true, 50_000_000, 100).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 2);
        assert_eq!(page.page, 50_000_000);
        let page = service.list_products(true, u32::MAX, u32::MAX).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.per_page, 100);
    }

    #[tokio::test]
    async fn test_sales_analytics_degrades_on_store_failure() {
        let store = seeded().await;
        let product = Product::new("p1", "Scrub Top", Decimal::new(4599, 2));

        let healthy = ProductQueryService::new(Arc::new(store));
        let analytics = healthy.sales_analytics(&product, Utc::now()).await;
        assert_eq!(analytics.source, DataSource::Live);

        let broken = ProductQueryService::new(Arc::new(BrokenStore::new()));
        let analytics = broken.sales_analytics(&product, Utc::now()).await;
        assert_eq!(analytics.source, DataSource::Fallback);
        assert_eq!(analytics.total_sold, 0);
        assert_eq!(analytics.sales_velocity, SalesVelocity::Stagnant);
    }

    #[tokio::test]
    async fn test_catalog_reads_survive_order_history_outage() {
        let store = BrokenStore::reading(seeded().await, vec!["products", "product_variations", "product_images"]);
        let service = ProductQueryService::new(Arc::new(store));
        let product = service.get_product("p1").await.unwrap();
        assert_eq!(product.variations().len(), 2);
        assert!(service.order_lines("p1").await.is_err());
        assert_eq!(service.sales_analytics(&product, Utc::now()).await.source, DataSource::Fallback);
    }

    #[tokio::test]
    async fn test_order_lines_feed_analytics() {
        let store = seeded().await;
        let now = Utc::now();
        store.insert("order_items", Document::new("o1", json!({ "product_id": "p1", "quantity": 2, "price": 40 }), now - Duration::hours(1))).await.unwrap();
        store.insert("order_items", Document::new("o2", json!({ "product_id": "p2", "quantity": 9 }), now)).await.unwrap();
        let service = ProductQueryService::new(Arc::new(store));
        let product = service.get_product("p1").await.unwrap();
        let analytics = service.sales_analytics(&product, now).await;
        assert_eq!(analytics.total_sold, 2);
        assert_eq!(analytics.revenue.total, Decimal::new(80, 0));
    }

    #[tokio::test]
    async fn test_stock_alerts_optional_collection() {
        let store = seeded().await;
        let service = ProductQueryService::new(Arc::new(store));
        assert_eq!(service.stock_alerts().await.unwrap(), None);

        let store = seeded().await;
        store.provision("inventory_alerts").await;
        store.create("inventory_alerts", "a1", json!({ "product_id": "p1", "alert_type": "low_stock" })).await.unwrap();
        store.create("inventory_alerts", "a2", json!({ "product_id": "p2", "alert_type": "out_of_stock", "is_resolved": true })).await.unwrap();
        let service = ProductQueryService::new(Arc::new(store));
        let alerts = service.stock_alerts().await.unwrap().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "low_stock");

        let broken = ProductQueryService::new(Arc::new(BrokenStore::new()));
        assert!(broken.stock_alerts().await.is_err());
    }

    #[tokio::test]
    async fn test_deactivate_product_persists_and_returns_event() {
        let store = Arc::new(seeded().await);
        let service = ProductQueryService::new(store.clone());
        let events = service.deactivate_product("p1").await.unwrap();
        assert_eq!(events, vec![DomainEvent::Product(ProductEvent::Deactivated { product_id: "p1".into() })]);
        assert_eq!(store.get("products", "p1").await.unwrap().field("is_active"), Some(&json!(false)));
        assert!(matches!(service.deactivate_product("p1").await, Err(StorefrontError::Validation(_))));
    }
}
