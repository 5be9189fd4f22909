//! Document store collaborator
//!
//! The storefront keeps its data in a hosted document database: JSON documents
//! grouped in named collections, addressed by id, each carrying creation and
//! update timestamps. Services receive an `Arc<dyn DocumentStore>` from the
//! entry point and never construct a client themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const VARIATIONS: &str = "product_variations";
    pub const IMAGES: &str = "product_images";
    pub const ORDER_ITEMS: &str = "order_items";
    pub const PROMOTIONS: &str = "promotions";
    /// Provisioned per deployment; absent on stores that never enabled alerts.
    pub const INVENTORY_ALERTS: &str = "inventory_alerts";

    pub const CORE: [&str; 5] = [PRODUCTS, VARIATIONS, IMAGES, ORDER_ITEMS, PROMOTIONS];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value, created_at: DateTime<Utc>) -> Self {
        Self { id: id.into(), created_at, updated_at: created_at, data }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::Decode { id: self.id.clone(), reason: e.to_string() })
    }

    pub fn field(&self, name: &str) -> Option<&Value> { self.data.get(name) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter { pub field: String, pub value: Value }

#[derive(Clone, Debug, PartialEq)]
pub struct Sort { pub field: String, pub descending: bool }

/// Equality filters, one sort key, and offset pagination.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    /// Sort key that orders by the document's creation timestamp.
    pub const CREATED_AT: &'static str = "$created_at";

    pub fn new() -> Self { Self::default() }
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter { field: field.into(), value: value.into() });
        self
    }
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self { self.sort = Some(Sort { field: field.into(), descending: false }); self }
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self { self.sort = Some(Sort { field: field.into(), descending: true }); self }
    pub fn limit(mut self, limit: u32) -> Self { self.limit = Some(limit); self }
    pub fn offset(mut self, offset: u32) -> Self { self.offset = offset; self }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| doc.field(&f.field) == Some(&f.value))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Collection {0} is not provisioned")]
    CollectionMissing(String),

    #[error("Document {id} already exists in {collection}")]
    AlreadyExists { collection: String, id: String },

    #[error("Document {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },

    #[error("Backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, StoreError>;
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError>;
    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError>;
    /// Shallow merge: top-level keys of `patch` replace those of the stored document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document, StoreError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Separates "collection not provisioned" (`Ok(None)`) from a failed query (`Err`).
pub fn optional_collection<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::CollectionMissing(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn merge_patch(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch { target.insert(key, value); }
        }
        (target, patch) => *target = patch,
    }
}

/// Store doubles shared by service tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Every query fails as if the backend were unreachable. Reads of the
    /// collections named in `readable` are delegated to `inner` instead.
    pub struct BrokenStore { pub inner: Option<MemoryStore>, pub readable: Vec<&'static str> }

    impl BrokenStore {
        pub fn new() -> Self { Self { inner: None, readable: vec![] } }
        pub fn reading(inner: MemoryStore, readable: Vec<&'static str>) -> Self { Self { inner: Some(inner), readable } }

        fn delegate(&self, collection: &str) -> Option<&MemoryStore> {
            self.inner.as_ref().filter(|_| self.readable.iter().any(|c| *c == collection))
        }
    }

    fn down() -> StoreError { StoreError::Backend("connection timed out".into()) }

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, StoreError> {
            match self.delegate(collection) { Some(inner) => inner.list(collection, query).await, None => Err(down()) }
        }
        async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
            match self.delegate(collection) { Some(inner) => inner.get(collection, id).await, None => Err(down()) }
        }
        async fn create(&self, _: &str, _: &str, _: Value) -> Result<Document, StoreError> { Err(down()) }
        async fn update(&self, _: &str, _: &str, _: Value) -> Result<Document, StoreError> { Err(down()) }
        async fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> { Err(down()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches_equality_filters() {
        let doc = Document::new("v1", json!({ "product_id": "p1", "variation_type": "size" }), Utc::now());
        assert!(ListQuery::new().filter("product_id", "p1").matches(&doc));
        assert!(!ListQuery::new().filter("product_id", "p1").filter("variation_type", "color").matches(&doc));
        assert!(!ListQuery::new().filter("missing", true).matches(&doc));
    }

    #[test]
    fn test_optional_collection() {
        assert_eq!(optional_collection(Ok::<_, StoreError>(3)).unwrap(), Some(3));
        assert_eq!(optional_collection::<u8>(Err(StoreError::CollectionMissing("alerts".into()))).unwrap(), None);
        assert!(optional_collection::<u8>(Err(StoreError::Backend("timeout".into()))).is_err());
    }

    #[test]
    fn test_merge_patch_is_shallow() {
        let mut doc = json!({ "name": "Tee", "is_active": true, "meta": { "a": 1 } });
        merge_patch(&mut doc, json!({ "is_active": false, "meta": { "b": 2 } }));
        assert_eq!(doc, json!({ "name": "Tee", "is_active": false, "meta": { "b": 2 } }));
    }
}
