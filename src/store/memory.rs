//! In-process document store, used for development and tests

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{collections, merge_patch, Document, DocumentStore, ListQuery, StoreError};

#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    /// An empty store with the core collections provisioned.
    pub fn new() -> Self {
        Self::with_collections(&collections::CORE)
    }

    /// A store with exactly the named collections provisioned.
    pub fn with_collections(names: &[&str]) -> Self {
        let store = HashMap::from_iter(names.iter().map(|c| (c.to_string(), Vec::new())));
        Self { collections: RwLock::new(store) }
    }

    pub async fn provision(&self, collection: &str) {
        self.collections.write().await.entry(collection.to_string()).or_default();
    }

    /// Inserts a document with its own timestamps, replacing any with the same id.
    pub async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;
        let docs = guard.get_mut(collection).ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        docs.retain(|d| d.id != doc.id);
        docs.push(doc);
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // documents without the sort field go last
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let docs = guard.get(collection).ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        let mut found: Vec<Document> = docs.iter().filter(|d| query.matches(d)).cloned().collect();
        if let Some(sort) = &query.sort {
            found.sort_by(|a, b| {
                let ord = if sort.field == ListQuery::CREATED_AT {
                    a.created_at.cmp(&b.created_at)
                } else {
                    compare_values(a.field(&sort.field), b.field(&sort.field))
                };
                if sort.descending { ord.reverse() } else { ord }
            });
        }
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(query.offset as usize).take(limit).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let guard = self.collections.read().await;
        let docs = guard.get(collection).ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        docs.iter().find(|d| d.id == id).cloned()
            .ok_or_else(|| StoreError::NotFound { collection: collection.to_string(), id: id.to_string() })
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        let mut guard = self.collections.write().await;
        let docs = guard.get_mut(collection).ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        if docs.iter().any(|d| d.id == id) {
            return Err(StoreError::AlreadyExists { collection: collection.to_string(), id: id.to_string() });
        }
        let doc = Document::new(id, data, Utc::now());
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document, StoreError> {
        let mut guard = self.collections.write().await;
        let docs = guard.get_mut(collection).ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        let doc = docs.iter_mut().find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound { collection: collection.to_string(), id: id.to_string() })?;
        merge_patch(&mut doc.data, patch);
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;
        let docs = guard.get_mut(collection).ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(StoreError::NotFound { collection: collection.to_string(), id: id.to_string() });
        }
        Ok(())
    }
}
