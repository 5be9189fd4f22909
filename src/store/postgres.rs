//! Postgres-backed document store: one JSONB `documents` table plus a
//! `collections` registry (see `migrations/`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use super::{Document, DocumentStore, ListQuery, StoreError};

#[derive(Clone)]
pub struct PgDocumentStore { pool: PgPool }

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow { id: String, data: Json<Value>, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document { id: row.id, created_at: row.created_at, updated_at: row.updated_at, data: row.data.0 }
    }
}

fn backend(e: sqlx::Error) -> StoreError { StoreError::Backend(e.to_string()) }

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM collections WHERE name = $1)")
            .bind(collection).fetch_one(&self.pool).await.map_err(backend)?;
        if exists.0 { Ok(()) } else { Err(StoreError::CollectionMissing(collection.to_string())) }
    }

    fn filtered<'q>(select: &str, collection: &str, query: &ListQuery) -> QueryBuilder<'q, Postgres> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(select);
        qb.push(" FROM documents WHERE collection = ").push_bind(collection.to_string());
        for f in &query.filters {
            qb.push(" AND data -> ").push_bind(f.field.clone()).push(" = ").push_bind(Json(f.value.clone()));
        }
        qb
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound { collection: collection.to_string(), id: id.to_string() }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, StoreError> {
        self.ensure_collection(collection).await?;
        let mut qb = Self::filtered("SELECT id, data, created_at, updated_at", collection, query);
        match &query.sort {
            Some(sort) if sort.field == ListQuery::CREATED_AT => { qb.push(" ORDER BY created_at"); }
            Some(sort) => { qb.push(" ORDER BY data -> ").push_bind(sort.field.clone()); }
            None => { qb.push(" ORDER BY created_at"); }
        }
        if query.sort.as_ref().is_some_and(|s| s.descending) { qb.push(" DESC"); }
        if let Some(limit) = query.limit { qb.push(" LIMIT ").push_bind(i64::from(limit)); }
        qb.push(" OFFSET ").push_bind(i64::from(query.offset));

        let rows = qb.build_query_as::<DocumentRow>().fetch_all(&self.pool).await.map_err(backend)?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT id, data, created_at, updated_at FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id).fetch_optional(&self.pool).await.map_err(backend)?;
        match row {
            Some(row) => Ok(row.into()),
            None => {
                self.ensure_collection(collection).await?;
                Err(Self::not_found(collection, id))
            }
        }
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("INSERT INTO documents (collection, id, data, created_at, updated_at) VALUES ($1, $2, $3, NOW(), NOW()) RETURNING id, data, created_at, updated_at")
            .bind(collection).bind(id).bind(Json(data))
            .fetch_one(&self.pool).await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists { collection: collection.to_string(), id: id.to_string() },
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::CollectionMissing(collection.to_string()),
                _ => backend(e),
            })?;
        Ok(row.into())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document, StoreError> {
        sqlx::query_as::<_, DocumentRow>("UPDATE documents SET data = data || $3, updated_at = NOW() WHERE collection = $1 AND id = $2 RETURNING id, data, created_at, updated_at")
            .bind(collection).bind(id).bind(Json(patch))
            .fetch_optional(&self.pool).await.map_err(backend)?
            .map(Document::from)
            .ok_or_else(|| Self::not_found(collection, id))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id).execute(&self.pool).await.map_err(backend)?;
        if result.rows_affected() == 0 { return Err(Self::not_found(collection, id)); }
        Ok(())
    }
}
