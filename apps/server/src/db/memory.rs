//! In-memory document store, used for development and tests

use super::traits::{Collection, Document, DocumentStore};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        body: JsonValue,
    ) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.iter().any(|doc| doc.id == id) {
            return Err(Error::Storage(format!(
                "duplicate id {} in {}",
                id,
                collection.as_str()
            )));
        }

        let doc = Document {
            id: id.to_string(),
            owner: owner.map(str::to_string),
            version: 1,
            created_at: Utc::now(),
            body,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        body: JsonValue,
    ) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if let Some(doc) = docs.iter_mut().find(|doc| doc.id == id) {
            doc.body = body;
            doc.owner = owner.map(str::to_string);
            doc.version += 1;
            return Ok(doc.clone());
        }

        let doc = Document {
            id: id.to_string(),
            owner: owner.map(str::to_string),
            version: 1,
            created_at: Utc::now(),
            body,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        body: JsonValue,
        expected_version: Option<i64>,
    ) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", collection.as_str(), id)))?;

        if let Some(expected) = expected_version {
            if doc.version != expected {
                return Err(Error::VersionConflict {
                    expected,
                    actual: doc.version,
                });
            }
        }

        doc.body = body;
        doc.version += 1;
        Ok(doc.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        Ok(docs.len() != before)
    }

    async fn list_by_owner(&self, collection: Collection, owner: &str) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc.owner.as_deref() == Some(owner))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc.body.get(field).and_then(JsonValue::as_str) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
