//! Database layer - document backends and the typed repository

pub mod access_log;
pub mod catalog;
pub mod clinical;
pub mod memory;
pub mod patients;
pub mod postgres;
pub mod sessions;
pub mod traits;

pub use memory::MemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use traits::{Collection, Document, DocumentStore};

use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Typed access to every collection, backed by any [`DocumentStore`].
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        match self.store.read(collection, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }

    async fn list<T: DeserializeOwned>(&self, collection: Collection, owner: &str) -> Result<Vec<T>> {
        self.store
            .list_by_owner(collection, owner)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc.body).map_err(Into::into))
            .collect()
    }

    async fn insert<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        value: &T,
    ) -> Result<Document> {
        let body = serde_json::to_value(value)?;
        self.store.insert(collection, id, owner, body).await
    }

    async fn upsert<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        value: &T,
    ) -> Result<Document> {
        let body = serde_json::to_value(value)?;
        self.store.upsert(collection, id, owner, body).await
    }
}
