//! Core storage trait for document backends

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Logical collections held by a [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    Users,
    Groups,
    Questionnaires,
    Medications,
    Phenotypes,
    Feels,
    Proms,
    Seizures,
    Weights,
    Heights,
    Appointments,
    Sessions,
    AccessLog,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Users => "users",
            Collection::Groups => "groups",
            Collection::Questionnaires => "questionnaires",
            Collection::Medications => "medications",
            Collection::Phenotypes => "phenotypes",
            Collection::Feels => "feels",
            Collection::Proms => "proms",
            Collection::Seizures => "seizures",
            Collection::Weights => "weights",
            Collection::Heights => "heights",
            Collection::Appointments => "appointments",
            Collection::Sessions => "sessions",
            Collection::AccessLog => "access_log",
        }
    }
}

/// A stored JSON document with its bookkeeping columns.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Raw id of the owning patient, for patient-scoped collections.
    pub owner: Option<String>,
    /// Starts at 1, incremented on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub body: JsonValue,
}

/// Storage trait for JSON documents
///
/// The typed [`Repository`](crate::db::Repository) is built on top of this
/// trait, so any backend that can store keyed JSON with an owner column and a
/// version counter can serve the whole application.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document
    ///
    /// # Errors
    /// Fails with a storage error when `id` already exists in `collection`.
    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        body: JsonValue,
    ) -> Result<Document>;

    /// Insert or replace a document, bumping the version on replace
    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        body: JsonValue,
    ) -> Result<Document>;

    /// Read a document by id
    ///
    /// # Returns
    /// * `Ok(Some(document))` - Document found
    /// * `Ok(None)` - No document with this id
    async fn read(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Replace the body of an existing document
    ///
    /// # Arguments
    /// * `expected_version` - When set, the write only happens if the stored
    ///   version still matches
    ///
    /// # Errors
    /// * `Error::NotFound` - Document does not exist
    /// * `Error::VersionConflict` - Stored version differs from `expected_version`
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        body: JsonValue,
        expected_version: Option<i64>,
    ) -> Result<Document>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool>;

    /// All documents owned by `owner`, in insertion order
    async fn list_by_owner(&self, collection: Collection, owner: &str) -> Result<Vec<Document>>;

    /// Documents whose top-level string field `field` equals `value`, in
    /// insertion order
    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>>;
}
