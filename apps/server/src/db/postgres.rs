//! PostgreSQL document store - one JSONB table keyed by (collection, id)

use super::traits::{Collection, Document, DocumentStore};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgRow, PgPool, Row};

const COLUMNS: &str = "id, owner, version, created_at, body";

#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("migration failed: {}", e)))
    }

    fn document(row: &PgRow) -> Result<Document> {
        Ok(Document {
            id: row.try_get("id")?,
            owner: row.try_get("owner")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            body: row.try_get("body")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        body: JsonValue,
    ) -> Result<Document> {
        let query = format!(
            r#"
            INSERT INTO documents (collection, id, owner, body)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(collection.as_str())
            .bind(id)
            .bind(owner)
            .bind(&body)
            .fetch_one(&self.pool)
            .await?;

        Self::document(&row)
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        owner: Option<&str>,
        body: JsonValue,
    ) -> Result<Document> {
        let query = format!(
            r#"
            INSERT INTO documents (collection, id, owner, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, id) DO UPDATE
               SET body = EXCLUDED.body,
                   owner = EXCLUDED.owner,
                   version = documents.version + 1,
                   updated_at = now()
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(collection.as_str())
            .bind(id)
            .bind(owner)
            .bind(&body)
            .fetch_one(&self.pool)
            .await?;

        Self::document(&row)
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2");

        let row = sqlx::query(&query)
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::document).transpose()
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        body: JsonValue,
        expected_version: Option<i64>,
    ) -> Result<Document> {
        let query = format!(
            r#"
            UPDATE documents
               SET body = $3, version = version + 1, updated_at = now()
             WHERE collection = $1
               AND id = $2
               AND ($4::BIGINT IS NULL OR version = $4)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(collection.as_str())
            .bind(id)
            .bind(&body)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Self::document(&row);
        }

        // Distinguish a missing row from a lost race.
        match (self.read(collection, id).await?, expected_version) {
            (Some(current), Some(expected)) => Err(Error::VersionConflict {
                expected,
                actual: current.version,
            }),
            _ => Err(Error::NotFound(format!("{}/{}", collection.as_str(), id))),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(&self, collection: Collection, owner: &str) -> Result<Vec<Document>> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND owner = $2 ORDER BY seq"
        );

        let rows = sqlx::query(&query)
            .bind(collection.as_str())
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::document).collect()
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND body ->> $2 = $3 ORDER BY seq"
        );

        let rows = sqlx::query(&query)
            .bind(collection.as_str())
            .bind(field)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::document).collect()
    }
}
