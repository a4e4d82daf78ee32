//! Document store: collections of JSON documents keyed by their `id` field
//!
//! The pipeline reads a collection sorted by a field it does not own
//! (`status` by default) and writes documents one at a time. There is no
//! multi-document transaction on either backend.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use booklift_common::{ParseError, Record};
use serde_json::{Map, Value};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::Cursor;
use crate::config::DocumentSettings;
use crate::error::BackendError;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations/document");

/// A JSON object stored in a collection
pub type Document = Map<String, Value>;

/// Field that identifies a document within its collection
pub const ID_FIELD: &str = "id";

/// A collection the document steps read from and write to
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert the document, replacing any document with the same id
    async fn upsert(&self, document: Document) -> Result<(), BackendError>;

    /// Query the whole collection, ascending by `sort_field`
    async fn find_sorted(&self, sort_field: &str) -> Result<Cursor<Document>, BackendError>;
}

/// Pick the document backend from the URL scheme
pub async fn connect_documents(
    settings: &DocumentSettings,
) -> Result<Arc<dyn DocumentCollection>, BackendError> {
    if settings.url.starts_with("mongodb://") || settings.url.starts_with("mongodb+srv://") {
        #[cfg(feature = "mongodb")]
        {
            let collection =
                MongoCollection::connect(&settings.url, &settings.database, &settings.collection)
                    .await?;
            return Ok(Arc::new(collection));
        }
        #[cfg(not(feature = "mongodb"))]
        return Err(BackendError::Document(
            "MongoDB URLs need booklift built with the `mongodb` feature".to_string(),
        ));
    }

    let collection = SqliteDocumentCollection::connect(&settings.url, &settings.collection).await?;
    Ok(Arc::new(collection))
}

/// Map a record onto its document shape, `{ "id": .., "name": .. }`
pub fn record_to_document(record: &Record) -> Result<Document, BackendError> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(document),
        other => Err(BackendError::Document(format!(
            "record serialized to non-object {}",
            other
        ))),
    }
}

/// Read a record back out of a document; fields other than `id` and `name`
/// are store metadata and are ignored.
pub fn document_to_record(document: Document) -> Result<Record, ParseError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|err| ParseError::malformed(format!("document is not a record: {}", err)))
}

fn document_id(document: &Document) -> Result<i64, BackendError> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_i64)
        .ok_or_else(|| BackendError::Document(format!("document has no integer '{}'", ID_FIELD)))
}

/// Documents stored as JSON text in SQLite
#[derive(Debug, Clone)]
pub struct SqliteDocumentCollection {
    name: String,
    pool: SqlitePool,
}

impl SqliteDocumentCollection {
    pub async fn connect(url: &str, collection: &str) -> Result<Self, BackendError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;
        info!(url = %url, collection = %collection, "Connected to document store");

        Ok(Self {
            name: collection.to_string(),
            pool,
        })
    }

    pub async fn count(&self) -> Result<i64, BackendError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM documents WHERE collection = ?")
                .bind(&self.name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl DocumentCollection for SqliteDocumentCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, document: Document) -> Result<(), BackendError> {
        let id = document_id(&document)?;
        let body = serde_json::to_string(&document)?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, body)
            VALUES (?, ?, ?)
            ON CONFLICT (collection, doc_id) DO UPDATE SET body = excluded.body
            "#,
        )
        .bind(&self.name)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_sorted(&self, sort_field: &str) -> Result<Cursor<Document>, BackendError> {
        let pool = self.pool.clone();
        let collection = self.name.clone();
        let path = format!("$.{}", sort_field);

        Ok(Cursor::spawn(move |tx| async move {
            use futures::StreamExt;

            // Missing sort fields are NULL and sort first; the id keeps
            // equal keys in a stable order between runs.
            let mut rows = sqlx::query_as::<_, (String,)>(
                r#"
                SELECT body FROM documents
                WHERE collection = ?
                ORDER BY json_extract(body, ?) ASC, doc_id ASC
                "#,
            )
            .bind(collection)
            .bind(path)
            .fetch(&pool);

            while let Some(row) = rows.next().await {
                let document = row
                    .map_err(BackendError::from)
                    .and_then(|(body,)| serde_json::from_str::<Document>(&body).map_err(Into::into));
                if !tx.send(document).await {
                    break;
                }
            }
        }))
    }
}

/// Documents in a MongoDB collection; the record id doubles as `_id`
#[cfg(feature = "mongodb")]
#[derive(Debug, Clone)]
pub struct MongoCollection {
    name: String,
    inner: mongodb::Collection<mongodb::bson::Document>,
}

#[cfg(feature = "mongodb")]
impl MongoCollection {
    pub async fn connect(url: &str, database: &str, collection: &str) -> Result<Self, BackendError> {
        let client = mongodb::Client::with_uri_str(url).await?;
        let inner = client.database(database).collection(collection);
        info!(database = %database, collection = %collection, "Connected to MongoDB");
        Ok(Self {
            name: collection.to_string(),
            inner,
        })
    }
}

#[cfg(feature = "mongodb")]
#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, document: Document) -> Result<(), BackendError> {
        use mongodb::bson;

        let id = document_id(&document)?;
        let mut replacement =
            bson::to_document(&document).map_err(|err| BackendError::Document(err.to_string()))?;
        replacement.insert("_id", id);

        let mut filter = bson::Document::new();
        filter.insert("_id", id);

        self.inner.replace_one(filter, replacement).upsert(true).await?;
        Ok(())
    }

    async fn find_sorted(&self, sort_field: &str) -> Result<Cursor<Document>, BackendError> {
        use futures::TryStreamExt;
        use mongodb::bson;

        let mut sort = bson::Document::new();
        sort.insert(sort_field, 1);
        let mut cursor = self.inner.find(bson::Document::new()).sort(sort).await?;

        Ok(Cursor::spawn(move |tx| async move {
            loop {
                let next = match cursor.try_next().await {
                    Ok(Some(mut raw)) => {
                        raw.remove("_id");
                        serde_json::to_value(&raw)
                            .map_err(BackendError::from)
                            .and_then(|value| match value {
                                Value::Object(document) => Ok(document),
                                _ => Err(BackendError::Document("non-object document".into())),
                            })
                    },
                    Ok(None) => break,
                    Err(err) => Err(err.into()),
                };
                if !tx.send(next).await {
                    break;
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_document_mapping() {
        let document = record_to_document(&Record::new(7, "Dune")).unwrap();
        assert_eq!(document.get("id"), Some(&Value::from(7)));
        assert_eq!(document.get("name"), Some(&Value::from("Dune")));
        assert_eq!(document_id(&document).unwrap(), 7);
    }

    #[test]
    fn test_store_metadata_is_ignored_on_read() {
        let mut document = record_to_document(&Record::new(1, "Alice")).unwrap();
        document.insert("status".into(), Value::from("archived"));
        assert_eq!(document_to_record(document).unwrap(), Record::new(1, "Alice"));
    }

    #[test]
    fn test_document_without_name_is_malformed() {
        let mut document = Document::new();
        document.insert("id".into(), Value::from(1));
        let err = document_to_record(document).unwrap_err();
        assert!(err.to_string().contains("document is not a record"));
    }
}
