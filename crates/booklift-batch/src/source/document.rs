//! Document collection source

use std::sync::Arc;

use async_trait::async_trait;
use booklift_common::Record;

use super::{not_open, RecordSource};
use crate::error::{BatchError, Result};
use crate::store::document::document_to_record;
use crate::store::{Cursor, Document, DocumentCollection};

/// Reads the whole collection, ascending by a store-specific sort field
pub struct DocumentSource {
    name: String,
    collection: Arc<dyn DocumentCollection>,
    sort_field: String,
    cursor: Option<Cursor<Document>>,
}

impl DocumentSource {
    pub fn new(collection: Arc<dyn DocumentCollection>, sort_field: impl Into<String>) -> Self {
        Self {
            name: format!("document:{}", collection.name()),
            collection,
            sort_field: sort_field.into(),
            cursor: None,
        }
    }
}

#[async_trait]
impl RecordSource for DocumentSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<()> {
        let cursor = self
            .collection
            .find_sorted(&self.sort_field)
            .await
            .map_err(|err| BatchError::source_unavailable(&self.name, err))?;
        self.cursor = Some(cursor);
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(not_open(&self.name));
        };

        match cursor.next().await {
            Some(Ok(document)) => Ok(Some(document_to_record(document)?)),
            Some(Err(err)) => Err(BatchError::source_unavailable(&self.name, err)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.cursor = None;
        Ok(())
    }
}
