//! Document collection sink

use std::sync::Arc;

use async_trait::async_trait;
use booklift_common::Record;

use super::{Atomicity, RecordSink};
use crate::error::{BatchError, Result};
use crate::store::document::record_to_document;
use crate::store::DocumentCollection;

/// Upserts one document per record, in chunk order.
///
/// There is no transaction around the chunk: documents upserted before a
/// failure stay in the collection.
pub struct DocumentSink {
    name: String,
    collection: Arc<dyn DocumentCollection>,
}

impl DocumentSink {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self {
            name: format!("document:{}", collection.name()),
            collection,
        }
    }
}

#[async_trait]
impl RecordSink for DocumentSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::BestEffort
    }

    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn write(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            let document =
                record_to_document(record).map_err(|err| BatchError::write(&self.name, err))?;
            self.collection
                .upsert(document)
                .await
                .map_err(|err| BatchError::write(&self.name, err))?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
