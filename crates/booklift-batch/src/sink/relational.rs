//! Relational table sink

use async_trait::async_trait;
use booklift_common::Record;
use sqlx::SqlitePool;

use super::{Atomicity, RecordSink};
use crate::error::{BatchError, Result};
use crate::store::relational::INSERT_BOOK;
use crate::store::RelationalStore;

/// Inserts each chunk into `books` inside one transaction.
///
/// Any failing insert (a duplicate id, most commonly) rolls back the whole
/// chunk.
pub struct RelationalSink {
    name: String,
    pool: SqlitePool,
}

impl RelationalSink {
    pub fn new(store: &RelationalStore) -> Self {
        Self {
            name: "relational:books".to_string(),
            pool: store.pool().clone(),
        }
    }
}

#[async_trait]
impl RecordSink for RelationalSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::Transactional
    }

    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn write(&mut self, records: &[Record]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| BatchError::write(&self.name, err))?;

        for record in records {
            sqlx::query(INSERT_BOOK)
                .bind(record.id)
                .bind(&record.name)
                .execute(&mut *tx)
                .await
                .map_err(|err| BatchError::write(&self.name, err))?;
        }

        // Dropping `tx` on an early return rolls the chunk back.
        tx.commit()
            .await
            .map_err(|err| BatchError::write(&self.name, err))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
