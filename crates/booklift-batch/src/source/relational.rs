//! Relational table source

use async_trait::async_trait;
use booklift_common::Record;
use futures::StreamExt;
use sqlx::SqlitePool;

use super::{not_open, RecordSource};
use crate::error::{BackendError, BatchError, Result};
use crate::store::relational::SELECT_BOOKS;
use crate::store::{Cursor, RelationalStore};

/// Streams every row of `books` through a single cursor query
pub struct RelationalSource {
    name: String,
    pool: SqlitePool,
    cursor: Option<Cursor<Record>>,
}

impl RelationalSource {
    pub fn new(store: &RelationalStore) -> Self {
        Self {
            name: "relational:books".to_string(),
            pool: store.pool().clone(),
            cursor: None,
        }
    }
}

#[async_trait]
impl RecordSource for RelationalSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<()> {
        // Fail here rather than on the first read when the store is gone.
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| BatchError::source_unavailable(&self.name, err))?;
        drop(conn);

        let pool = self.pool.clone();
        self.cursor = Some(Cursor::spawn(move |tx| async move {
            let mut rows = sqlx::query_as::<_, (i64, String)>(SELECT_BOOKS).fetch(&pool);
            while let Some(row) = rows.next().await {
                let record = row
                    .map(|(id, name)| Record::new(id, name))
                    .map_err(BackendError::from);
                if !tx.send(record).await {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(not_open(&self.name));
        };

        match cursor.next().await {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(err)) => Err(BatchError::source_unavailable(&self.name, err)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.cursor = None;
        Ok(())
    }
}
