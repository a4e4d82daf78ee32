//! Connectors to the external stores
//!
//! The pipeline never talks to a driver directly. It needs two things from a
//! store: a forward-only read cursor and a way to write a batch. Everything
//! else about the drivers (pooling, migrations, URLs) stays in here.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::BackendError;

pub mod document;
pub mod relational;

pub use document::{connect_documents, Document, DocumentCollection, SqliteDocumentCollection};
#[cfg(feature = "mongodb")]
pub use document::MongoCollection;
pub use relational::RelationalStore;

/// Rows buffered between a running query and its consumer
pub const CURSOR_BUFFER: usize = 64;

/// A forward-only cursor over a query running in a background task.
///
/// The query is issued exactly once, when the cursor is spawned. Rows are
/// delivered in query order through a bounded channel; the first error ends
/// the stream. Dropping the cursor aborts the task, which releases the
/// connection it holds.
pub struct Cursor<T> {
    rows: mpsc::Receiver<Result<T, BackendError>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Cursor<T> {
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(RowSender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rows) = mpsc::channel(CURSOR_BUFFER);
        let task = tokio::spawn(producer(RowSender { tx }));
        Self { rows, task }
    }

    /// Next row, or `None` once the query is exhausted
    pub async fn next(&mut self) -> Option<Result<T, BackendError>> {
        self.rows.recv().await
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Producer half of a [`Cursor`]
pub struct RowSender<T> {
    tx: mpsc::Sender<Result<T, BackendError>>,
}

impl<T> RowSender<T> {
    /// Forward one row. Returns `false` when the producer should stop: the
    /// row was an error, or nobody is reading any more.
    pub async fn send(&self, row: Result<T, BackendError>) -> bool {
        let keep_going = row.is_ok();
        self.tx.send(row).await.is_ok() && keep_going
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cursor_delivers_in_order_then_ends() {
        let mut cursor = Cursor::spawn(|tx| async move {
            for n in 0..3 {
                if !tx.send(Ok(n)).await {
                    return;
                }
            }
        });

        let mut seen = Vec::new();
        while let Some(row) = cursor.next().await {
            seen.push(row.ok());
        }
        assert_eq!(seen, vec![Some(0), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_cursor_stops_after_first_error() {
        let mut cursor: Cursor<i32> = Cursor::spawn(|tx| async move {
            let _ = tx.send(Ok(1)).await;
            if !tx.send(Err(BackendError::Document("gone".into()))).await {
                return;
            }
            let _ = tx.send(Ok(2)).await;
        });

        assert!(matches!(cursor.next().await, Some(Ok(1))));
        assert!(matches!(cursor.next().await, Some(Err(_))));
        assert!(cursor.next().await.is_none());
    }
}
