//! Record sources
//!
//! A source is a single forward-only cursor: [`RecordSource::open`] acquires
//! the backend resource and runs the query once, [`RecordSource::next`] hands
//! out records until `Ok(None)`, and [`RecordSource::close`] releases the
//! resource. The step calls `close` on every exit path.

use async_trait::async_trait;
use booklift_common::Record;

use crate::error::{BatchError, Result};

pub mod document;
pub mod file;
pub mod relational;

pub use document::DocumentSource;
pub use file::FileSource;
pub use relational::RelationalSource;

/// Produces records one at a time, in extraction order
#[async_trait]
pub trait RecordSource: Send {
    /// Human-readable name for logs and errors, e.g. `file:books.csv`
    fn name(&self) -> &str;

    /// Acquire the backend resource and position the cursor at the start
    async fn open(&mut self) -> Result<()>;

    /// Next record, or `None` once the cursor is exhausted
    async fn next(&mut self) -> Result<Option<Record>>;

    /// Release the backend resource. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Error for a read on a source that was never opened or is already closed
pub(crate) fn not_open(name: &str) -> BatchError {
    BatchError::source_unavailable(
        name,
        std::io::Error::new(std::io::ErrorKind::NotConnected, "source is not open"),
    )
}
