//! Record sinks
//!
//! A sink accepts whole chunks. Whether a failed [`RecordSink::write`] can
//! leave part of the chunk behind depends on the destination, and is
//! reported by [`RecordSink::atomicity`]:
//!
//! - [`RelationalSink`] wraps each chunk in one transaction, so a failure
//!   leaves nothing behind.
//! - [`FileSink`] and [`DocumentSink`] write record by record; a failure may
//!   leave any prefix of the chunk in the destination.

use async_trait::async_trait;
use booklift_common::Record;

use crate::error::{BatchError, Result};

pub mod document;
pub mod file;
pub mod relational;

pub use document::DocumentSink;
pub use file::FileSink;
pub use relational::RelationalSink;

/// Commit guarantee a sink gives for a single chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atomicity {
    /// All records of a chunk land or none do
    Transactional,
    /// A failed write may have stored a prefix of the chunk
    BestEffort,
}

/// Accepts ordered batches of records
#[async_trait]
pub trait RecordSink: Send {
    fn name(&self) -> &str;

    fn atomicity(&self) -> Atomicity {
        Atomicity::BestEffort
    }

    /// Acquire the destination resource before the first write
    async fn open(&mut self) -> Result<()>;

    /// Write one chunk, in order. Returns once the chunk is durable.
    async fn write(&mut self, records: &[Record]) -> Result<()>;

    /// Flush and release the destination resource. Must be safe to call more
    /// than once.
    async fn close(&mut self) -> Result<()>;
}

/// Error for a write on a sink that was never opened or is already closed
pub(crate) fn not_open(name: &str) -> BatchError {
    BatchError::write(
        name,
        std::io::Error::new(std::io::ErrorKind::NotConnected, "sink is not open"),
    )
}
