//! Error types for the batch pipeline
//!
//! Three conditions end a step: a malformed input item ([`BatchError::Parse`]),
//! a backend that cannot be read ([`BatchError::SourceUnavailable`]) and a
//! destination that rejected a chunk ([`BatchError::Write`]). The driver error
//! behind the last two is kept as a [`BackendError`] so it stays reachable
//! through [`std::error::Error::source`].

use booklift_common::ParseError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Pipeline error taxonomy
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Malformed record: {0}")]
    Parse(#[from] ParseError),

    #[error("Source '{name}' unavailable: {cause}")]
    SourceUnavailable {
        name: String,
        #[source]
        cause: BackendError,
    },

    #[error("Write to '{name}' failed: {cause}")]
    Write {
        name: String,
        #[source]
        cause: BackendError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BatchError {
    pub fn source_unavailable(name: impl Into<String>, cause: impl Into<BackendError>) -> Self {
        BatchError::SourceUnavailable {
            name: name.into(),
            cause: cause.into(),
        }
    }

    pub fn write(name: impl Into<String>, cause: impl Into<BackendError>) -> Self {
        BatchError::Write {
            name: name.into(),
            cause: cause.into(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, BatchError::Parse(_))
    }

    pub fn is_write(&self) -> bool {
        matches!(self, BatchError::Write { .. })
    }

    /// Whether a write was rejected by a unique constraint in the destination
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            BatchError::Write { cause, .. } => cause.is_duplicate_key(),
            _ => false,
        }
    }
}

/// The driver-level failure behind a source or sink error
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Document store error: {0}")]
    Document(String),
}

impl BackendError {
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            BackendError::Sql(sqlx::Error::Database(db)) => db.is_unique_violation(),
            #[cfg(feature = "mongodb")]
            BackendError::Mongo(err) => err.to_string().contains("E11000"),
            _ => false,
        }
    }
}
