//! Booklift Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling and logging for the Booklift workspace.
//!
//! - **Record**: the two-field payload moved by the pipeline, plus its
//!   field-by-position codec
//! - **Errors**: [`CommonError`] and the typed [`ParseError`]
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```
//! use booklift_common::Record;
//!
//! let record = Record::from_fields(["1", "Alice"]).unwrap();
//! assert_eq!(record.id, 1);
//! assert_eq!(record.to_fields(), ["1".to_string(), "Alice".to_string()]);
//! ```

pub mod error;
pub mod logging;
pub mod record;

pub use error::{CommonError, Result};
pub use record::{ParseError, ParseErrorKind, Record};
