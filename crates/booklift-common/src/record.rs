//! The record moved through the pipeline and its delimited-field codec
//!
//! A [`Record`] is opaque payload to the pipeline: every hop reads it,
//! buffers it and writes it unchanged. The only place its shape matters is
//! the field-by-position mapping used by the delimited file adapters, which
//! lives here so both directions stay in one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of delimited fields in one encoded record
pub const FIELD_COUNT: usize = 2;

/// A two-field record: identifier and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
}

impl Record {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Decode a record from its positional fields (`id`, `name`).
    ///
    /// The id tolerates surrounding whitespace; the name is taken verbatim.
    /// Any other field count, or an id that is not an integer, is a
    /// [`ParseError`] without line information (see [`ParseError::at_line`]).
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().collect();
        if fields.len() != FIELD_COUNT {
            return Err(ParseError::new(ParseErrorKind::FieldCount {
                expected: FIELD_COUNT,
                found: fields.len(),
            }));
        }

        let raw_id = fields[0].trim();
        let id = raw_id.parse::<i64>().map_err(|_| {
            ParseError::new(ParseErrorKind::InvalidId {
                value: raw_id.to_string(),
            })
        })?;

        Ok(Self::new(id, fields[1]))
    }

    /// Encode a record into its positional fields (`id`, `name`)
    pub fn to_fields(&self) -> [String; FIELD_COUNT] {
        [self.id.to_string(), self.name.clone()]
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record(id={}, name={})", self.id, self.name)
    }
}

/// What was wrong with an input item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("id '{value}' is not an integer")]
    InvalidId { value: String },

    #[error("{0}")]
    Malformed(String),
}

/// A malformed input item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", line_prefix(.line), .kind)]
pub struct ParseError {
    /// 1-based input line, when the source is line oriented
    pub line: Option<u64>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self { line: None, kind }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::Malformed(reason.into()))
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

fn line_prefix(line: &Option<u64>) -> String {
    line.map(|line| format!("line {}: ", line)).unwrap_or_default()
}
