//! Configuration management
//!
//! Settings resolve in three layers: built-in defaults, an optional TOML
//! file, then environment variables (a `.env` file in the working directory
//! is loaded first). The result is validated before anything connects.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use booklift_common::CommonError;
use serde::{Deserialize, Serialize};

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::processor::FaultPolicy;

// ============================================================================
// Defaults
// ============================================================================

/// Default input file for the load step.
pub const DEFAULT_INPUT_PATH: &str = "books.csv";

/// Default output file for the export step.
pub const DEFAULT_OUTPUT_PATH: &str = "books2.csv";

/// Default field delimiter for both files.
pub const DEFAULT_DELIMITER: char = ',';

/// Default relational database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://booklift.db";

/// Default maximum relational connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 1;

/// Default document store URL.
pub const DEFAULT_DOCUMENT_URL: &str = "sqlite://booklift-documents.db";

/// Default document database name (MongoDB only).
pub const DEFAULT_DOCUMENT_DATABASE: &str = "booklift";

/// Default document collection.
pub const DEFAULT_DOCUMENT_COLLECTION: &str = "books";

/// Default field the export step sorts the collection by.
pub const DEFAULT_SORT_FIELD: &str = "status";

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub batch: BatchSettings,
    pub file: FileSettings,
    pub relational: RelationalSettings,
    pub document: DocumentSettings,
    pub fault: FaultSettings,
}

/// Chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub chunk_size: usize,
}

/// Input and output files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub delimiter: char,
    /// Append to the output file instead of truncating it
    pub append_output: bool,
}

/// Relational store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalSettings {
    pub url: String,
    pub max_connections: u32,
    /// Create the `books` table at startup if it is missing
    pub run_migrations: bool,
}

/// Document store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// `sqlite://...` for the embedded store, `mongodb://...` with the
    /// `mongodb` feature
    pub url: String,
    pub database: String,
    pub collection: String,
    pub sort_field: String,
}

/// Skip and retry thresholds. All zero means any bad item or failed write
/// fails the step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultSettings {
    pub skip_limit: u64,
    pub write_retry_limit: u32,
    pub retry_backoff_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            delimiter: DEFAULT_DELIMITER,
            append_output: false,
        }
    }
}

impl Default for RelationalSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            run_migrations: true,
        }
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DOCUMENT_URL.to_string(),
            database: DEFAULT_DOCUMENT_DATABASE.to_string(),
            collection: DEFAULT_DOCUMENT_COLLECTION.to_string(),
            sort_field: DEFAULT_SORT_FIELD.to_string(),
        }
    }
}

impl Settings {
    /// Load and validate settings from defaults, an optional TOML file and
    /// the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = Self::resolve(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Layer defaults, an optional TOML file and the environment without
    /// validating, so command-line overrides can still be applied
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.merge_env()
    }

    /// Apply `run` command-line overrides; they take precedence over every
    /// other layer
    pub fn with_overrides(
        mut self,
        chunk_size: Option<usize>,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Self {
        if let Some(size) = chunk_size {
            self.batch.chunk_size = size;
        }
        if let Some(input) = input {
            self.file.input_path = input;
        }
        if let Some(output) = output {
            self.file.output_path = output;
        }
        self
    }

    /// Parse a TOML settings file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Apply environment variable overrides
    ///
    /// - `BOOKLIFT_CHUNK_SIZE`, `BOOKLIFT_INPUT`, `BOOKLIFT_OUTPUT`,
    ///   `BOOKLIFT_DELIMITER`
    /// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`
    /// - `DOCUMENT_URL`, `DOCUMENT_COLLECTION`
    pub fn merge_env(mut self) -> anyhow::Result<Self> {
        if let Some(size) = env_parse("BOOKLIFT_CHUNK_SIZE")? {
            self.batch.chunk_size = size;
        }
        if let Ok(input) = std::env::var("BOOKLIFT_INPUT") {
            self.file.input_path = PathBuf::from(input);
        }
        if let Ok(output) = std::env::var("BOOKLIFT_OUTPUT") {
            self.file.output_path = PathBuf::from(output);
        }
        if let Some(delimiter) = env_parse("BOOKLIFT_DELIMITER")? {
            self.file.delimiter = delimiter;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.relational.url = url;
        }
        if let Some(max) = env_parse("DATABASE_MAX_CONNECTIONS")? {
            self.relational.max_connections = max;
        }
        if let Ok(url) = std::env::var("DOCUMENT_URL") {
            self.document.url = url;
        }
        if let Ok(collection) = std::env::var("DOCUMENT_COLLECTION") {
            self.document.collection = collection;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> booklift_common::Result<()> {
        if self.batch.chunk_size == 0 {
            return Err(config_error("Chunk size must be greater than 0"));
        }

        if !self.file.delimiter.is_ascii() {
            return Err(config_error(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.file.delimiter
            )));
        }
        if matches!(self.file.delimiter, '\n' | '\r') {
            return Err(config_error("Delimiter cannot be a line terminator"));
        }

        if self.file.input_path.as_os_str().is_empty() {
            return Err(config_error("Input path cannot be empty"));
        }
        if self.file.output_path.as_os_str().is_empty() {
            return Err(config_error("Output path cannot be empty"));
        }
        if same_file(&self.file.input_path, &self.file.output_path) {
            return Err(config_error(format!(
                "Input and output must be different files, both are {}",
                self.file.input_path.display()
            )));
        }

        if self.relational.url.is_empty() {
            return Err(config_error("Database URL cannot be empty"));
        }
        if self.relational.max_connections == 0 {
            return Err(config_error("Database max_connections must be greater than 0"));
        }

        if self.document.url.is_empty() {
            return Err(config_error("Document store URL cannot be empty"));
        }
        if self.document.collection.is_empty() {
            return Err(config_error("Document collection cannot be empty"));
        }
        if self.document.sort_field.is_empty() {
            return Err(config_error("Document sort field cannot be empty"));
        }

        Ok(())
    }

    /// Field delimiter as the byte the CSV codec expects. Only meaningful
    /// after [`Settings::validate`].
    pub fn delimiter_byte(&self) -> u8 {
        let mut buf = [0u8; 4];
        self.file.delimiter.encode_utf8(&mut buf);
        buf[0]
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        FaultPolicy {
            skip_limit: self.fault.skip_limit,
            write_retry_limit: self.fault.write_retry_limit,
            retry_backoff: Duration::from_millis(self.fault.retry_backoff_ms),
        }
    }
}

fn config_error(message: impl Into<String>) -> CommonError {
    CommonError::Config(message.into())
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("Invalid {}='{}': {}", key, value, err)),
        Err(_) => Ok(None),
    }
}

/// Whether two paths name the same file. Paths that do not exist yet are
/// compared as written.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
