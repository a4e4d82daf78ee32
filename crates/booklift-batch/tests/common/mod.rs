//! Shared fixtures for booklift-batch integration tests
//!
//! Every test gets its own temporary directory holding the input and output
//! files and both SQLite databases, so tests never share state and need no
//! external services.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use booklift_batch::store::{RelationalStore, SqliteDocumentCollection};
use booklift_batch::Settings;
use tempfile::TempDir;

/// Install a test-friendly subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("booklift_batch=debug")
        .with_test_writer()
        .try_init();
}

/// Settings pointing into a private temp directory
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Settings,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let mut settings = Settings::default();
        settings.file.input_path = dir.path().join("books.csv");
        settings.file.output_path = dir.path().join("books2.csv");
        settings.relational.url = sqlite_url(&dir.path().join("books.db"));
        settings.document.url = sqlite_url(&dir.path().join("documents.db"));

        Self { dir, settings }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.settings.batch.chunk_size = size;
        self
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_input(&self, contents: &str) {
        std::fs::write(&self.settings.file.input_path, contents).expect("Failed to write input");
    }

    pub fn read_output(&self) -> String {
        std::fs::read_to_string(&self.settings.file.output_path).expect("Failed to read output")
    }

    /// Output lines as a set, for order-insensitive comparison
    pub fn output_lines(&self) -> BTreeSet<String> {
        self.read_output().lines().map(str::to_string).collect()
    }

    pub async fn relational(&self) -> RelationalStore {
        let store = RelationalStore::connect(&self.settings.relational)
            .await
            .expect("Failed to connect relational store");
        store.migrate().await.expect("Failed to migrate");
        store
    }

    pub async fn documents(&self) -> SqliteDocumentCollection {
        SqliteDocumentCollection::connect(&self.settings.document.url, &self.settings.document.collection)
            .await
            .expect("Failed to connect document store")
    }

    /// Rows of `books` ordered by id
    pub async fn relational_rows(&self) -> Vec<(i64, String)> {
        let store = self.relational().await;
        sqlx::query_as("SELECT id, name FROM books ORDER BY id")
            .fetch_all(store.pool())
            .await
            .expect("Failed to read books")
    }
}

/// Input text with `count` well-formed lines, ids 1..=count
pub fn numbered_input(count: i64) -> String {
    (1..=count).map(|id| format!("{},Book number {}\n", id, id)).collect()
}

fn sqlite_url(path: &std::path::Path) -> String {
    format!("sqlite://{}", path.display())
}
