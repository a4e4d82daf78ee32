//! Relational store: one `books (id, name)` table in SQLite

use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::config::RelationalSettings;
use crate::error::BackendError;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations/relational");

/// Full-table read used by the migrate step (store default order)
pub const SELECT_BOOKS: &str = "SELECT id, name FROM books";

/// Parameterized insert used by the load step
pub const INSERT_BOOK: &str = "INSERT INTO books (id, name) VALUES (?, ?)";

/// Connection pool for the relational store
#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    pub async fn connect(settings: &RelationalSettings) -> Result<Self, BackendError> {
        let options = SqliteConnectOptions::from_str(&settings.url)?.create_if_missing(true);

        // A pool of in-memory connections would be a pool of separate
        // databases; keep every connection for the life of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        info!(url = %settings.url, "Connected to relational store");
        Ok(Self { pool })
    }

    /// Create the `books` table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), BackendError> {
        MIGRATOR.run(&self.pool).await?;
        debug!("Relational migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64, BackendError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
