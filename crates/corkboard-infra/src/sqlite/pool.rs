//! Connection pools for the board database.
//!
//! Board writes are small and serialized through one writer connection, which
//! also owns the migrations. Watchers and HTTP reads share a read-only pool,
//! so a burst of snapshot queries never waits behind a write. WAL mode lets
//! other processes (a CLI posting while `cork serve` runs) open the same file.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const DATABASE_FILE: &str = "corkboard.db";
const READER_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader and writer pools over one SQLite file.
#[derive(Clone)]
pub struct DatabasePool {
    /// Read-only connections for snapshots and lookups.
    pub reader: SqlitePool,
    /// The single connection every write goes through.
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Connect to `database_url` and bring the schema up to date.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        // Readers are opened read-only, so the schema must exist first.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }

    /// Open (creating if needed) the database inside `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self, sqlx::Error> {
        tokio::fs::create_dir_all(data_dir).await?;
        let url = database_url(data_dir);
        tracing::debug!(%url, "opening database");
        Self::new(&url).await
    }
}

/// Database URL for `{data_dir}/corkboard.db`, created on first use.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join(DATABASE_FILE).display())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_pool() -> (tempfile::TempDir, DatabasePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_migrations_create_board_schema() {
        let (_dir, pool) = temp_pool().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        for expected in ["accounts", "auth_sessions", "collection_revisions", "documents"] {
            assert!(names.contains(&expected), "{expected} missing from {names:?}");
        }
    }

    #[tokio::test]
    async fn test_writer_pragmas() {
        let (_dir, pool) = temp_pool().await;

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let (fk,): (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_reader_rejects_writes() {
        let (_dir, pool) = temp_pool().await;

        let result = sqlx::query("INSERT INTO collection_revisions (collection, revision) VALUES ('x', 1)")
            .execute(&pool.reader)
            .await;
        assert!(result.is_err());

        sqlx::query("INSERT INTO collection_revisions (collection, revision) VALUES ('x', 1)")
            .execute(&pool.writer)
            .await
            .unwrap();
        let (revision,): (i64,) =
            sqlx::query_as("SELECT revision FROM collection_revisions WHERE collection = 'x'")
                .fetch_one(&pool.reader)
                .await
                .unwrap();
        assert_eq!(revision, 1);
    }

    #[tokio::test]
    async fn test_open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path());
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("corkboard.db?mode=rwc"));

        let nested = dir.path().join("nested").join("data");
        let pool = DatabasePool::open(&nested).await.unwrap();
        drop(pool);
        assert!(nested.join(DATABASE_FILE).exists());
    }
}
