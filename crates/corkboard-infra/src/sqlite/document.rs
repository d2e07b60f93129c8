//! SQLite document store implementation.
//!
//! Implements `DocumentStore` from `corkboard-core` using sqlx with split
//! read/write pools. Each collection has a revision counter bumped in the same
//! transaction as every write. Watchers are woken by an in-process broadcast
//! and also poll the counter, so writes from another process sharing the
//! database file are picked up within one poll interval.

use std::time::Duration;

use chrono::{DateTime, Utc};
use corkboard_core::repository::{DocumentStore, SnapshotStream};
use corkboard_types::config::SyncConfig;
use corkboard_types::document::{Document, Fields, OrderBy, Snapshot};
use corkboard_types::error::RepositoryError;
use sqlx::{Row, Sqlite, Transaction};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DocumentStore`.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: DatabasePool,
    changes: broadcast::Sender<String>,
    poll_interval: Duration,
}

impl SqliteDocumentStore {
    pub fn new(pool: DatabasePool, config: &SyncConfig) -> Self {
        let (changes, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            pool,
            changes,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }

    async fn current_revision(&self, collection: &str) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT revision FROM collection_revisions WHERE collection = ?")
            .bind(collection)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>("revision").map_err(query_err)? as u64),
            None => Ok(0),
        }
    }

    /// Read revision and documents in one read transaction.
    async fn snapshot(&self, collection: &str, order: &OrderBy) -> Result<Snapshot, RepositoryError> {
        let mut tx = self.pool.reader.begin().await.map_err(query_err)?;

        let revision: i64 =
            sqlx::query("SELECT revision FROM collection_revisions WHERE collection = ?")
                .bind(collection)
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_err)?
                .map(|row| row.try_get::<i64, _>("revision"))
                .transpose()
                .map_err(query_err)?
                .unwrap_or(0);

        let rows = sqlx::query("SELECT id, fields FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_all(&mut *tx)
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        let mut documents = rows
            .iter()
            .map(|row| DocumentRow::from_row(row).map_err(query_err)?.into_document())
            .collect::<Result<Vec<_>, _>>()?;
        order.sort(&mut documents);

        Ok(Snapshot {
            revision: revision as u64,
            documents,
        })
    }

    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, RepositoryError> {
        self.pool.writer.begin().await.map_err(query_err)
    }

    async fn commit(&self, mut tx: Transaction<'static, Sqlite>, collection: &str) -> Result<(), RepositoryError> {
        bump_revision(&mut tx, collection).await?;
        tx.commit().await.map_err(query_err)?;
        let _ = self.changes.send(collection.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct DocumentRow {
    id: String,
    fields: String,
}

impl DocumentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            fields: row.try_get("fields")?,
        })
    }

    fn into_document(self) -> Result<Document, RepositoryError> {
        let fields: Fields = serde_json::from_str(&self.fields)
            .map_err(|e| RepositoryError::Query(format!("invalid fields for '{}': {e}", self.id)))?;
        Ok(Document::new(self.id, fields))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_err(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn encode_fields(fields: &Fields) -> Result<String, RepositoryError> {
    serde_json::to_string(fields)
        .map_err(|e| RepositoryError::Query(format!("failed to serialize fields: {e}")))
}

async fn bump_revision(
    tx: &mut Transaction<'static, Sqlite>,
    collection: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO collection_revisions (collection, revision) VALUES (?, 1) \
         ON CONFLICT(collection) DO UPDATE SET revision = revision + 1",
    )
    .bind(collection)
    .execute(&mut **tx)
    .await
    .map_err(query_err)?;
    Ok(())
}

async fn load_fields(
    tx: &mut Transaction<'static, Sqlite>,
    collection: &str,
    id: &str,
) -> Result<Option<Fields>, RepositoryError> {
    let row = sqlx::query("SELECT id, fields FROM documents WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(query_err)?;
    row.map(|row| {
        DocumentRow::from_row(&row)
            .map_err(query_err)?
            .into_document()
            .map(|doc| doc.fields)
    })
    .transpose()
}

// ---------------------------------------------------------------------------
// DocumentStore implementation
// ---------------------------------------------------------------------------

impl DocumentStore for SqliteDocumentStore {
    async fn watch(&self, collection: &str, order: &OrderBy) -> Result<SnapshotStream, RepositoryError> {
        let mut changes = self.changes.subscribe();
        let initial = self.snapshot(collection, order).await?;
        let store = self.clone();
        let collection = collection.to_string();
        let order = order.clone();
        tracing::debug!(%collection, revision = initial.revision, "watch opened");

        let stream = async_stream::stream! {
            let mut last = initial.revision;
            let mut failing = false;
            yield Ok(initial);

            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = changes.recv() => match changed {
                        Ok(c) if c != collection => continue,
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    },
                }

                let result = match store.current_revision(&collection).await {
                    Ok(revision) if revision == last && !failing => continue,
                    Ok(_) => store.snapshot(&collection, &order).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(snapshot) => {
                        failing = false;
                        last = snapshot.revision;
                        yield Ok(snapshot);
                    }
                    Err(e) => {
                        // Report once per outage, not once per poll.
                        if !failing {
                            failing = true;
                            tracing::warn!(%collection, error = %e, "watch poll failed");
                            yield Err(e);
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String, RepositoryError> {
        let id = Uuid::now_v7().to_string();
        let now = format_datetime(&Utc::now());
        let encoded = encode_fields(&fields)?;

        let mut tx = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO documents (collection, id, fields, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&id)
        .bind(&encoded)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        self.commit(tx, collection).await?;

        tracing::debug!(%collection, %id, "document added");
        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        let now = format_datetime(&Utc::now());
        let encoded = encode_fields(&fields)?;

        let mut tx = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO documents (collection, id, fields, created_at, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(collection, id) DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&encoded)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        self.commit(tx, collection).await
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        let mut tx = self.begin_write().await?;
        let mut merged = load_fields(&mut tx, collection, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        merged.extend(fields);

        sqlx::query("UPDATE documents SET fields = ?, updated_at = ? WHERE collection = ? AND id = ?")
            .bind(encode_fields(&merged)?)
            .bind(format_datetime(&Utc::now()))
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        self.commit(tx, collection).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        let mut tx = self.begin_write().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.commit(tx, collection).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query("SELECT id, fields FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(DocumentRow::from_row(&row).map_err(query_err)?.into_document()?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corkboard_types::document::FieldValue;
    use futures_util::StreamExt;

    const WAIT: Duration = Duration::from_secs(3);

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(dir.path()).await.unwrap();
        // Leak the tempdir so it lives as long as the pool
        std::mem::forget(dir);
        pool
    }

    fn fast_polling() -> SyncConfig {
        SyncConfig {
            poll_interval_ms: 50,
            ..SyncConfig::default()
        }
    }

    async fn test_store() -> SqliteDocumentStore {
        SqliteDocumentStore::new(test_pool().await, &fast_polling())
    }

    fn fields(title: &str, at: DateTime<Utc>) -> Fields {
        let mut f = Fields::new();
        f.insert("title".to_string(), FieldValue::from(title));
        f.insert("createdAt".to_string(), FieldValue::Timestamp(at));
        f
    }

    async fn next(stream: &mut SnapshotStream) -> Snapshot {
        tokio::time::timeout(WAIT, stream.next())
            .await
            .expect("timed out waiting for snapshot")
            .expect("stream ended")
            .expect("snapshot error")
    }

    #[tokio::test]
    async fn test_add_and_get_document() {
        let store = test_store().await;
        let now = Utc::now();
        let id = store.add_document("messages", fields("hello", now)).await.unwrap();

        let doc = store.get_document("messages", &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("title"), Some("hello"));
        assert_eq!(doc.get_timestamp("createdAt"), Some(now));
        assert!(store.get_document("users", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let store = test_store().await;
        let id = store.add_document("messages", fields("old", Utc::now())).await.unwrap();

        let mut patch = Fields::new();
        patch.insert("title".to_string(), FieldValue::from("new"));
        store.update_document("messages", &id, patch.clone()).await.unwrap();

        let doc = store.get_document("messages", &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("title"), Some("new"));
        assert!(doc.get_timestamp("createdAt").is_some());

        let err = store.update_document("messages", "missing", patch).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_set_document_replaces() {
        let store = test_store().await;
        store.set_document("users", "u1", fields("first", Utc::now())).await.unwrap();

        let mut replacement = Fields::new();
        replacement.insert("username".to_string(), FieldValue::from("Alice"));
        store.set_document("users", "u1", replacement).await.unwrap();

        let doc = store.get_document("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.get_str("username"), Some("Alice"));
        assert!(doc.get("title").is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = test_store().await;
        let id = store.add_document("messages", fields("x", Utc::now())).await.unwrap();
        store.delete_document("messages", &id).await.unwrap();

        let err = store.delete_document("messages", &id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_watch_pushes_ordered_snapshots() {
        let store = test_store().await;
        let t0 = Utc::now();
        store.add_document("messages", fields("older", t0)).await.unwrap();

        let order = OrderBy::desc("createdAt");
        let mut stream = store.watch("messages", &order).await.unwrap();
        let first = next(&mut stream).await;
        assert_eq!(first.documents.len(), 1);

        store
            .add_document("messages", fields("newer", t0 + chrono::Duration::seconds(1)))
            .await
            .unwrap();
        let second = next(&mut stream).await;
        assert!(second.revision > first.revision);
        let titles: Vec<_> = second.documents.iter().filter_map(|d| d.get_str("title")).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_watch_ignores_other_collections() {
        let store = test_store().await;
        let mut stream = store.watch("messages", &OrderBy::desc("createdAt")).await.unwrap();
        next(&mut stream).await;

        store.set_document("users", "u1", fields("x", Utc::now())).await.unwrap();
        let quiet = tokio::time::timeout(Duration::from_millis(200), stream.next()).await;
        assert!(quiet.is_err(), "unexpected snapshot for unrelated collection");
    }

    #[tokio::test]
    async fn test_watch_sees_writes_from_another_store_instance() {
        let pool = test_pool().await;
        let watcher = SqliteDocumentStore::new(pool.clone(), &fast_polling());
        // Separate broadcast channel: only polling can observe its writes.
        let writer = SqliteDocumentStore::new(pool, &fast_polling());

        let mut stream = watcher.watch("messages", &OrderBy::desc("createdAt")).await.unwrap();
        assert!(next(&mut stream).await.documents.is_empty());

        writer.add_document("messages", fields("remote", Utc::now())).await.unwrap();
        let snapshot = next(&mut stream).await;
        assert_eq!(snapshot.documents.len(), 1);
    }
}
