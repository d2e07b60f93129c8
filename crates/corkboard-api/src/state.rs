//! Application state wiring stores, auth and the live board together.
//!
//! AppState holds the concrete instances used by both the CLI and the HTTP
//! server. Core types are generic over the port traits; AppState pins them to
//! the infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use corkboard_core::event::NotificationBus;
use corkboard_core::identity::IdentitySessionManager;
use corkboard_core::repository::{DocumentProfileStore, DocumentStore, SnapshotStream};
use corkboard_core::sync::{LiveCollectionSync, MessageWriter};
use corkboard_infra::auth::{LocalAuthProvider, SqliteAccounts};
use corkboard_infra::config::load_global_config;
use corkboard_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use corkboard_infra::memory::InMemoryDocumentStore;
use corkboard_infra::policy::OwnedStore;
use corkboard_infra::sqlite::{DatabasePool, SqliteDocumentStore};
use corkboard_types::config::GlobalConfig;
use corkboard_types::document::{Document, Fields, OrderBy};
use corkboard_types::error::RepositoryError;
use corkboard_types::identity::PrincipalId;

/// Where board documents (messages and profiles) live.
///
/// `Memory` backs `cork serve --ephemeral`; accounts and sessions stay in
/// SQLite either way.
pub enum BoardStore {
    Sqlite(SqliteDocumentStore),
    Memory(InMemoryDocumentStore),
}

impl BoardStore {
    pub fn kind(&self) -> &'static str {
        match self {
            BoardStore::Sqlite(_) => "sqlite",
            BoardStore::Memory(_) => "memory",
        }
    }
}

impl DocumentStore for BoardStore {
    async fn watch(&self, collection: &str, order: &OrderBy) -> Result<SnapshotStream, RepositoryError> {
        match self {
            BoardStore::Sqlite(s) => s.watch(collection, order).await,
            BoardStore::Memory(s) => s.watch(collection, order).await,
        }
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String, RepositoryError> {
        match self {
            BoardStore::Sqlite(s) => s.add_document(collection, fields).await,
            BoardStore::Memory(s) => s.add_document(collection, fields).await,
        }
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        match self {
            BoardStore::Sqlite(s) => s.set_document(collection, id, fields).await,
            BoardStore::Memory(s) => s.set_document(collection, id, fields).await,
        }
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        match self {
            BoardStore::Sqlite(s) => s.update_document(collection, id, fields).await,
            BoardStore::Memory(s) => s.update_document(collection, id, fields).await,
        }
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        match self {
            BoardStore::Sqlite(s) => s.delete_document(collection, id).await,
            BoardStore::Memory(s) => s.delete_document(collection, id).await,
        }
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        match self {
            BoardStore::Sqlite(s) => s.get_document(collection, id).await,
            BoardStore::Memory(s) => s.get_document(collection, id).await,
        }
    }
}

/// Concrete type aliases for the core generics pinned to infra implementations.
pub type Board = LiveCollectionSync<BoardStore>;

pub type ScopedWriter = MessageWriter<OwnedStore<BoardStore>>;

/// The CLI signs in as whoever the token file says, so its profile store is
/// not scoped in advance.
pub type ConcreteIdentity = IdentitySessionManager<Arc<LocalAuthProvider>, DocumentProfileStore<BoardStore>>;

/// Shared application state.
///
/// Used by both CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: Arc<GlobalConfig>,
    pub db_pool: DatabasePool,
    pub store: Arc<BoardStore>,
    pub accounts: SqliteAccounts,
    pub notifications: NotificationBus,
    pub board: Arc<Board>,
}

impl AppState {
    /// Initialize the application state: resolve the data dir, load config,
    /// connect to the database and wire the board.
    pub async fn init(ephemeral: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        let config = load_global_config(&data_dir).await;
        let db_pool = DatabasePool::open(&data_dir)
            .await
            .context("failed to open database")?;

        Ok(Self::assemble(data_dir, config, db_pool, ephemeral))
    }

    /// Wire everything on top of an already open pool.
    pub fn assemble(data_dir: PathBuf, config: GlobalConfig, db_pool: DatabasePool, ephemeral: bool) -> Self {
        let store = if ephemeral {
            tracing::info!("board documents kept in memory");
            BoardStore::Memory(InMemoryDocumentStore::new())
        } else {
            BoardStore::Sqlite(SqliteDocumentStore::new(db_pool.clone(), &config.sync))
        };
        let store = Arc::new(store);
        let accounts = SqliteAccounts::new(db_pool.clone(), &config.auth);
        let notifications = NotificationBus::new(config.sync.channel_capacity);
        let board = Arc::new(LiveCollectionSync::new(
            store.clone(),
            Arc::new(notifications.clone()),
        ));

        Self {
            data_dir,
            config: Arc::new(config),
            db_pool,
            store,
            accounts,
            notifications,
            board,
        }
    }

    /// View of the board store that only lets `principal` write its own
    /// messages and profile.
    pub fn scoped_store(&self, principal: Option<PrincipalId>) -> Arc<OwnedStore<BoardStore>> {
        Arc::new(OwnedStore::new(self.store.clone(), principal))
    }

    /// Message writer acting as `principal`.
    pub fn writer_for(&self, principal: &PrincipalId) -> ScopedWriter {
        MessageWriter::new(
            self.scoped_store(Some(principal.clone())),
            Arc::new(self.notifications.clone()),
        )
    }

    /// Profile store acting as `principal` (reads are unrestricted).
    pub fn profiles_for(&self, principal: Option<PrincipalId>) -> DocumentProfileStore<OwnedStore<BoardStore>> {
        DocumentProfileStore::new(self.scoped_store(principal))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// State over a throwaway data dir. The dir is leaked for the test's
    /// lifetime.
    pub(crate) async fn test_state(ephemeral: bool) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::mem::forget(dir);
        let pool = DatabasePool::open(&path).await.unwrap();
        AppState::assemble(path, GlobalConfig::default(), pool, ephemeral)
    }

    #[tokio::test]
    async fn test_assemble_picks_store_kind() {
        assert_eq!(test_state(false).await.store.kind(), "sqlite");
        assert_eq!(test_state(true).await.store.kind(), "memory");
    }

    #[tokio::test]
    async fn test_scoped_writer_enforces_ownership() {
        use corkboard_types::error::WriteError;
        use corkboard_types::message::MessageInput;

        let state = test_state(true).await;
        let alice = PrincipalId::new("alice");
        let bob = PrincipalId::new("bob");

        let id = state
            .writer_for(&alice)
            .create(&MessageInput::new("hi", "there"), &alice, "Alice")
            .await
            .unwrap();

        let err = state.writer_for(&bob).delete(&id).await.unwrap_err();
        assert_eq!(err, WriteError::PermissionDenied);
        state.writer_for(&alice).delete(&id).await.unwrap();
    }
}
