//! In-memory document store for ephemeral boards and tests.
//!
//! Collections live in a `DashMap`; each carries a revision published on a
//! `tokio::sync::watch` channel. Watchers rebuild their ordered snapshot
//! whenever the revision moves, so bursts of writes coalesce into the latest
//! state.

use std::collections::BTreeMap;
use std::sync::Arc;

use corkboard_core::repository::{DocumentStore, SnapshotStream};
use corkboard_types::document::{Document, Fields, OrderBy, Snapshot};
use corkboard_types::error::RepositoryError;
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

struct Collection {
    docs: BTreeMap<String, Fields>,
    revision: watch::Sender<u64>,
}

impl Collection {
    fn new() -> Self {
        Self {
            docs: BTreeMap::new(),
            revision: watch::channel(0).0,
        }
    }

    fn touch(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

/// `DocumentStore` kept entirely in process memory.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<DashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, collection: &str, order: &OrderBy) -> Snapshot {
        let Some(entry) = self.collections.get(collection) else {
            return Snapshot::default();
        };
        let mut documents: Vec<Document> = entry
            .docs
            .iter()
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect();
        let revision = *entry.revision.borrow();
        drop(entry);

        order.sort(&mut documents);
        Snapshot { revision, documents }
    }

    fn revisions(&self, collection: &str) -> watch::Receiver<u64> {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new)
            .revision
            .subscribe()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn watch(&self, collection: &str, order: &OrderBy) -> Result<SnapshotStream, RepositoryError> {
        let mut revisions = self.revisions(collection);
        let store = self.clone();
        let collection = collection.to_string();
        let order = order.clone();

        let stream = async_stream::stream! {
            loop {
                let _ = revisions.borrow_and_update();
                yield Ok(store.snapshot(&collection, &order));
                if revisions.changed().await.is_err() {
                    break;
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String, RepositoryError> {
        let id = Uuid::now_v7().to_string();
        let mut entry = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        entry.docs.insert(id.clone(), fields);
        entry.touch();
        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        let mut entry = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        entry.docs.insert(id.to_string(), fields);
        entry.touch();
        Ok(())
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or(RepositoryError::NotFound)?;
        let existing = entry.docs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        existing.extend(fields);
        entry.touch();
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or(RepositoryError::NotFound)?;
        entry.docs.remove(id).ok_or(RepositoryError::NotFound)?;
        entry.touch();
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.docs.get(id).map(|fields| Document::new(id, fields.clone()))))
    }
}
