//! In-memory `DocumentStore` double for core unit tests.
//!
//! Writes behave like a real store (each one pushes a fresh snapshot to
//! watchers of the touched collection). Tests can additionally inject raw
//! snapshots, transport errors and watch failures.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use corkboard_types::document::{Document, Fields, OrderBy, Snapshot};
use corkboard_types::error::RepositoryError;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::repository::{DocumentStore, SnapshotStream};

type SnapshotSender = mpsc::UnboundedSender<Result<Snapshot, RepositoryError>>;

struct Watcher {
    collection: String,
    order: OrderBy,
    tx: SnapshotSender,
}

#[derive(Default)]
pub(crate) struct FakeStore {
    docs: Mutex<BTreeMap<String, BTreeMap<String, Fields>>>,
    watchers: Mutex<Vec<Watcher>>,
    revision: AtomicU64,
    watch_calls: AtomicUsize,
    fail_watch: AtomicBool,
    fail_writes: AtomicBool,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_watch(&self, fail: bool) {
        self.fail_watch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Push an arbitrary snapshot to every watcher of `collection`.
    pub(crate) fn push_raw(&self, collection: &str, documents: Vec<Document>) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        for w in self.watchers.lock().unwrap().iter() {
            if w.collection == collection {
                let _ = w.tx.send(Ok(Snapshot {
                    revision,
                    documents: documents.clone(),
                }));
            }
        }
    }

    /// Push a transport error to every watcher.
    pub(crate) fn push_error(&self, err: RepositoryError) {
        for w in self.watchers.lock().unwrap().iter() {
            let _ = w.tx.send(Err(err.clone()));
        }
    }

    /// End every open watch stream.
    pub(crate) fn close_watchers(&self) {
        self.watchers.lock().unwrap().clear();
    }

    fn snapshot(&self, collection: &str, order: &OrderBy) -> Snapshot {
        let docs = self.docs.lock().unwrap();
        let mut documents: Vec<Document> = docs
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();
        order.sort(&mut documents);
        Snapshot {
            revision: self.revision.load(Ordering::SeqCst),
            documents,
        }
    }

    fn changed(&self, collection: &str) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        for w in self.watchers.lock().unwrap().iter() {
            if w.collection == collection {
                let _ = w.tx.send(Ok(self.snapshot(collection, &w.order)));
            }
        }
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        Ok(())
    }
}

impl DocumentStore for FakeStore {
    async fn watch(&self, collection: &str, order: &OrderBy) -> Result<SnapshotStream, RepositoryError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_watch.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(self.snapshot(collection, order)));
        self.watchers.lock().unwrap().push(Watcher {
            collection: collection.to_string(),
            order: order.clone(),
            tx,
        });

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String, RepositoryError> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        self.docs
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        self.changed(collection);
        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.docs
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        self.changed(collection);
        Ok(())
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        self.check_writable()?;
        {
            let mut docs = self.docs.lock().unwrap();
            let existing = docs
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or(RepositoryError::NotFound)?;
            existing.extend(fields);
        }
        self.changed(collection);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        self.check_writable()?;
        let removed = self
            .docs
            .lock()
            .unwrap()
            .get_mut(collection)
            .and_then(|c| c.remove(id));
        if removed.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.changed(collection);
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }
}

/// Notifier that records everything it is handed.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    seen: Mutex<Vec<corkboard_types::event::Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|n| n.message.clone()).collect()
    }

    pub(crate) fn errors(&self) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == corkboard_types::event::NotificationLevel::Error)
            .count()
    }
}

impl crate::event::Notifier for RecordingNotifier {
    fn notify(&self, notification: corkboard_types::event::Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
