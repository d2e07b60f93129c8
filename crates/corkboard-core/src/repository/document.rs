//! Document store trait definition.
//!
//! Models a server-authoritative document database: collections of flat
//! documents, CRUD by id, and live queries that push a full ordered
//! [`Snapshot`] on every change to the watched collection.

use std::sync::Arc;

use corkboard_types::document::{Document, Fields, OrderBy, Snapshot};
use corkboard_types::error::RepositoryError;
use futures_util::stream::BoxStream;

/// Stream of full result sets for a watched collection.
///
/// The first item is the current contents; later items follow every change.
/// An `Err` item reports a transport failure without ending the stream; the
/// stream ends when the store shuts the watch down.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, RepositoryError>>;

/// Repository trait for document persistence and change notification.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DocumentStore: Send + Sync {
    /// Open a live query over `collection` ordered by `order`.
    fn watch(
        &self,
        collection: &str,
        order: &OrderBy,
    ) -> impl std::future::Future<Output = Result<SnapshotStream, RepositoryError>> + Send;

    /// Insert a document with a store-assigned id. Returns the new id.
    fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Create or fully replace the document at `id`.
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Merge `fields` into an existing document. Returns `NotFound` if absent.
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a document. Returns `NotFound` if absent.
    fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Read a single document.
    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Document>, RepositoryError>> + Send;
}

impl<S: DocumentStore> DocumentStore for Arc<S> {
    fn watch(
        &self,
        collection: &str,
        order: &OrderBy,
    ) -> impl std::future::Future<Output = Result<SnapshotStream, RepositoryError>> + Send {
        (**self).watch(collection, order)
    }

    fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send {
        (**self).add_document(collection, fields)
    }

    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).set_document(collection, id, fields)
    }

    fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).update_document(collection, id, fields)
    }

    fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).delete_document(collection, id)
    }

    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Document>, RepositoryError>> + Send {
        (**self).get_document(collection, id)
    }
}
