//! Server-side access rules for shared document stores.
//!
//! [`OwnedStore`] wraps any `DocumentStore` and scopes writes to one
//! principal:
//!
//! - `messages/{id}`: anyone may read; a signed-in principal may create a
//!   message only with itself as `authorId`; update and delete require the
//!   stored `authorId` to match, and `authorId` can never change.
//! - `users/{id}`: anyone may read; only principal `id` may write it.
//! - Anonymous callers cannot write anything.

use std::sync::Arc;

use corkboard_core::repository::{DocumentStore, SnapshotStream};
use corkboard_types::document::{Document, Fields, OrderBy};
use corkboard_types::error::RepositoryError;
use corkboard_types::identity::{PrincipalId, USERS_COLLECTION};
use corkboard_types::message::{MESSAGES_COLLECTION, fields};

/// A document store view that enforces ownership for `principal`.
pub struct OwnedStore<S> {
    inner: Arc<S>,
    principal: Option<PrincipalId>,
}

impl<S: DocumentStore> OwnedStore<S> {
    pub fn new(inner: Arc<S>, principal: Option<PrincipalId>) -> Self {
        Self { inner, principal }
    }

    pub fn principal(&self) -> Option<&PrincipalId> {
        self.principal.as_ref()
    }

    fn writer(&self) -> Result<&PrincipalId, RepositoryError> {
        self.principal.as_ref().ok_or_else(|| {
            tracing::debug!("anonymous write rejected");
            RepositoryError::PermissionDenied
        })
    }

    fn deny(&self, collection: &str, id: &str, why: &str) -> RepositoryError {
        tracing::warn!(
            %collection,
            %id,
            principal = ?self.principal.as_ref().map(PrincipalId::as_str),
            "write denied: {why}"
        );
        RepositoryError::PermissionDenied
    }

    /// Stored author of a message. `NotFound` if the message does not exist.
    async fn author_of(&self, id: &str) -> Result<Option<String>, RepositoryError> {
        let doc = self
            .inner
            .get_document(MESSAGES_COLLECTION, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(doc.get_str(fields::AUTHOR_ID).map(str::to_string))
    }

    async fn check_message_owner(&self, id: &str) -> Result<(), RepositoryError> {
        let principal = self.writer()?;
        match self.author_of(id).await? {
            Some(author) if author == principal.as_str() => Ok(()),
            _ => Err(self.deny(MESSAGES_COLLECTION, id, "not the author")),
        }
    }

    fn check_profile_owner(&self, id: &str) -> Result<(), RepositoryError> {
        let principal = self.writer()?;
        if principal.as_str() == id {
            Ok(())
        } else {
            Err(self.deny(USERS_COLLECTION, id, "foreign profile"))
        }
    }

    fn check_author_field(&self, collection: &str, id: &str, fields: &Fields) -> Result<(), RepositoryError> {
        let principal = self.writer()?;
        match fields.get(fields::AUTHOR_ID).and_then(|v| v.as_str()) {
            Some(author) if author == principal.as_str() => Ok(()),
            _ => Err(self.deny(collection, id, "authorId must be the caller")),
        }
    }
}

impl<S: DocumentStore> DocumentStore for OwnedStore<S> {
    async fn watch(&self, collection: &str, order: &OrderBy) -> Result<SnapshotStream, RepositoryError> {
        self.inner.watch(collection, order).await
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String, RepositoryError> {
        self.writer()?;
        match collection {
            MESSAGES_COLLECTION => self.check_author_field(collection, "(new)", &fields)?,
            // Profiles are keyed by principal id and created with set_document.
            USERS_COLLECTION => return Err(self.deny(collection, "(new)", "profiles need an id")),
            _ => {}
        }
        self.inner.add_document(collection, fields).await
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        self.writer()?;
        match collection {
            USERS_COLLECTION => self.check_profile_owner(id)?,
            MESSAGES_COLLECTION => {
                self.check_author_field(collection, id, &fields)?;
                match self.check_message_owner(id).await {
                    Ok(()) | Err(RepositoryError::NotFound) => {}
                    Err(e) => return Err(e),
                }
            }
            _ => {}
        }
        self.inner.set_document(collection, id, fields).await
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RepositoryError> {
        self.writer()?;
        match collection {
            USERS_COLLECTION => self.check_profile_owner(id)?,
            MESSAGES_COLLECTION => {
                self.check_message_owner(id).await?;
                if fields.contains_key(fields::AUTHOR_ID) {
                    self.check_author_field(collection, id, &fields)?;
                }
            }
            _ => {}
        }
        self.inner.update_document(collection, id, fields).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        self.writer()?;
        match collection {
            USERS_COLLECTION => self.check_profile_owner(id)?,
            MESSAGES_COLLECTION => self.check_message_owner(id).await?,
            _ => {}
        }
        self.inner.delete_document(collection, id).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        self.inner.get_document(collection, id).await
    }
}
