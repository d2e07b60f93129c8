//! Message create/update/delete against the document store.
//!
//! Every operation returns its `Result` to the caller and also reports the
//! outcome to the [`Notifier`]. Writes never touch the local cache; changes
//! become visible only when the live query echoes them back.

use std::sync::Arc;

use chrono::Utc;
use corkboard_types::error::WriteError;
use corkboard_types::event::Notification;
use corkboard_types::identity::PrincipalId;
use corkboard_types::message::{MESSAGES_COLLECTION, MessageInput, fields};

use crate::event::Notifier;
use crate::repository::DocumentStore;

pub struct MessageWriter<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: DocumentStore> MessageWriter<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Post a new message. `createdAt` and `updatedAt` share one timestamp.
    pub async fn create(
        &self,
        input: &MessageInput,
        author_id: &PrincipalId,
        author_name: &str,
    ) -> Result<String, WriteError> {
        let result = async {
            input.validate()?;
            let now = Utc::now();
            let id = self
                .store
                .add_document(
                    MESSAGES_COLLECTION,
                    input.creation_fields(author_id, author_name, now),
                )
                .await?;
            tracing::debug!(%id, author = %author_id, "message created");
            Ok::<_, WriteError>(id)
        }
        .await;
        self.report(result, "Message posted successfully!", "Failed to post message")
    }

    /// Replace title and content of an existing message.
    ///
    /// `updatedAt` never moves backwards, even if the local clock is behind
    /// the stored value.
    pub async fn update(&self, id: &str, input: &MessageInput) -> Result<(), WriteError> {
        let result = async {
            input.validate()?;
            let existing = self
                .store
                .get_document(MESSAGES_COLLECTION, id)
                .await?
                .ok_or(WriteError::NotFound)?;
            let now = Utc::now();
            let updated_at = existing
                .get_timestamp(fields::UPDATED_AT)
                .map_or(now, |prev| prev.max(now));
            self.store
                .update_document(MESSAGES_COLLECTION, id, input.edit_fields(updated_at))
                .await?;
            tracing::debug!(%id, "message updated");
            Ok::<_, WriteError>(())
        }
        .await;
        self.report(result, "Message updated successfully!", "Failed to update message")
    }

    pub async fn delete(&self, id: &str) -> Result<(), WriteError> {
        let result = async {
            self.store.delete_document(MESSAGES_COLLECTION, id).await?;
            tracing::debug!(%id, "message deleted");
            Ok::<_, WriteError>(())
        }
        .await;
        self.report(result, "Message deleted successfully!", "Failed to delete message")
    }

    fn report<T>(&self, result: Result<T, WriteError>, ok: &str, failed: &str) -> Result<T, WriteError> {
        match &result {
            Ok(_) => self.notifier.notify(Notification::success(ok)),
            Err(e) => {
                tracing::warn!(error = %e, "{failed}");
                self.notifier.notify(Notification::error(format!("{failed}: {e}")));
            }
        }
        result
    }
}

impl<S> Clone for MessageWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        }
    }
}
