//! Profile store trait and its document-backed implementation.

use std::sync::Arc;

use corkboard_types::error::RepositoryError;
use corkboard_types::identity::{PrincipalId, Profile, USERS_COLLECTION};

use super::document::DocumentStore;

/// Storage of user profiles keyed by principal id.
pub trait ProfileStore: Send + Sync {
    /// Load a profile. `None` if the principal never registered one.
    fn get_profile(
        &self,
        id: &PrincipalId,
    ) -> impl std::future::Future<Output = Result<Option<Profile>, RepositoryError>> + Send;

    /// Create or replace a profile.
    fn put_profile(
        &self,
        id: &PrincipalId,
        profile: &Profile,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// `ProfileStore` over the `users` collection of any document store.
pub struct DocumentProfileStore<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> DocumentProfileStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: DocumentStore> ProfileStore for DocumentProfileStore<S> {
    async fn get_profile(&self, id: &PrincipalId) -> Result<Option<Profile>, RepositoryError> {
        let doc = self
            .store
            .get_document(USERS_COLLECTION, id.as_str())
            .await?;
        Ok(doc.as_ref().and_then(Profile::from_document))
    }

    async fn put_profile(&self, id: &PrincipalId, profile: &Profile) -> Result<(), RepositoryError> {
        self.store
            .set_document(USERS_COLLECTION, id.as_str(), profile.to_fields())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_put_then_get_profile() {
        let store = Arc::new(FakeStore::new());
        let profiles = DocumentProfileStore::new(store.clone());
        let id = PrincipalId::new("u1");
        let profile = Profile {
            username: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            created_at: Utc::now(),
        };

        profiles.put_profile(&id, &profile).await.unwrap();

        assert_eq!(profiles.get_profile(&id).await.unwrap(), Some(profile));
        let raw = store.get_document(USERS_COLLECTION, "u1").await.unwrap().unwrap();
        assert_eq!(raw.get_str("username"), Some("Alice"));
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let profiles = DocumentProfileStore::new(Arc::new(FakeStore::new()));
        let found = profiles.get_profile(&PrincipalId::new("ghost")).await.unwrap();
        assert!(found.is_none());
    }
}
