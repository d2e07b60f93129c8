//! Identity types: principals, credentials, sessions and user profiles.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::document::{Document, FieldValue, Fields};

/// Collection holding user profiles, keyed by principal id.
pub const USERS_COLLECTION: &str = "users";

/// Stored field names for `users/{id}`.
pub mod profile_fields {
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const CREATED_AT: &str = "createdAt";
}

/// Opaque identifier of an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: PrincipalId,
    pub email: Option<String>,
    /// Display name known to the provider (external providers usually have one).
    pub display_name: Option<String>,
}

/// Email + password credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Identity asserted by an external provider after its own sign-in flow.
///
/// `subject` is the provider's stable user id. An assertion is only ever
/// built from a completed provider flow; a cancelled flow yields no assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAssertion {
    pub provider: String,
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Client-side view of who is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Absent means anonymous.
    pub principal: Option<PrincipalId>,
    pub email: Option<String>,
    /// Resolved from the profile store, cached for the session.
    pub display_name: Option<String>,
    /// True while a mutating identity operation is in flight.
    pub loading: bool,
    /// True once the first provider event has been processed.
    pub initialized: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// Persisted user profile (`users/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert(profile_fields::USERNAME.to_string(), self.username.as_str().into());
        f.insert(profile_fields::EMAIL.to_string(), self.email.as_str().into());
        f.insert(
            profile_fields::CREATED_AT.to_string(),
            FieldValue::Timestamp(self.created_at),
        );
        f
    }

    /// Decode a stored profile. A record without a usable username decodes
    /// to `None`, which callers treat like a missing profile.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let username = doc
            .get_str(profile_fields::USERNAME)
            .filter(|u| !u.trim().is_empty())?
            .to_string();
        Some(Self {
            username,
            email: doc.get_str(profile_fields::EMAIL).unwrap_or_default().to_string(),
            created_at: doc
                .get_timestamp(profile_fields::CREATED_AT)
                .unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_principal_id_serializes_as_string() {
        let id = PrincipalId::new("u-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u-123\"");
        assert_eq!(id.to_string(), "u-123");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("a@b.co", "hunter22");
        assert_eq!(creds.password.expose_secret(), "hunter22");
        assert!(!format!("{creds:?}").contains("hunter22"));
    }

    #[test]
    fn test_profile_document_shape() {
        let profile = Profile {
            username: "SwiftPanda7".to_string(),
            email: "a@b.co".to_string(),
            created_at: Utc::now(),
        };
        let doc = Document::new("u1", profile.to_fields());
        let keys: Vec<&str> = doc.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["createdAt", "email", "username"]);
        assert_eq!(Profile::from_document(&doc), Some(profile));
    }

    #[test]
    fn test_profile_without_username_is_none() {
        let mut fields = Fields::new();
        fields.insert("username".to_string(), FieldValue::String("  ".to_string()));
        assert!(Profile::from_document(&Document::new("u1", fields)).is_none());
    }

    #[test]
    fn test_default_session_is_anonymous() {
        let s = Session::default();
        assert!(!s.is_authenticated());
        assert!(!s.loading);
        assert!(!s.initialized);
    }
}
