//! Board message domain types.
//!
//! A `Message` is the decoded form of a document in the `messages`
//! collection. Field names on the stored document are fixed (camelCase) so
//! any store holding the same records can be read back unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Document, FieldValue, Fields};
use crate::error::WriteError;
use crate::identity::PrincipalId;

/// Collection holding board messages.
pub const MESSAGES_COLLECTION: &str = "messages";

/// Stored field names for `messages/{id}`.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    pub const AUTHOR_ID: &str = "authorId";
    pub const AUTHOR_NAME: &str = "authorName";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum content length in characters.
pub const MAX_CONTENT_LEN: usize = 5000;

/// A message posted to the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned document id.
    pub id: String,
    pub title: String,
    pub content: String,
    /// Principal that created the message.
    pub author_id: PrincipalId,
    /// Display name at posting time (denormalized, may diverge from the profile).
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Decode a stored document.
    ///
    /// Text fields are required. Missing or mistyped timestamps fall back to
    /// `received_at` so a half-written document still renders.
    pub fn from_document(doc: &Document, received_at: DateTime<Utc>) -> Result<Self, String> {
        let text = |name: &str| {
            doc.get_str(name)
                .map(str::to_string)
                .ok_or_else(|| format!("message '{}' is missing text field '{name}'", doc.id))
        };

        Ok(Self {
            id: doc.id.clone(),
            title: text(fields::TITLE)?,
            content: text(fields::CONTENT)?,
            author_id: PrincipalId::new(text(fields::AUTHOR_ID)?),
            author_name: text(fields::AUTHOR_NAME)?,
            created_at: doc.get_timestamp(fields::CREATED_AT).unwrap_or(received_at),
            updated_at: doc.get_timestamp(fields::UPDATED_AT).unwrap_or(received_at),
        })
    }
}

/// User-editable part of a message. Title and content always change together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInput {
    pub title: String,
    pub content: String,
}

impl MessageInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Reject blank or oversized title/content.
    pub fn validate(&self) -> Result<(), WriteError> {
        check_text("title", &self.title, MAX_TITLE_LEN)?;
        check_text("content", &self.content, MAX_CONTENT_LEN)
    }

    /// Fields written when a message is first created.
    pub fn creation_fields(
        &self,
        author_id: &PrincipalId,
        author_name: &str,
        now: DateTime<Utc>,
    ) -> Fields {
        let mut f = self.edit_fields(now);
        f.insert(fields::AUTHOR_ID.to_string(), author_id.as_str().into());
        f.insert(fields::AUTHOR_NAME.to_string(), author_name.into());
        f.insert(fields::CREATED_AT.to_string(), FieldValue::Timestamp(now));
        f
    }

    /// Fields overwritten by an edit: title, content and updatedAt only.
    pub fn edit_fields(&self, updated_at: DateTime<Utc>) -> Fields {
        let mut f = Fields::new();
        f.insert(fields::TITLE.to_string(), self.title.as_str().into());
        f.insert(fields::CONTENT.to_string(), self.content.as_str().into());
        f.insert(fields::UPDATED_AT.to_string(), FieldValue::Timestamp(updated_at));
        f
    }
}

fn check_text(name: &str, value: &str, max: usize) -> Result<(), WriteError> {
    if value.trim().is_empty() {
        return Err(WriteError::Invalid(format!("{name} cannot be empty")));
    }
    let len = value.chars().count();
    if len > max {
        return Err(WriteError::Invalid(format!(
            "{name} is {len} characters, maximum is {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str) -> Document {
        let now = Utc::now();
        let input = MessageInput::new("Hello", "First post");
        Document::new(id, input.creation_fields(&PrincipalId::new("p1"), "Alice", now))
    }

    #[test]
    fn test_creation_fields_have_equal_timestamps() {
        let doc = stored("m1");
        assert_eq!(doc.fields.len(), 6);
        assert_eq!(
            doc.get_timestamp(fields::CREATED_AT),
            doc.get_timestamp(fields::UPDATED_AT)
        );
        assert_eq!(doc.get_str(fields::AUTHOR_ID), Some("p1"));
    }

    #[test]
    fn test_edit_fields_leave_author_untouched() {
        let f = MessageInput::new("T", "C").edit_fields(Utc::now());
        assert_eq!(f.len(), 3);
        assert!(!f.contains_key(fields::AUTHOR_ID));
        assert!(!f.contains_key(fields::AUTHOR_NAME));
        assert!(!f.contains_key(fields::CREATED_AT));
    }

    #[test]
    fn test_from_document() {
        let msg = Message::from_document(&stored("m1"), Utc::now()).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.title, "Hello");
        assert_eq!(msg.author_name, "Alice");
        assert!(msg.created_at <= msg.updated_at);
    }

    #[test]
    fn test_from_document_missing_timestamps_fall_back() {
        let mut doc = stored("m1");
        doc.fields.remove(fields::CREATED_AT);
        doc.fields.remove(fields::UPDATED_AT);
        let fallback = Utc::now();
        let msg = Message::from_document(&doc, fallback).unwrap();
        assert_eq!(msg.created_at, fallback);
        assert_eq!(msg.updated_at, fallback);
    }

    #[test]
    fn test_from_document_missing_title_is_error() {
        let mut doc = stored("m1");
        doc.fields.remove(fields::TITLE);
        let err = Message::from_document(&doc, Utc::now()).unwrap_err();
        assert!(err.contains("title"));
    }

    #[test]
    fn test_validate_rejects_blank() {
        assert!(MessageInput::new("  ", "body").validate().is_err());
        assert!(MessageInput::new("title", "").validate().is_err());
        assert!(MessageInput::new("title", "body").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_title() {
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        let err = MessageInput::new(long, "body").validate().unwrap_err();
        assert!(matches!(err, WriteError::Invalid(msg) if msg.contains("maximum")));
    }

    #[test]
    fn test_message_json_is_camel_case() {
        let msg = Message::from_document(&stored("m1"), Utc::now()).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"authorId\":\"p1\""));
        assert!(json.contains("\"createdAt\""));
    }
}
