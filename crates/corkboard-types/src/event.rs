//! Event types pushed to board viewers and to the notification side-channel.
//!
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Lifecycle of a live collection subscription.
///
/// `Unsubscribed -> Subscribing -> Synced <-> Error`. `Synced` is re-entered
/// after every applied snapshot; `Error` returns to `Synced` on the next push
/// while the listener is still reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Unsubscribed,
    Subscribing,
    Synced,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Unsubscribed => write!(f, "unsubscribed"),
            SyncState::Subscribing => write!(f, "subscribing"),
            SyncState::Synced => write!(f, "synced"),
            SyncState::Error => write!(f, "error"),
        }
    }
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A toast-style notification describing the outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Frames pushed to live board viewers (WebSocket clients).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    /// The full, ordered message list after an applied snapshot.
    Messages {
        messages: Vec<Message>,
        applied: u64,
    },

    /// The server-side subscription changed state.
    SyncState { state: SyncState },

    /// Reply to a client ping.
    Pong,
}
