//! Broadcast notification bus.
//!
//! Built on `tokio::sync::broadcast`, the `NotificationBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.

use corkboard_types::event::{Notification, NotificationLevel};
use tokio::sync::broadcast;

/// Sink for user-facing success/error notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Multi-consumer bus for [`Notification`]s.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers. Every notification is also logged.
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish a notification to all current subscribers.
    pub fn publish(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

impl Notifier for NotificationBus {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(message = %notification.message, "notify"),
            NotificationLevel::Error => tracing::warn!(message = %notification.message, "notify"),
        }
        self.publish(notification);
    }
}

impl Clone for NotificationBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
