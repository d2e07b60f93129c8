//! User-facing notification channel.
//!
//! Operations report their outcome through a [`Notifier`] so that callers
//! get a `Result` while a UI layer (CLI, websocket) can surface success and
//! failure toasts independently.

pub mod bus;

pub use bus::{NotificationBus, Notifier};
