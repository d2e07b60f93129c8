//! Live, ordered local cache of the `messages` collection.
//!
//! [`LiveCollectionSync`] keeps exactly one live query open against the
//! document store while subscribed. Every snapshot the store pushes fully
//! replaces the cache; there is no incremental merge and no optimistic
//! insert. Readers get cheap `Arc<[Message]>` clones through a
//! `tokio::sync::watch` channel.
//!
//! Attach/detach is serialized through a single control lock. Each
//! attachment gets a generation number, and the listener task only applies
//! a snapshot if its generation is still current when it takes the lock.
//! Once [`SubscriptionHandle::unsubscribe`] returns, no snapshot from that
//! attachment can reach the cache.

use std::sync::Arc;

use chrono::Utc;
use corkboard_types::document::{OrderBy, Snapshot};
use corkboard_types::error::SubscriptionError;
use corkboard_types::event::{Notification, SyncState};
use corkboard_types::message::{MESSAGES_COLLECTION, Message, fields};
use futures_util::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use super::writer::MessageWriter;
use crate::event::Notifier;
use crate::repository::DocumentStore;

/// What readers see: the current message list plus how many snapshots have
/// been applied to produce it.
#[derive(Debug, Clone)]
pub struct BoardView {
    /// Newest first (`createdAt` desc, ties by id desc).
    pub messages: Arc<[Message]>,
    /// Number of snapshots applied since construction.
    pub applied: u64,
}

impl Default for BoardView {
    fn default() -> Self {
        Self {
            messages: Arc::from(Vec::new()),
            applied: 0,
        }
    }
}

pub struct LiveCollectionSync<S> {
    inner: Arc<Inner<S>>,
    writer: MessageWriter<S>,
}

struct Inner<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    control: Mutex<Control>,
    view: watch::Sender<BoardView>,
    state: watch::Sender<SyncState>,
}

#[derive(Default)]
struct Control {
    state: SyncState,
    generation: u64,
    /// `None` once the listener task has exited, even if `state` is `Error`.
    listener: Option<CancellationToken>,
}

impl Control {
    /// Whether a listener task is still reading the live query.
    fn is_live(&self) -> bool {
        match self.state {
            SyncState::Unsubscribed => false,
            SyncState::Error => self.listener.is_some(),
            SyncState::Subscribing | SyncState::Synced => true,
        }
    }
}

/// Handle returned by [`LiveCollectionSync::subscribe`].
///
/// Dropping the handle does not detach; call [`unsubscribe`](Self::unsubscribe).
/// Handles from a redundant `subscribe` call, or from an attachment that has
/// since been replaced, are inert.
#[must_use = "dropping the handle leaves the subscription attached"]
pub struct SubscriptionHandle<S> {
    inner: Arc<Inner<S>>,
    generation: Option<u64>,
}

impl<S: DocumentStore + 'static> LiveCollectionSync<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        let (view, _) = watch::channel(BoardView::default());
        let (state, _) = watch::channel(SyncState::Unsubscribed);
        let writer = MessageWriter::new(store.clone(), notifier.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                notifier,
                control: Mutex::new(Control::default()),
                view,
                state,
            }),
            writer,
        }
    }

    /// Attach the live query.
    ///
    /// A no-op while a listener is running (`Subscribing`, `Synced`, or an
    /// `Error` the listener may still recover from): the store is not queried
    /// again and the returned handle does nothing. From `Unsubscribed`, or
    /// from an `Error` whose listener has exited, a fresh query is opened.
    pub async fn subscribe(&self) -> SubscriptionHandle<S> {
        let mut control = self.inner.control.lock().await;
        if control.is_live() {
            tracing::debug!(state = %control.state, "already subscribed");
            return SubscriptionHandle {
                inner: self.inner.clone(),
                generation: None,
            };
        }

        control.generation += 1;
        let generation = control.generation;
        let cancel = CancellationToken::new();
        control.listener = Some(cancel.clone());
        self.inner.set_state(&mut control, SyncState::Subscribing);
        drop(control);

        tracing::info!(generation, "subscribing to messages");
        tokio::spawn(listen(self.inner.clone(), generation, cancel));

        SubscriptionHandle {
            inner: self.inner.clone(),
            generation: Some(generation),
        }
    }

    /// Current ordered message list.
    pub fn messages(&self) -> Arc<[Message]> {
        self.inner.view.borrow().messages.clone()
    }

    /// Receiver that observes every cache replacement.
    pub fn watch_messages(&self) -> watch::Receiver<BoardView> {
        self.inner.view.subscribe()
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    /// Number of snapshots applied so far.
    pub fn applied_snapshots(&self) -> u64 {
        self.inner.view.borrow().applied
    }

    /// Writer sharing this sync's store and notifier.
    pub fn writer(&self) -> &MessageWriter<S> {
        &self.writer
    }

    /// Detach whatever attachment is current. Idempotent.
    pub async fn dispose(&self) {
        let generation = self.inner.control.lock().await.generation;
        self.inner.detach(generation).await;
    }
}

impl<S> SubscriptionHandle<S> {
    /// Detach the live query. When this returns, no further snapshot from
    /// this attachment will be applied.
    pub async fn unsubscribe(self) {
        if let Some(generation) = self.generation {
            self.inner.detach(generation).await;
        }
    }

    /// Whether this handle owns an attachment (false for redundant subscribes).
    pub fn is_active(&self) -> bool {
        self.generation.is_some()
    }
}

impl<S> Inner<S> {
    fn set_state(&self, control: &mut Control, state: SyncState) {
        control.state = state;
        self.state.send_replace(state);
    }

    async fn detach(&self, generation: u64) -> bool {
        let mut control = self.control.lock().await;
        if control.generation != generation || control.state == SyncState::Unsubscribed {
            return false;
        }
        control.generation += 1;
        if let Some(cancel) = control.listener.take() {
            cancel.cancel();
        }
        self.set_state(&mut control, SyncState::Unsubscribed);
        tracing::info!(generation, "unsubscribed from messages");
        true
    }

    /// Replace the cache with `snapshot` if `generation` is still current.
    async fn apply(&self, generation: u64, snapshot: Snapshot) -> bool {
        let received_at = Utc::now();
        let messages: Vec<Message> = snapshot
            .documents
            .iter()
            .filter_map(|doc| match Message::from_document(doc, received_at) {
                Ok(message) => Some(message),
                Err(reason) => {
                    tracing::warn!(%reason, "skipping malformed message");
                    None
                }
            })
            .collect();

        let mut control = self.control.lock().await;
        if control.generation != generation {
            return false;
        }
        self.view.send_modify(|view| {
            view.messages = Arc::from(messages);
            view.applied += 1;
        });
        if control.state != SyncState::Synced {
            self.set_state(&mut control, SyncState::Synced);
        }
        tracing::debug!(revision = snapshot.revision, "applied snapshot");
        true
    }

    /// Move to `Error` if `generation` is still current. The cache is kept.
    ///
    /// A `terminal` failure means the listener is about to exit, so the
    /// attachment is released and the next `subscribe` opens a new query.
    async fn fail(&self, generation: u64, err: SubscriptionError, terminal: bool) -> bool {
        let mut control = self.control.lock().await;
        if control.generation != generation {
            return false;
        }
        if terminal {
            control.listener = None;
        }
        self.set_state(&mut control, SyncState::Error);
        drop(control);

        tracing::warn!(error = %err, "message subscription failed");
        self.notifier
            .notify(Notification::error("Failed to load messages"));
        true
    }
}

async fn listen<S: DocumentStore + 'static>(
    inner: Arc<Inner<S>>,
    generation: u64,
    cancel: CancellationToken,
) {
    let order = OrderBy::desc(fields::CREATED_AT);
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = inner.store.watch(MESSAGES_COLLECTION, &order) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            inner.fail(generation, e.into(), true).await;
            return;
        }
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        let current = match next {
            Some(Ok(snapshot)) => inner.apply(generation, snapshot).await,
            Some(Err(e)) => inner.fail(generation, e.into(), false).await,
            None => {
                inner.fail(generation, SubscriptionError::Closed, true).await;
                break;
            }
        };
        if !current {
            break;
        }
    }
    tracing::debug!(generation, "listener stopped");
}
