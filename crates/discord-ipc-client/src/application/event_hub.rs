//! Broadcast of decoded frames to independent subscribers.
//!
//! Every subscriber owns an unbounded queue, so a slow consumer accumulates a
//! backlog instead of losing events or stalling the reader loop.  Each
//! subscription starts at the moment it was created; there is no replay.
//!
//! ```text
//!              ┌──> Subscription #1 (queue) ──> caller A
//! publish() ───┼──> Subscription #2 (queue) ──> caller B
//!              └──> Subscription #3 (queue) ──> caller C
//! ```
//!
//! `close_all` pushes [`IpcEvent::Close`] to every queue and then forgets all
//! registrations, which ends each stream after the marker.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::events::IpcEvent;

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<IpcEvent>>,
    closed: bool,
}

/// Fan-out point shared by the reader loop and every subscriber.
#[derive(Default)]
pub struct EventHub {
    state: Mutex<HubState>,
}

impl EventHub {
    /// Creates an empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // Critical sections never panic; recover the data if one ever did.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new subscriber.
    ///
    /// Subscribing to a hub that has already been closed yields a stream that
    /// produces the close marker and then ends.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        if state.closed {
            // Receiver is still alive, so this cannot fail.
            let _ = tx.send(IpcEvent::Close);
        } else {
            state.subscribers.insert(id, tx);
        }
        trace!(id, active = state.subscribers.len(), "subscriber added");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Enqueues `event` to every registered subscriber, in registration-independent order.
    pub fn publish(&self, event: &IpcEvent) {
        let mut state = self.lock();
        state
            .subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Removes one registration.  Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        let mut state = self.lock();
        if state.subscribers.remove(&id).is_some() {
            trace!(id, active = state.subscribers.len(), "subscriber removed");
        }
    }

    /// Delivers the close marker to every subscriber and drops all
    /// registrations.  Idempotent.
    pub fn close_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        for (_, tx) in state.subscribers.drain() {
            let _ = tx.send(IpcEvent::Close);
        }
    }

    /// Number of currently registered subscribers.
    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// One consumer's view of the event stream.
///
/// Dropping the subscription unregisters it.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<IpcEvent>,
    hub: Weak<EventHub>,
}

impl Subscription {
    /// Registration id within the hub.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next event.  Returns `None` after the close marker.
    pub async fn recv(&mut self) -> Option<IpcEvent> {
        self.rx.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<IpcEvent> {
        self.rx.try_recv().ok()
    }

    /// Stops consuming; equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = IpcEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
