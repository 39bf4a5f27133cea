use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use crate::value::PropertyValue;

/// A mutation observed on the property store.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEvent {
    /// `key` now holds `value`. `persisted` is false for cache-only writes
    /// and for writes whose database update failed.
    ValueChanged {
        key: String,
        value: PropertyValue,
        persisted: bool,
    },
    KeyRemoved { key: String },
}

impl ProfileEvent {
    pub fn key(&self) -> &str {
        match self {
            ProfileEvent::ValueChanged { key, .. } | ProfileEvent::KeyRemoved { key } => key,
        }
    }
}

/// Callback type for property change notifications.
pub type EventHandler = Arc<dyn Fn(&ProfileEvent) + Send + Sync>;

/// Unique handle for a subscription, returned by `ChangeNotifier::subscribe()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    handler: EventHandler,
}

struct DispatchState {
    pending: VecDeque<(u64, ProfileEvent)>,
    next_seq: u64,
    delivered: u64,
    drainer: Option<ThreadId>,
}

/// In-process observer registry.
///
/// Events are queued with a sequence number by `enqueue` and delivered by
/// `dispatch`. One thread at a time drains the queue, so subscribers see
/// events in enqueue order even when several threads publish at once.
/// Handlers run outside every lock and may subscribe, unsubscribe or publish.
/// An event published from inside a handler is delivered after the current
/// one, before the outermost `dispatch` returns.
pub struct ChangeNotifier {
    handlers: RwLock<Vec<HandlerEntry>>,
    next_id: AtomicU64,
    state: Mutex<DispatchState>,
    drained: Condvar,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            state: Mutex::new(DispatchState {
                pending: VecDeque::new(),
                next_seq: 1,
                delivered: 0,
                drainer: None,
            }),
            drained: Condvar::new(),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ProfileEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push(HandlerEntry {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a handler. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let len = handlers.len();
        handlers.retain(|entry| entry.id != id);
        handlers.len() < len
    }

    /// Queue `event` and return its sequence number. Never runs handlers, so
    /// it is safe to call while holding the lock that orders the mutations.
    pub fn enqueue(&self, event: ProfileEvent) -> u64 {
        let mut state = self.lock_state();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push_back((seq, event));
        seq
    }

    /// Block until event `seq` has been delivered.
    ///
    /// The caller drains the queue itself when no other thread is doing so.
    /// Called from a handler on the draining thread, it returns at once and
    /// the event is delivered by the enclosing drain.
    pub fn dispatch(&self, seq: u64) {
        let me = thread::current().id();
        let mut state = self.lock_state();
        loop {
            if state.delivered >= seq {
                return;
            }
            let drainer = state.drainer;
            match drainer {
                None => break,
                Some(owner) if owner == me => return,
                Some(_) => {
                    state = self
                        .drained
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        state.drainer = Some(me);
        drop(state);

        let _guard = DrainGuard { notifier: self };
        loop {
            let next = self.lock_state().pending.pop_front();
            let Some((seq, event)) = next else {
                return;
            };
            self.deliver(&event);
            self.lock_state().delivered = seq;
            self.drained.notify_all();
        }
    }

    /// Deliver `event` to every current subscriber. Returns when all have run.
    pub fn notify(&self, event: &ProfileEvent) {
        let seq = self.enqueue(event.clone());
        self.dispatch(seq);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn deliver(&self, event: &ProfileEvent) {
        let handlers: Vec<HandlerEntry> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for entry in handlers {
            (entry.handler)(event);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the drainer role, including when a handler panics, so waiting
/// publishers can take over the rest of the queue.
struct DrainGuard<'a> {
    notifier: &'a ChangeNotifier,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.notifier.lock_state().drainer = None;
        self.notifier.drained.notify_all();
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
