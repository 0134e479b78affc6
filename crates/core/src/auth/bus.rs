//! Notification bus
//!
//! Fire-and-forget publish/subscribe keyed by event name. Delivery is
//! synchronous to the listeners registered at publish time; nothing is
//! buffered, so a listener registered after a publish never sees it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use novaio_domain::{AuthEvent, AuthEventKind};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::trace;

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

static GLOBAL_BUS: Lazy<Arc<NotificationBus>> = Lazy::new(|| Arc::new(NotificationBus::new()));

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: AuthEventKind,
    listener: Listener,
}

/// Publish/subscribe channel for credential rotation and renewal failures.
pub struct NotificationBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    /// Create an isolated bus (tests, or one bus per embedding).
    pub fn new() -> Self {
        Self { subscriptions: RwLock::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// The process-wide bus.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_BUS)
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe<F>(&self, kind: AuthEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription { id, kind, listener: Arc::new(listener) });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        subscriptions.len() != before
    }

    /// Deliver `event` to every current listener of its kind, in
    /// registration order. Returns the number of listeners invoked.
    pub fn publish(&self, event: &AuthEvent) -> usize {
        let kind = event.kind();
        // Listeners run outside the lock so they may subscribe or publish.
        let listeners: Vec<Listener> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| sub.kind == kind)
            .map(|sub| Arc::clone(&sub.listener))
            .collect();

        trace!(event = event.name(), listeners = listeners.len(), "publishing");
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self, kind: AuthEventKind) -> usize {
        self.subscriptions.read().iter().filter(|sub| sub.kind == kind).count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .finish()
    }
}
