use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// An event type carried by a [`Bus`].
pub trait Event: Send + Sync + 'static {
    /// Discriminant used to route events to subscribers.
    type Kind: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Callback type for event delivery.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Unique handle for a subscription, returned by [`Bus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct HandlerEntry<E: Event> {
    id: SubscriptionId,
    kind: E::Kind,
    handler: Handler<E>,
}

impl<E: Event> Clone for HandlerEntry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Subscriber registry with synchronous, registration-order delivery.
///
/// - `on(kind, handler)` registers a handler for one event kind.
/// - `emit(event)` calls all matching handlers before returning.
/// - `off(id)` removes a handler.
///
/// Events are not retained: a handler registered after an emission never
/// sees it. Handlers run outside the registry lock, so a handler may
/// subscribe or unsubscribe; such changes apply from the next emission.
pub struct Bus<E: Event> {
    handlers: RwLock<Vec<HandlerEntry<E>>>,
    /// Monotonic counter for subscription IDs.
    next_id: AtomicU64,
}

impl<E: Event> Bus<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to events of one kind.
    pub fn on<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handler: Handler<E> = Arc::new(handler);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(HandlerEntry { id, kind, handler });
        id
    }

    /// Remove a subscription. Returns `true` if it was registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|entry| entry.id != id);
        handlers.len() < before
    }

    /// Deliver an event to every matching handler, in registration order.
    ///
    /// Returns the number of handlers called.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let matching: Vec<HandlerEntry<E>> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .iter()
                .filter(|entry| entry.kind == kind)
                .cloned()
                .collect()
        };
        for entry in &matching {
            (entry.handler)(event);
        }
        matching.len()
    }
}

impl<E: Event> Default for Bus<E> {
    fn default() -> Self {
        Self::new()
    }
}
