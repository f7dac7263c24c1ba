//! In-process publish/subscribe for domain events.
//!
//! Dispatch is synchronous on the publisher's thread: handlers run in
//! priority order (higher first, registration order within a priority), a
//! panicking handler is logged and isolated, and the optional external sink
//! always runs last. There is no background queue; ordering between
//! publishes on one thread is FIFO.

use crate::domain::events::DomainEvent;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::error;

pub type EventHandler = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Outside-world fan-out hook (e.g. a WebSocket forwarder). Receives every
/// published event after all domain handlers have run.
pub type EventSink = Arc<dyn Fn(&str, &DomainEvent) + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Registration {
    id: u64,
    priority: i32,
    handler: EventHandler,
}

#[derive(Default)]
struct Inner {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    sink: RwLock<Option<EventSink>>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic. Higher priority runs first.
    pub fn subscribe<F>(&self, topic: &str, priority: i32, handler: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.inner.handlers.write().expect("handler table poisoned");
        handlers.entry(topic.to_string()).or_default().push(Registration {
            id,
            priority,
            handler: Arc::new(handler),
        });
        SubscriptionId(id)
    }

    /// Remove a previously registered handler. Returns whether it was found.
    pub fn unsubscribe(&self, topic: &str, subscription: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write().expect("handler table poisoned");
        if let Some(registrations) = handlers.get_mut(topic) {
            let before = registrations.len();
            registrations.retain(|r| r.id != subscription.0);
            return registrations.len() != before;
        }
        false
    }

    /// Publish an event to every handler subscribed to `topic`, then to the
    /// sink. Handler and sink failures are logged and never propagate.
    pub fn publish(&self, topic: &str, event: &DomainEvent) {
        let snapshot: Vec<(i32, EventHandler)> = {
            let handlers = self.inner.handlers.read().expect("handler table poisoned");
            match handlers.get(topic) {
                Some(registrations) => {
                    let mut ordered: Vec<(i32, EventHandler)> = registrations
                        .iter()
                        .map(|r| (r.priority, Arc::clone(&r.handler)))
                        .collect();
                    // Stable sort keeps registration order within a priority.
                    ordered.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
                    ordered
                }
                None => Vec::new(),
            }
        };

        for (_, handler) in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(topic, "event handler panicked; continuing with remaining handlers");
            }
        }

        let sink = self.inner.sink.read().expect("sink poisoned").clone();
        if let Some(sink) = sink {
            if catch_unwind(AssertUnwindSafe(|| sink(topic, event))).is_err() {
                error!(topic, "event sink failed; domain handlers were unaffected");
            }
        }
    }

    /// Install the external sink, replacing any previous one.
    pub fn set_sink<F>(&self, sink: F)
    where
        F: Fn(&str, &DomainEvent) + Send + Sync + 'static,
    {
        *self.inner.sink.write().expect("sink poisoned") = Some(Arc::new(sink));
    }

    pub fn clear_sink(&self) {
        *self.inner.sink.write().expect("sink poisoned") = None;
    }

    /// Number of handlers for one topic, or across all topics.
    pub fn handler_count(&self, topic: Option<&str>) -> usize {
        let handlers = self.inner.handlers.read().expect("handler table poisoned");
        match topic {
            Some(topic) => handlers.get(topic).map_or(0, Vec::len),
            None => handlers.values().map(Vec::len).sum(),
        }
    }

    /// Drop all handlers and the sink. Test hook.
    pub fn clear(&self) {
        self.inner.handlers.write().expect("handler table poisoned").clear();
        self.clear_sink();
    }
}
