//! Event bus for component communication
//!
//! Handlers are invoked synchronously on the publishing thread. The handler
//! table is only locked while it is being read or changed, never while a
//! handler runs, so handlers may subscribe or unsubscribe from inside a
//! callback.

use crate::message::{EventId, Message};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Event handling result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResult {
    /// Continue propagation
    Continue,
    /// Event consumed
    Handled,
    /// Handler could not process the event
    Failed(String),
}

/// Errors returned to publishers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("Event bus is closed")]
    Closed,

    #[error("{failed} handler(s) failed for {event}: {reasons:?}")]
    HandlerFailed {
        event: String,
        failed: usize,
        reasons: Vec<String>,
    },
}

pub type EventBusResult<T> = Result<T, EventError>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Handler = Arc<dyn Fn(&Message) -> EventResult + Send + Sync>;

/// Handler entry in the bus
struct HandlerEntry {
    id: SubscriptionId,
    handler: Handler,
}

/// Event bus statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total events handled
    pub events_handled: u64,
    /// Total handler failures
    pub handler_failures: u64,
    /// Handlers currently registered
    pub handlers_registered: usize,
}

/// Event bus for publish-subscribe messaging
pub struct EventBus {
    /// Handlers by event ID
    handlers: RwLock<HashMap<EventId, Vec<HandlerEntry>>>,
    /// Next subscription ID
    next_id: AtomicU64,
    /// Set once the bus stops accepting events
    closed: AtomicBool,
    /// Statistics
    stats: Mutex<EventBusStats>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            stats: Mutex::new(EventBusStats::default()),
        }
    }

    /// Create a new shared event bus
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe a closure handler to one event ID
    pub fn subscribe<F>(&self, event_id: EventId, handler: F) -> SubscriptionId
    where
        F: Fn(&Message) -> EventResult + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(event_id)
            .or_default()
            .push(HandlerEntry {
                id,
                handler: Arc::new(handler),
            });
        self.stats.lock().handlers_registered += 1;
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let mut removed = false;
        handlers.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        if removed {
            self.stats.lock().handlers_registered -= 1;
        }
        removed
    }

    /// Publish a message to every handler of `event_id`.
    ///
    /// All handlers run even if some fail; failures are reported together.
    pub fn publish(&self, event_id: &EventId, message: &Message) -> EventBusResult<EventResult> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EventError::Closed);
        }

        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .get(event_id)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
            .unwrap_or_default();

        let mut result = EventResult::Continue;
        let mut reasons = Vec::new();
        for handler in handlers {
            match handler(message) {
                EventResult::Continue => {}
                EventResult::Handled => result = EventResult::Handled,
                EventResult::Failed(reason) => reasons.push(reason),
            }
        }

        let mut stats = self.stats.lock();
        stats.events_published += 1;
        if result == EventResult::Handled {
            stats.events_handled += 1;
        }
        stats.handler_failures += reasons.len() as u64;
        drop(stats);

        if reasons.is_empty() {
            Ok(result)
        } else {
            Err(EventError::HandlerFailed {
                event: event_id.to_string(),
                failed: reasons.len(),
                reasons,
            })
        }
    }

    /// Number of handlers registered for an event ID
    pub fn handler_count(&self, event_id: &EventId) -> usize {
        self.handlers.read().get(event_id).map_or(0, Vec::len)
    }

    /// Stop accepting events. Subsequent publishes fail with [`EventError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Check if the bus was closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get statistics
    pub fn stats(&self) -> EventBusStats {
        self.stats.lock().clone()
    }

    /// Clear all handlers
    pub fn clear(&self) {
        self.handlers.write().clear();
        self.stats.lock().handlers_registered = 0;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::EventKind;
    use std::sync::atomic::AtomicU32;

    fn data_read(name: &str) -> EventId {
        EventId::for_component(EventKind::DATA_READ, name)
    }

    #[test]
    fn test_publish_event() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));

        let counter_clone = Arc::clone(&counter);
        bus.subscribe(data_read("a"), move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            EventResult::Handled
        });

        let result = bus.publish(&data_read("a"), &Message::new("a")).unwrap();

        assert_eq!(result, EventResult::Handled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_component_scoping() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));

        let counter_clone = Arc::clone(&counter);
        bus.subscribe(data_read("a"), move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            EventResult::Continue
        });

        bus.publish(&data_read("b"), &Message::new("b")).unwrap();
        bus.publish(&EventId::for_component(EventKind::STATUS, "a"), &Message::new("a"))
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(data_read("a"), |_| EventResult::Continue);
        assert_eq!(bus.handler_count(&data_read("a")), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.handler_count(&data_read("a")), 0);
        assert_eq!(bus.stats().handlers_registered, 0);
    }

    #[test]
    fn test_failures_do_not_stop_other_handlers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));

        bus.subscribe(data_read("a"), |_| EventResult::Failed("bad payload".into()));
        let counter_clone = Arc::clone(&counter);
        bus.subscribe(data_read("a"), move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            EventResult::Continue
        });

        let err = bus.publish(&data_read("a"), &Message::new("a")).unwrap_err();
        assert!(matches!(err, EventError::HandlerFailed { failed: 1, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().handler_failures, 1);
    }

    #[test]
    fn test_subscribe_from_handler() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(data_read("a"), move |_| {
            inner.subscribe(data_read("b"), |_| EventResult::Continue);
            EventResult::Continue
        });

        bus.publish(&data_read("a"), &Message::new("a")).unwrap();
        assert_eq!(bus.handler_count(&data_read("b")), 1);
    }

    #[test]
    fn test_closed_bus() {
        let bus = EventBus::new();
        bus.close();
        assert_eq!(
            bus.publish(&data_read("a"), &Message::new("a")),
            Err(EventError::Closed)
        );
    }
}
