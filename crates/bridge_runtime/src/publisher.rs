//! Component-scoped event publishing

use bridge_core::Value;
use bridge_event::{EventBus, EventId, EventKind, Message};
use std::sync::Arc;

/// Publishes events on behalf of one component.
///
/// Publishing never fails from the caller's point of view: bus errors are
/// logged and reported only through the returned flag.
#[derive(Clone)]
pub struct EventPublisher {
    name: String,
    bus: Arc<EventBus>,
}

impl EventPublisher {
    pub fn new(name: impl Into<String>, bus: Arc<EventBus>) -> Self {
        Self {
            name: name.into(),
            bus,
        }
    }

    /// Component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying bus
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Event ID of `kind` events for this component
    pub fn event_id(&self, kind: &str) -> EventId {
        EventId::for_component(kind, &self.name)
    }

    /// Publish a message of `kind`. Returns false if publishing failed.
    pub fn push(&self, kind: &str, data: Option<Value>, status: Option<String>) -> bool {
        let event_id = self.event_id(kind);
        let message = Message {
            data,
            status,
            ..Message::new(self.name.clone())
        };

        match self.bus.publish(&event_id, &message) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Error pushing event {}: {}", event_id, e);
                false
            }
        }
    }

    /// Publish a bridge read result
    pub fn push_data(&self, data: Value) -> bool {
        self.push(EventKind::DATA_READ, Some(data), None)
    }

    /// Publish a status line
    pub fn push_status(&self, status: impl Into<String>) -> bool {
        self.push(EventKind::STATUS, None, Some(status.into()))
    }
}
