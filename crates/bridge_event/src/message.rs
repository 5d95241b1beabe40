//! Event identifiers and the message envelope

use bridge_core::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kinds emitted by component runtimes
pub struct EventKind;

impl EventKind {
    /// A bridge read completed; `data` holds the nested result
    pub const DATA_READ: &'static str = "data_read";
    /// Human-readable status update
    pub const STATUS: &'static str = "status";
    /// Connection state changed
    pub const CONNECTION: &'static str = "connection";
}

/// Event identifier, namespaced as `{kind}.{component}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Create an event ID from its full name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Create the ID of `kind` events for one component
    pub fn for_component(kind: &str, component: &str) -> Self {
        Self(format!("{}.{}", kind, component))
    }

    /// Get the event name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata attached to every message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Name of the component that produced the message
    pub name: String,
}

/// Event payload envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub meta: MessageMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Message {
    /// Create an empty message from a component
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            meta: MessageMeta { name: component.into() },
            data: None,
            status: None,
        }
    }

    /// Attach data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a status line
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Name of the producing component
    pub fn component(&self) -> &str {
        &self.meta.name
    }
}
