//! Bridge manager interface
//!
//! The concrete device protocol lives outside this crate. What the
//! synchronisation layer needs from a bridge is small: a way to be told
//! about completed reads, and a way to request a write.

use bridge_core::{AttrValue, SyncError, SyncResult};
use bridge_event::{EventBus, EventId, EventKind, EventResult, Message, SubscriptionId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

/// Callback invoked with every data-read message of a component
pub type DataCallback = Arc<dyn Fn(&Message) -> SyncResult<()> + Send + Sync>;

/// What the synchronisation layer consumes from a bridge
pub trait BridgeManager: Send + Sync {
    /// Register a callback for completed reads
    fn register_data_callback(&self, callback: DataCallback) -> SubscriptionId;

    /// Remove a callback registered with [`register_data_callback`](Self::register_data_callback)
    fn unregister_data_callback(&self, id: SubscriptionId);

    /// Request that `value` be written to the device variable `symbol`
    fn write_variable(&self, symbol: &str, value: AttrValue) -> SyncResult<()>;

    /// Read one device variable directly, outside the read loop
    fn read_variable(&self, symbol: &str) -> SyncResult<AttrValue> {
        Err(SyncError::bridge(format!("direct read of '{}' is not supported", symbol)))
    }
}

/// A pending write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub symbol: String,
    pub value: AttrValue,
}

/// Bridge manager backed by the event bus and a write queue.
///
/// Reads arrive as `data_read.{name}` events. Writes are queued and picked
/// up by the component's write loop through [`drain_writes`](Self::drain_writes),
/// so the caller of `write_variable` never blocks on the device.
pub struct QueuedBridge {
    name: String,
    bus: Arc<EventBus>,
    sender: Sender<WriteRequest>,
    receiver: Receiver<WriteRequest>,
}

impl QueuedBridge {
    pub fn new(name: impl Into<String>, bus: Arc<EventBus>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            name: name.into(),
            bus,
            sender,
            receiver,
        }
    }

    /// Component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take every write queued so far, oldest first
    pub fn drain_writes(&self) -> Vec<WriteRequest> {
        self.receiver.try_iter().collect()
    }

    /// Number of writes waiting for the write loop
    pub fn pending_writes(&self) -> usize {
        self.receiver.len()
    }
}

impl BridgeManager for QueuedBridge {
    fn register_data_callback(&self, callback: DataCallback) -> SubscriptionId {
        let event_id = EventId::for_component(EventKind::DATA_READ, &self.name);
        self.bus.subscribe(event_id, move |message| match callback(message) {
            Ok(()) => EventResult::Handled,
            Err(e) => EventResult::Failed(e.to_string()),
        })
    }

    fn unregister_data_callback(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    fn write_variable(&self, symbol: &str, value: AttrValue) -> SyncResult<()> {
        log::trace!("Queueing write {} = {:?} for '{}'", symbol, value, self.name);
        // The receiver lives as long as self, so the channel cannot be disconnected
        let _ = self.sender.send(WriteRequest {
            symbol: symbol.to_string(),
            value,
        });
        Ok(())
    }
}
