//! Document edits flowing back to the device
//!
//! For a node with a complete symbol bundle:
//!
//! - `write:once` true forwards `write:value` and, once the write succeeds,
//!   resets `write:once`
//! - an edit of `write:value` forwards it while `write:pause` is false
//! - toggling `write:pause` alone forwards nothing
//!
//! Notices are grouped per node, so one delivery forwards at most one
//! write per node.

use crate::attributes::{ATTR_WRITE_ONCE, ATTR_WRITE_PAUSE, ATTR_WRITE_SYMBOL, ATTR_WRITE_VALUE};
use crate::path::NodePath;
use crate::store::{ChangeNotice, ListenerId, SceneGraphStore};
use bridge_core::AttrValue;
use bridge_runtime::BridgeManager;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Watches one component's subtree for user edits
pub struct FeedbackListener {
    name: String,
    root: NodePath,
    bridge: Arc<dyn BridgeManager>,
    listener: Mutex<Option<ListenerId>>,
    forwarded: AtomicU64,
}

impl FeedbackListener {
    pub fn new(name: impl Into<String>, root: NodePath, bridge: Arc<dyn BridgeManager>) -> Self {
        Self {
            name: name.into(),
            root,
            bridge,
            listener: Mutex::new(None),
            forwarded: AtomicU64::new(0),
        }
    }

    /// Subscribe to the store's change notices
    pub fn attach(self: &Arc<Self>, store: &dyn SceneGraphStore) {
        let this = Arc::clone(self);
        let id = store.subscribe_to_changes(Arc::new(move |store: &dyn SceneGraphStore, notices: &[ChangeNotice]| {
            this.on_changes(store, notices);
        }));
        if let Some(previous) = self.listener.lock().replace(id) {
            store.unsubscribe(previous);
        }
        log::debug!("Feedback for '{}' attached", self.name);
    }

    pub fn detach(&self, store: &dyn SceneGraphStore) {
        if let Some(id) = self.listener.lock().take() {
            store.unsubscribe(id);
        }
    }

    /// Writes forwarded so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Evaluate one delivery; returns the number of writes forwarded
    pub fn on_changes(&self, store: &dyn SceneGraphStore, notices: &[ChangeNotice]) -> usize {
        let mut changed: BTreeMap<&NodePath, Vec<&str>> = BTreeMap::new();
        for notice in notices {
            if !notice.node.starts_with(&self.root) {
                continue;
            }
            if matches!(
                notice.attribute.as_str(),
                ATTR_WRITE_VALUE | ATTR_WRITE_ONCE | ATTR_WRITE_PAUSE
            ) {
                changed.entry(&notice.node).or_default().push(&notice.attribute);
            }
        }

        changed
            .into_iter()
            .filter(|(node, attributes)| self.evaluate(store, node, attributes))
            .count()
    }

    fn evaluate(&self, store: &dyn SceneGraphStore, node: &NodePath, attributes: &[&str]) -> bool {
        // Bundle still under construction
        let symbol = match store.get_attribute(node, ATTR_WRITE_SYMBOL) {
            Some(AttrValue::String(symbol)) => symbol,
            _ => return false,
        };

        let once = flag(store, node, ATTR_WRITE_ONCE);
        let pause = flag(store, node, ATTR_WRITE_PAUSE);
        let value_edited = attributes.contains(&ATTR_WRITE_VALUE);
        if !once && (pause || !value_edited) {
            return false;
        }

        let value = match store.get_attribute(node, ATTR_WRITE_VALUE) {
            Some(value) => value,
            None => {
                log::debug!("{} has no {} to forward", node, ATTR_WRITE_VALUE);
                return false;
            }
        };

        match self.bridge.write_variable(&symbol, value) {
            Ok(()) => {
                // A failed write keeps the trigger armed
                if once {
                    if let Err(e) = store.set_attribute(node, ATTR_WRITE_ONCE, AttrValue::Bool(false)) {
                        log::warn!("Failed to reset {}.{}: {}", node, ATTR_WRITE_ONCE, e);
                    }
                }
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                log::debug!("'{}' forwarded {} from {}", self.name, symbol, node);
                true
            }
            Err(e) => {
                log::warn!("'{}' failed to write {}: {}", self.name, symbol, e);
                false
            }
        }
    }
}

fn flag(store: &dyn SceneGraphStore, node: &NodePath, name: &str) -> bool {
    store
        .get_attribute(node, name)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{create_symbol_bundle, ATTR_CURRENT_VALUE};
    use crate::memory::MemoryStage;
    use bridge_core::{FlatKey, SyncError, SyncResult};
    use bridge_event::{EventBus, SubscriptionId};
    use bridge_runtime::{DataCallback, QueuedBridge};
    use std::sync::atomic::AtomicBool;

    /// Queued bridge whose writes can be made to fail
    struct FlakyBridge {
        inner: QueuedBridge,
        offline: AtomicBool,
    }

    impl BridgeManager for FlakyBridge {
        fn register_data_callback(&self, callback: DataCallback) -> SubscriptionId {
            self.inner.register_data_callback(callback)
        }

        fn unregister_data_callback(&self, id: SubscriptionId) {
            self.inner.unregister_data_callback(id)
        }

        fn write_variable(&self, symbol: &str, value: AttrValue) -> SyncResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(SyncError::bridge("offline"));
            }
            self.inner.write_variable(symbol, value)
        }
    }

    #[test]
    fn test_failed_write_keeps_once_armed() {
        let stage = MemoryStage::new();
        let path = NodePath::new("/plc/speed").unwrap();
        create_symbol_bundle(&stage, &path, ATTR_CURRENT_VALUE, &FlatKey::from("speed"), &1.0.into()).unwrap();

        let bridge = Arc::new(FlakyBridge {
            inner: QueuedBridge::new("plc", EventBus::shared()),
            offline: AtomicBool::new(true),
        });
        let listener = Arc::new(FeedbackListener::new("plc", NodePath::new("/plc").unwrap(), bridge.clone()));
        listener.attach(&stage);

        stage.set_attribute(&path, ATTR_WRITE_ONCE, AttrValue::Bool(true)).unwrap();
        assert_eq!(listener.forwarded(), 0);
        assert_eq!(stage.get_attribute(&path, ATTR_WRITE_ONCE), Some(AttrValue::Bool(true)));

        bridge.offline.store(false, Ordering::SeqCst);
        stage.set_attribute(&path, ATTR_WRITE_VALUE, AttrValue::Number(2.0)).unwrap();
        assert_eq!(listener.forwarded(), 1);
        assert_eq!(stage.get_attribute(&path, ATTR_WRITE_ONCE), Some(AttrValue::Bool(false)));

        let writes = bridge.inner.drain_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].symbol, "speed");
        assert_eq!(writes[0].value, AttrValue::Number(2.0));
    }
}
