//! In-memory document
//!
//! Notices raised outside a batch are delivered as soon as the mutation
//! completes. Notices raised while a listener is running are queued and
//! delivered after it returns, so listeners never re-enter each other.

use crate::error::{StageError, StageResult};
use crate::path::NodePath;
use crate::store::{ChangeCallback, ChangeNotice, ListenerId, OpenedCallback, SceneGraphStore};
use bridge_core::{AttrType, AttrValue};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Attribute {
    attr_type: AttrType,
    value: Option<AttrValue>,
}

#[derive(Debug, Clone, Default)]
struct Node {
    type_name: String,
    attributes: BTreeMap<String, Attribute>,
}

#[derive(Debug, Default)]
struct Document {
    open: bool,
    nodes: BTreeMap<NodePath, Node>,
    batch_depth: u32,
    pending: Vec<ChangeNotice>,
}

impl Document {
    fn node(&self, path: &NodePath) -> StageResult<&Node> {
        if !self.open {
            return Err(StageError::Closed);
        }
        self.nodes
            .get(path)
            .ok_or_else(|| StageError::NodeNotFound(path.clone()))
    }

    fn node_mut(&mut self, path: &NodePath) -> StageResult<&mut Node> {
        if !self.open {
            return Err(StageError::Closed);
        }
        self.nodes
            .get_mut(path)
            .ok_or_else(|| StageError::NodeNotFound(path.clone()))
    }

    fn attribute(&self, path: &NodePath, name: &str) -> Option<&Attribute> {
        self.node(path).ok()?.attributes.get(name)
    }
}

/// A [`SceneGraphStore`] held entirely in memory
pub struct MemoryStage {
    document: Mutex<Document>,
    change_listeners: RwLock<Vec<(ListenerId, ChangeCallback)>>,
    opened_listeners: RwLock<Vec<(ListenerId, OpenedCallback)>>,
    next_id: AtomicU64,
    dispatching: AtomicBool,
}

impl MemoryStage {
    /// Create a store with an empty open document
    pub fn new() -> Self {
        Self {
            document: Mutex::new(Document {
                open: true,
                ..Document::default()
            }),
            change_listeners: RwLock::new(Vec::new()),
            opened_listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            dispatching: AtomicBool::new(false),
        }
    }

    /// Replace the document with an empty one.
    ///
    /// Change listeners belong to the old document and are dropped.
    /// Opened listeners run afterwards and may subscribe again.
    pub fn open_new(&self) {
        {
            let mut doc = self.document.lock();
            *doc = Document {
                open: true,
                ..Document::default()
            };
        }
        self.change_listeners.write().clear();
        log::info!("Opened new document");

        let listeners: Vec<OpenedCallback> = self
            .opened_listeners
            .read()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for listener in listeners {
            listener(self);
        }
    }

    /// Close the document. Mutations fail until [`open_new`](Self::open_new).
    pub fn close(&self) {
        let mut doc = self.document.lock();
        doc.open = false;
        doc.nodes.clear();
        doc.pending.clear();
        log::info!("Closed document");
    }

    pub fn change_listener_count(&self) -> usize {
        self.change_listeners.read().len()
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, notice: ChangeNotice) {
        let flush = {
            let mut doc = self.document.lock();
            doc.pending.push(notice);
            doc.batch_depth == 0
        };
        if flush {
            self.flush();
        }
    }

    /// Deliver queued notices unless a batch is open or a delivery is
    /// already running further up the stack.
    fn flush(&self) {
        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                return;
            }

            loop {
                let notices = {
                    let mut doc = self.document.lock();
                    if doc.batch_depth > 0 || doc.pending.is_empty() {
                        break;
                    }
                    std::mem::take(&mut doc.pending)
                };
                let listeners: Vec<ChangeCallback> = self
                    .change_listeners
                    .read()
                    .iter()
                    .map(|(_, cb)| cb.clone())
                    .collect();
                log::trace!("Delivering {} notices to {} listeners", notices.len(), listeners.len());
                for listener in listeners {
                    listener(self, &notices);
                }
            }

            self.dispatching.store(false, Ordering::Release);

            // Another thread may have queued between the last check and the release
            let doc = self.document.lock();
            if doc.batch_depth > 0 || doc.pending.is_empty() {
                return;
            }
        }
    }
}

impl Default for MemoryStage {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraphStore for MemoryStage {
    fn is_open(&self) -> bool {
        self.document.lock().open
    }

    fn has_node(&self, path: &NodePath) -> bool {
        let doc = self.document.lock();
        doc.open && (path.is_root() || doc.nodes.contains_key(path))
    }

    fn node_type(&self, path: &NodePath) -> Option<String> {
        let doc = self.document.lock();
        if path.is_root() && doc.open {
            return Some(String::new());
        }
        doc.node(path).ok().map(|n| n.type_name.clone())
    }

    fn define_node(&self, path: &NodePath, type_name: Option<&str>) -> StageResult<()> {
        if path.is_root() {
            return Ok(());
        }
        let mut doc = self.document.lock();
        if !doc.open {
            return Err(StageError::Closed);
        }
        for ancestor in path.ancestors() {
            doc.nodes.entry(ancestor).or_default();
        }
        let node = doc.nodes.entry(path.clone()).or_default();
        if let Some(type_name) = type_name {
            if node.type_name != type_name {
                log::debug!("Typing {} as '{}'", path, type_name);
                node.type_name = type_name.to_string();
            }
        }
        Ok(())
    }

    fn nodes(&self) -> Vec<NodePath> {
        let doc = self.document.lock();
        if !doc.open {
            return Vec::new();
        }
        doc.nodes.keys().cloned().collect()
    }

    fn attribute_names(&self, path: &NodePath) -> Vec<String> {
        let doc = self.document.lock();
        doc.node(path)
            .map(|n| n.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn attribute_type(&self, path: &NodePath, name: &str) -> Option<AttrType> {
        self.document.lock().attribute(path, name).map(|a| a.attr_type)
    }

    fn get_attribute(&self, path: &NodePath, name: &str) -> Option<AttrValue> {
        self.document.lock().attribute(path, name)?.value.clone()
    }

    fn create_attribute(&self, path: &NodePath, name: &str, attr_type: AttrType) -> StageResult<()> {
        {
            let mut doc = self.document.lock();
            let node = doc.node_mut(path)?;
            if node.attributes.contains_key(name) {
                return Ok(());
            }
            node.attributes.insert(
                name.to_string(),
                Attribute {
                    attr_type,
                    value: None,
                },
            );
        }
        self.record(ChangeNotice::new(path.clone(), name));
        Ok(())
    }

    fn set_attribute(&self, path: &NodePath, name: &str, value: AttrValue) -> StageResult<()> {
        {
            let mut doc = self.document.lock();
            let node = doc.node_mut(path)?;
            let attribute = node
                .attributes
                .get_mut(name)
                .ok_or_else(|| StageError::AttributeNotFound {
                    node: path.clone(),
                    attribute: name.to_string(),
                })?;
            let value = value
                .coerce_to(attribute.attr_type)
                .map_err(|found| StageError::TypeCoercion {
                    node: path.clone(),
                    attribute: name.to_string(),
                    expected: attribute.attr_type,
                    found: found.kind().to_string(),
                })?;
            // Unchanged values raise no notice
            if attribute.value.as_ref() == Some(&value) {
                return Ok(());
            }
            attribute.value = Some(value);
        }
        self.record(ChangeNotice::new(path.clone(), name));
        Ok(())
    }

    fn begin_batch(&self) {
        self.document.lock().batch_depth += 1;
    }

    fn end_batch(&self) {
        let flush = {
            let mut doc = self.document.lock();
            if doc.batch_depth == 0 {
                log::warn!("end_batch without a matching begin_batch");
                return;
            }
            doc.batch_depth -= 1;
            doc.batch_depth == 0
        };
        if flush {
            self.flush();
        }
    }

    fn subscribe_to_changes(&self, callback: ChangeCallback) -> ListenerId {
        let id = self.next_listener_id();
        self.change_listeners.write().push((id, callback));
        id
    }

    fn subscribe_to_document_opened(&self, callback: OpenedCallback) -> ListenerId {
        let id = self.next_listener_id();
        self.opened_listeners.write().push((id, callback));
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut changes = self.change_listeners.write();
        let before = changes.len();
        changes.retain(|(lid, _)| *lid != id);
        if changes.len() != before {
            return true;
        }
        drop(changes);

        let mut opened = self.opened_listeners.write();
        let before = opened.len();
        opened.retain(|(lid, _)| *lid != id);
        opened.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::batch;
    use std::sync::Arc;

    fn p(s: &str) -> NodePath {
        NodePath::new(s).unwrap()
    }

    fn collect(stage: &MemoryStage) -> Arc<Mutex<Vec<Vec<ChangeNotice>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stage.subscribe_to_changes(Arc::new(move |_: &dyn SceneGraphStore, notices: &[ChangeNotice]| {
            sink.lock().push(notices.to_vec());
        }));
        seen
    }

    #[test]
    fn test_define_creates_ancestors() {
        let stage = MemoryStage::new();
        stage.define_node(&p("/World/plc/motor"), None).unwrap();
        assert!(stage.has_node(&p("/World")));
        assert!(stage.has_node(&p("/World/plc")));
        assert_eq!(stage.node_type(&p("/World/plc/motor")), Some(String::new()));
    }

    #[test]
    fn test_define_retypes() {
        let stage = MemoryStage::new();
        stage.define_node(&p("/a"), Some("Xform")).unwrap();
        stage.define_node(&p("/a"), None).unwrap();
        assert_eq!(stage.node_type(&p("/a")).as_deref(), Some("Xform"));
        stage.define_node(&p("/a"), Some("Cube")).unwrap();
        assert_eq!(stage.node_type(&p("/a")).as_deref(), Some("Cube"));
    }

    #[test]
    fn test_set_requires_target() {
        let stage = MemoryStage::new();
        let err = stage.set_attribute(&p("/a"), "value", 1.0.into()).unwrap_err();
        assert!(err.is_not_found());

        stage.define_node(&p("/a"), None).unwrap();
        let err = stage.set_attribute(&p("/a"), "value", 1.0.into()).unwrap_err();
        assert!(err.is_not_found());
        assert!(!stage.has_attribute(&p("/a"), "value"));
    }

    #[test]
    fn test_set_coerces_to_declared_type() {
        let stage = MemoryStage::new();
        stage.define_node(&p("/a"), None).unwrap();
        stage.create_attribute(&p("/a"), "count", AttrType::Int).unwrap();
        stage.set_attribute(&p("/a"), "count", AttrValue::Number(3.0)).unwrap();
        assert_eq!(stage.get_attribute(&p("/a"), "count"), Some(AttrValue::Int(3)));

        let err = stage
            .set_attribute(&p("/a"), "count", AttrValue::String("x".into()))
            .unwrap_err();
        assert!(matches!(err, StageError::TypeCoercion { expected: AttrType::Int, .. }));
    }

    #[test]
    fn test_notices_outside_batch_are_immediate() {
        let stage = MemoryStage::new();
        let seen = collect(&stage);
        stage.define_node(&p("/a"), None).unwrap();
        stage.create_attribute(&p("/a"), "v", AttrType::Double).unwrap();
        stage.set_attribute(&p("/a"), "v", 1.0.into()).unwrap();
        stage.set_attribute(&p("/a"), "v", 1.0.into()).unwrap();

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_batch_delivers_once() {
        let stage = MemoryStage::new();
        stage.define_node(&p("/a"), None).unwrap();
        stage.create_attribute(&p("/a"), "v", AttrType::Double).unwrap();
        let seen = collect(&stage);
        {
            let _outer = batch(&stage);
            {
                let _inner = batch(&stage);
                stage.set_attribute(&p("/a"), "v", 1.0.into()).unwrap();
            }
            stage.set_attribute(&p("/a"), "v", 2.0.into()).unwrap();
            assert!(seen.lock().is_empty());
        }
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 2);
    }

    #[test]
    fn test_reentrant_notices_are_queued() {
        let stage = Arc::new(MemoryStage::new());
        stage.define_node(&p("/a"), None).unwrap();
        stage.create_attribute(&p("/a"), "v", AttrType::Double).unwrap();
        stage.create_attribute(&p("/a"), "echo", AttrType::Double).unwrap();

        let depth = Arc::new(AtomicU64::new(0));
        let max_depth = Arc::new(AtomicU64::new(0));
        let deliveries = Arc::new(AtomicU64::new(0));
        {
            let depth = Arc::clone(&depth);
            let max_depth = Arc::clone(&max_depth);
            let deliveries = Arc::clone(&deliveries);
            stage.subscribe_to_changes(Arc::new(move |store: &dyn SceneGraphStore, notices: &[ChangeNotice]| {
                let d = depth.fetch_add(1, Ordering::SeqCst) + 1;
                max_depth.fetch_max(d, Ordering::SeqCst);
                deliveries.fetch_add(1, Ordering::SeqCst);
                if notices.iter().any(|n| n.attribute == "v") {
                    let path = NodePath::new("/a").unwrap();
                    store.set_attribute(&path, "echo", 5.0.into()).unwrap();
                }
                depth.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        stage.set_attribute(&p("/a"), "v", 1.0.into()).unwrap();
        assert_eq!(deliveries.load(Ordering::SeqCst), 2);
        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_new_drops_change_listeners() {
        let stage = MemoryStage::new();
        stage.define_node(&p("/a"), None).unwrap();
        let _ = collect(&stage);

        let reopened = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&reopened);
        stage.subscribe_to_document_opened(Arc::new(move |store: &dyn SceneGraphStore| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(store.is_open());
        }));

        stage.open_new();
        assert_eq!(reopened.load(Ordering::SeqCst), 1);
        assert_eq!(stage.change_listener_count(), 0);
        assert!(!stage.has_node(&p("/a")));
    }

    #[test]
    fn test_closed_document_rejects_mutation() {
        let stage = MemoryStage::new();
        stage.close();
        assert!(!stage.is_open());
        assert_eq!(stage.define_node(&p("/a"), None), Err(StageError::Closed));
        assert!(stage.nodes().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let stage = MemoryStage::new();
        let id = stage.subscribe_to_changes(Arc::new(|_: &dyn SceneGraphStore, _: &[ChangeNotice]| {}));
        assert!(stage.unsubscribe(id));
        assert!(!stage.unsubscribe(id));
    }
}
