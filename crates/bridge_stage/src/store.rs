//! Scene-graph document interface
//!
//! A document is a tree of typed nodes, each carrying named, typed
//! attributes. Mutations happen on the main thread only. Listeners learn
//! about attribute changes in batches of [`ChangeNotice`]s.

use crate::error::StageResult;
use crate::path::NodePath;
use bridge_core::{AttrType, AttrValue};
use std::fmt;
use std::sync::Arc;

/// One changed attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeNotice {
    pub node: NodePath,
    pub attribute: String,
}

impl ChangeNotice {
    pub fn new(node: NodePath, attribute: impl Into<String>) -> Self {
        Self {
            node,
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for ChangeNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attribute)
    }
}

/// Handle returned by the subscribe methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Receives the document and the notices of one delivery
pub type ChangeCallback = Arc<dyn Fn(&dyn SceneGraphStore, &[ChangeNotice]) + Send + Sync>;

/// Receives the document after a new one was opened
pub type OpenedCallback = Arc<dyn Fn(&dyn SceneGraphStore) + Send + Sync>;

/// A scene-graph document
pub trait SceneGraphStore: Send + Sync {
    /// Whether a document is currently open
    fn is_open(&self) -> bool;

    fn has_node(&self, path: &NodePath) -> bool;

    /// Type name of a node; empty for untyped nodes, `None` when missing
    fn node_type(&self, path: &NodePath) -> Option<String>;

    /// Create a node and any missing ancestors.
    ///
    /// Defining an existing node with a different type re-types it.
    fn define_node(&self, path: &NodePath, type_name: Option<&str>) -> StageResult<()>;

    /// Every node in path order
    fn nodes(&self) -> Vec<NodePath>;

    /// Attribute names of a node in name order
    fn attribute_names(&self, path: &NodePath) -> Vec<String>;

    /// Declared type of an attribute, `None` when missing
    fn attribute_type(&self, path: &NodePath, name: &str) -> Option<AttrType>;

    fn has_attribute(&self, path: &NodePath, name: &str) -> bool {
        self.attribute_type(path, name).is_some()
    }

    /// Current value; `None` when the attribute is missing or unset
    fn get_attribute(&self, path: &NodePath, name: &str) -> Option<AttrValue>;

    /// Declare an attribute. An existing attribute is left untouched.
    fn create_attribute(&self, path: &NodePath, name: &str, attr_type: AttrType) -> StageResult<()>;

    /// Store a value, coerced to the declared type
    fn set_attribute(&self, path: &NodePath, name: &str, value: AttrValue) -> StageResult<()>;

    /// Hold notices until the matching [`end_batch`](Self::end_batch). Batches nest.
    fn begin_batch(&self);

    fn end_batch(&self);

    fn subscribe_to_changes(&self, callback: ChangeCallback) -> ListenerId;

    fn subscribe_to_document_opened(&self, callback: OpenedCallback) -> ListenerId;

    /// Remove a listener of either kind
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// Ends a batch when dropped
pub struct BatchGuard<'a> {
    store: &'a dyn SceneGraphStore,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.store.end_batch();
    }
}

/// Begin a batch that ends with the returned guard
pub fn batch(store: &dyn SceneGraphStore) -> BatchGuard<'_> {
    store.begin_batch();
    BatchGuard { store }
}
