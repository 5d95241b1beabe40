//! Flat key compilation
//!
//! A flat key addresses a node below the component root, one level per
//! key segment. The last segment may carry a command of the form
//! `usd:<op>[:<arg>]`, in which case it addresses its parent node:
//!
//! | last segment                    | operation                                   |
//! |---------------------------------|---------------------------------------------|
//! | `speed`                         | `Set` of `value` on `.../speed`             |
//! | `usd:attr:xformOp:transform`    | `CreateSymbol` of `xformOp:transform` on parent |
//! | `usd:type`                      | `CreateTyped` of the parent, type = value   |

use crate::attributes::{create_symbol_bundle, ATTR_CURRENT_VALUE};
use crate::error::StageError;
use crate::path::NodePath;
use crate::store::SceneGraphStore;
use bridge_core::{AttrType, AttrValue, FlatKey, SyncError, SyncResult};

/// Prefix marking a command segment
pub const COMMAND_PREFIX: &str = "usd";

const COMMAND_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// Node typed after the value
    CreateTyped,
    /// Named attribute with a symbol bundle
    CreateSymbol,
    /// The default `value` attribute with a symbol bundle
    Set,
}

/// What one flat key does to the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeOperation {
    pub kind: OpKind,
    pub path: NodePath,
    pub attribute: String,
    /// Command argument beyond the attribute, if any
    pub aux: String,
    /// Key the operation was compiled from; the bundle's device symbol
    pub symbol: FlatKey,
}

/// Compile a flat key against a component root. Pure.
pub fn compile_key(root: &NodePath, key: &FlatKey) -> AttributeOperation {
    let full = root.append_key(key);
    let set = |path: NodePath| AttributeOperation {
        kind: OpKind::Set,
        path,
        attribute: ATTR_CURRENT_VALUE.to_string(),
        aux: String::new(),
        symbol: key.clone(),
    };

    let name = full.name().to_string();
    let parts: Vec<&str> = name.split(COMMAND_SEPARATOR).collect();
    if parts.len() < 2 || parts[0] != COMMAND_PREFIX {
        return set(full);
    }
    let parent = full.parent().unwrap_or_else(NodePath::root);
    let arg = parts[2..].join(":");

    match parts[1] {
        "type" => AttributeOperation {
            kind: OpKind::CreateTyped,
            path: parent,
            attribute: String::new(),
            aux: arg,
            symbol: key.clone(),
        },
        op => {
            if op != "attr" {
                log::debug!("Unknown command '{}' in key '{}', treating as attr", op, key);
            }
            if arg.is_empty() {
                log::warn!("Key '{}' names no attribute, writing to '{}'", key, ATTR_CURRENT_VALUE);
                return set(full);
            }
            AttributeOperation {
                kind: OpKind::CreateSymbol,
                path: parent,
                attribute: arg,
                aux: String::new(),
                symbol: key.clone(),
            }
        }
    }
}

impl AttributeOperation {
    /// Apply to an existing target.
    ///
    /// Fails with [`SyncError::TargetNotFound`] and leaves the document
    /// untouched when the node or attribute is missing.
    pub fn execute(&self, store: &dyn SceneGraphStore, value: &AttrValue) -> SyncResult<()> {
        if !store.has_node(&self.path) {
            return Err(StageError::NodeNotFound(self.path.clone()).into());
        }
        match self.kind {
            OpKind::CreateTyped => {
                let type_name = self.type_name(value)?;
                if store.node_type(&self.path).as_deref() != Some(type_name) {
                    store.define_node(&self.path, Some(type_name))?;
                }
                Ok(())
            }
            OpKind::Set | OpKind::CreateSymbol => {
                if !store.has_attribute(&self.path, &self.attribute) {
                    return Err(StageError::AttributeNotFound {
                        node: self.path.clone(),
                        attribute: self.attribute.clone(),
                    }
                    .into());
                }
                store.set_attribute(&self.path, &self.attribute, value.clone())?;
                Ok(())
            }
        }
    }

    /// Create the target and store the value
    pub fn create(&self, store: &dyn SceneGraphStore, value: &AttrValue) -> SyncResult<()> {
        match self.kind {
            OpKind::CreateTyped => {
                let type_name = self.type_name(value)?;
                store.define_node(&self.path, Some(type_name))?;
            }
            OpKind::Set | OpKind::CreateSymbol => {
                create_symbol_bundle(store, &self.path, &self.attribute, &self.symbol, value)?;
            }
        }
        Ok(())
    }

    fn type_name<'v>(&self, value: &'v AttrValue) -> SyncResult<&'v str> {
        value.as_str().ok_or_else(|| SyncError::TypeCoercionFailure {
            target: self.path.to_string(),
            expected: AttrType::String,
            found: value.kind().to_string(),
        })
    }
}
