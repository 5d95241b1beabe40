//! Attribute helpers and the symbol bundle

use crate::error::StageResult;
use crate::path::NodePath;
use crate::store::SceneGraphStore;
use bridge_core::{AttrType, AttrValue, FlatKey};

/// Attribute receiving device reads when no attribute is named
pub const ATTR_CURRENT_VALUE: &str = "value";
/// Value a user edits to write back to the device
pub const ATTR_WRITE_VALUE: &str = "write:value";
/// While true, edits to `write:value` are held
pub const ATTR_WRITE_PAUSE: &str = "write:pause";
/// Forces one write and resets itself
pub const ATTR_WRITE_ONCE: &str = "write:once";
/// Device variable the bundle writes to; its presence marks a node as ready
pub const ATTR_WRITE_SYMBOL: &str = "symbol";

const XFORM_TRANSFORM: &str = "xformOp:transform";
const XFORM_OP_ORDER: &str = "xformOpOrder";

/// Declare an attribute typed after `value` and store the value
pub fn create_attr(store: &dyn SceneGraphStore, path: &NodePath, name: &str, value: &AttrValue) -> StageResult<()> {
    if name == XFORM_TRANSFORM {
        register_xform_op(store, path)?;
    }
    store.create_attribute(path, name, value.inferred_type())?;
    store.set_attribute(path, name, value.clone())
}

/// Store a value, declaring the attribute first when missing.
///
/// Returns whether the attribute was created.
pub fn set_or_create_attr(
    store: &dyn SceneGraphStore,
    path: &NodePath,
    name: &str,
    value: &AttrValue,
) -> StageResult<bool> {
    if store.has_attribute(path, name) {
        store.set_attribute(path, name, value.clone())?;
        Ok(false)
    } else {
        create_attr(store, path, name, value)?;
        Ok(true)
    }
}

/// Current value, declaring the attribute with `default` when missing
pub fn get_or_create_attr(
    store: &dyn SceneGraphStore,
    path: &NodePath,
    name: &str,
    default: &AttrValue,
) -> StageResult<AttrValue> {
    if !store.has_attribute(path, name) {
        create_attr(store, path, name, default)?;
    }
    Ok(store.get_attribute(path, name).unwrap_or_else(|| default.clone()))
}

/// Build the attributes a device variable is mirrored through.
///
/// The symbol attribute is written last: until it exists, change notices
/// for the node are ignored by the feedback listener. A node that already
/// carries a bundle only gains the named attribute; its write attributes
/// stay with the user.
pub fn create_symbol_bundle(
    store: &dyn SceneGraphStore,
    path: &NodePath,
    attribute: &str,
    symbol: &FlatKey,
    value: &AttrValue,
) -> StageResult<()> {
    store.define_node(path, None)?;
    if store.has_attribute(path, ATTR_WRITE_SYMBOL) {
        return set_or_create_attr(store, path, attribute, value).map(|_| ());
    }
    create_attr(store, path, attribute, value)?;
    create_attr(store, path, ATTR_WRITE_VALUE, value)?;
    create_attr(store, path, ATTR_WRITE_ONCE, &AttrValue::Bool(false))?;
    create_attr(store, path, ATTR_WRITE_PAUSE, &AttrValue::Bool(false))?;
    create_attr(store, path, ATTR_WRITE_SYMBOL, &AttrValue::String(symbol.to_string()))
}

fn register_xform_op(store: &dyn SceneGraphStore, path: &NodePath) -> StageResult<()> {
    let mut order = match store.get_attribute(path, XFORM_OP_ORDER) {
        Some(AttrValue::StringList(order)) => order,
        _ => Vec::new(),
    };
    if order.iter().any(|op| op == XFORM_TRANSFORM) {
        return Ok(());
    }
    order.push(XFORM_TRANSFORM.to_string());
    store.create_attribute(path, XFORM_OP_ORDER, AttrType::StringArray)?;
    store.set_attribute(path, XFORM_OP_ORDER, AttrValue::StringList(order))
}
