//! Component options stored as node attributes

use crate::error::StageResult;
use crate::path::NodePath;
use crate::store::SceneGraphStore;
use bridge_core::AttrValue;
use std::collections::BTreeMap;

/// Option name to value
pub type Options = BTreeMap<String, AttrValue>;

/// Read every option named in `defaults` from the node, falling back to the
/// default when the node or attribute is missing or unset.
pub fn get_options_from_node(store: &dyn SceneGraphStore, path: &NodePath, defaults: &Options) -> Options {
    defaults
        .iter()
        .map(|(name, default)| {
            let value = store
                .get_attribute(path, name)
                .unwrap_or_else(|| default.clone());
            (name.clone(), value)
        })
        .collect()
}

/// Write every option to the node, declaring missing attributes
pub fn set_options_on_node(store: &dyn SceneGraphStore, path: &NodePath, options: &Options) -> StageResult<()> {
    store.define_node(path, None)?;
    for (name, value) in options {
        if !store.has_attribute(path, name) {
            store.create_attribute(path, name, value.inferred_type())?;
        }
        store.set_attribute(path, name, value.clone())?;
    }
    Ok(())
}
