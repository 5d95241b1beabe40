//! Flat keys
//!
//! A nested read result is flattened into one entry per leaf, keyed by the
//! dot-joined field path leading to it:
//!
//! ```text
//! {"motor": {"speed": 3.0, "on": true}}  ──►  motor.speed = 3.0
//!                                              motor.on    = true
//! ```

use crate::attr::AttrValue;
use crate::error::{SyncError, SyncResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Separator between field names in a flat key
pub const KEY_SEPARATOR: char = '.';

/// Dot-joined path identifying one leaf of a nested payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlatKey(String);

impl FlatKey {
    /// Create a key from its textual form
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the field names making up the key
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR)
    }

    /// Extend the key with one more field name
    pub fn join(&self, field: &str) -> Self {
        if self.0.is_empty() {
            Self(field.to_string())
        } else {
            Self(format!("{}{}{}", self.0, KEY_SEPARATOR, field))
        }
    }
}

impl fmt::Display for FlatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlatKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Flattened payload
pub type FlatMap<V> = BTreeMap<FlatKey, V>;

/// Flatten a nested object into one entry per leaf.
///
/// Object-valued fields are descended into; every other value is a leaf.
/// Empty objects contribute no entries. The root must be an object.
///
/// Fields are visited depth-first in name order. Two distinct paths can
/// produce the same key when a field name itself contains the separator;
/// the collision is logged and the path visited last wins.
pub fn flatten(value: &Value) -> SyncResult<FlatMap<Value>> {
    let root = value.as_object().ok_or_else(|| {
        SyncError::InvalidPayload(format!("expected an object, found {}", value.kind()))
    })?;

    let mut flat = FlatMap::new();
    let mut stack: Vec<(FlatKey, &Value)> = Vec::new();
    push_fields(&mut stack, root, None);

    while let Some((key, value)) = stack.pop() {
        match value {
            Value::Object(fields) => push_fields(&mut stack, fields, Some(&key)),
            leaf => {
                if flat.insert(key.clone(), leaf.clone()).is_some() {
                    log::warn!("Flat key collision on '{}', keeping the last value", key);
                }
            }
        }
    }

    Ok(flat)
}

// Reverse name order so that pops come out ascending
fn push_fields<'v>(
    stack: &mut Vec<(FlatKey, &'v Value)>,
    fields: &'v HashMap<String, Value>,
    parent: Option<&FlatKey>,
) {
    let mut names: Vec<&String> = fields.keys().collect();
    names.sort_unstable_by(|a, b| b.cmp(a));
    for name in names {
        let key = match parent {
            Some(parent) => parent.join(name),
            None => FlatKey::new(name.clone()),
        };
        stack.push((key, &fields[name]));
    }
}

/// Flatten and classify every leaf into an attribute value.
///
/// Leaves without an attribute representation (nulls) are dropped.
pub fn flatten_attrs(value: &Value) -> SyncResult<FlatMap<AttrValue>> {
    Ok(flatten(value)?
        .into_iter()
        .filter_map(|(key, leaf)| AttrValue::from_payload(&leaf).map(|v| (key, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::object()
            .with("motor", Value::object().with("speed", 3.0).with("on", true))
            .with("label", "conveyor")
            .with(
                "deep",
                Value::object().with("a", Value::object().with("b", Value::object().with("c", 1))),
            )
    }

    #[test]
    fn test_flatten_nested() {
        let flat = flatten(&sample()).unwrap();
        let keys: Vec<&str> = flat.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["deep.a.b.c", "label", "motor.on", "motor.speed"]);
        assert_eq!(flat[&FlatKey::from("motor.speed")], Value::Float(3.0));
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let value = sample();
        assert_eq!(flatten(&value).unwrap(), flatten(&value).unwrap());
    }

    #[test]
    fn test_empty_objects_have_no_leaves() {
        let value = Value::object().with("empty", Value::object()).with("x", 1);
        let flat = flatten(&value).unwrap();
        assert_eq!(flat.len(), 1);
        assert!(flat.contains_key(&FlatKey::from("x")));
    }

    #[test]
    fn test_collision_keeps_other_leaves() {
        let value = Value::object()
            .with("a.b", 1)
            .with("a", Value::object().with("b", 2))
            .with("speed", 3.0);
        let flat = flatten(&value).unwrap();
        assert_eq!(flat.len(), 2);
        // "a" is visited before "a.b"
        assert_eq!(flat[&FlatKey::from("a.b")], Value::from(1));
        assert_eq!(flat[&FlatKey::from("speed")], Value::Float(3.0));
        assert_eq!(flatten(&value).unwrap(), flat);
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(flatten(&Value::from(5)), Err(SyncError::InvalidPayload(_))));
    }

    #[test]
    fn test_flatten_attrs_drops_nulls() {
        let value = Value::object().with("gone", Value::Null).with("kept", 2);
        let flat = flatten_attrs(&value).unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[&FlatKey::from("kept")], AttrValue::Number(2.0));
    }

    #[test]
    fn test_key_segments() {
        let key = FlatKey::new("").join("group").join("field");
        assert_eq!(key.as_str(), "group.field");
        assert_eq!(key.segments().collect::<Vec<_>>(), vec!["group", "field"]);
    }
}
