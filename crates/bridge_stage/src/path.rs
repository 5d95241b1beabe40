//! Absolute document paths

use crate::error::{StageError, StageResult};
use bridge_core::FlatKey;
use std::fmt;

/// Path separator inside the document
pub const PATH_SEPARATOR: char = '/';

/// Absolute path of a document node, e.g. `/World/Bridges/plc_a`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    /// Parse an absolute path. A trailing separator is ignored.
    pub fn new(path: impl AsRef<str>) -> StageResult<Self> {
        let path = path.as_ref();
        if !path.starts_with(PATH_SEPARATOR) {
            return Err(StageError::InvalidPath(path.to_string()));
        }
        let trimmed = path.trim_end_matches(PATH_SEPARATOR);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        if trimmed[1..].split(PATH_SEPARATOR).any(str::is_empty) {
            return Err(StageError::InvalidPath(path.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The pseudo-root `/`
    pub fn root() -> Self {
        Self(PATH_SEPARATOR.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment; empty for the root
    pub fn name(&self) -> &str {
        self.0.rsplit(PATH_SEPARATOR).next().unwrap_or("")
    }

    /// Parent path; `None` for the root
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(PATH_SEPARATOR) {
            Some(0) | None => Some(Self::root()),
            Some(i) => Some(Self(self.0[..i].to_string())),
        }
    }

    /// Path of a direct child
    pub fn child(&self, name: &str) -> NodePath {
        if self.is_root() {
            Self(format!("{}{}", PATH_SEPARATOR, name))
        } else {
            Self(format!("{}{}{}", self.0, PATH_SEPARATOR, name))
        }
    }

    /// Path reached by descending one level per key segment
    pub fn append_key(&self, key: &FlatKey) -> NodePath {
        key.segments()
            .filter(|s| !s.is_empty())
            .fold(self.clone(), |path, segment| path.child(segment))
    }

    /// Whether this path is `prefix` itself or lies below it
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.0.len() > prefix.0.len()
            && self.0.starts_with(&prefix.0)
            && self.0[prefix.0.len()..].starts_with(PATH_SEPARATOR)
    }

    /// Every ancestor from the top down, excluding the root and self
    pub fn ancestors(&self) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            out.push(path);
        }
        out.reverse();
        out
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> NodePath {
        NodePath::new(s).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(p("/World/Bridges/").as_str(), "/World/Bridges");
        assert!(p("/").is_root());
        assert!(NodePath::new("relative").is_err());
        assert!(NodePath::new("/a//b").is_err());
    }

    #[test]
    fn test_navigation() {
        let path = p("/World/Bridges/plc");
        assert_eq!(path.name(), "plc");
        assert_eq!(path.parent(), Some(p("/World/Bridges")));
        assert_eq!(p("/World").parent(), Some(NodePath::root()));
        assert_eq!(NodePath::root().parent(), None);
        assert_eq!(NodePath::root().child("a"), p("/a"));
        assert_eq!(path.ancestors(), vec![p("/World"), p("/World/Bridges")]);
    }

    #[test]
    fn test_append_key() {
        let root = p("/World/plc");
        assert_eq!(
            root.append_key(&FlatKey::from("motor.speed")),
            p("/World/plc/motor/speed")
        );
        assert_eq!(
            root.append_key(&FlatKey::from("pos.usd:attr:xformOp:transform")).name(),
            "usd:attr:xformOp:transform"
        );
    }

    #[test]
    fn test_starts_with() {
        let root = p("/World/plc");
        assert!(p("/World/plc/a").starts_with(&root));
        assert!(root.starts_with(&root));
        assert!(!p("/World/plc2/a").starts_with(&root));
        assert!(p("/x").starts_with(&NodePath::root()));
    }
}
