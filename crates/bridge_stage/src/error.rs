//! Document store errors

use crate::path::NodePath;
use bridge_core::{AttrType, SyncError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodePath),

    #[error("Attribute not found: {node}.{attribute}")]
    AttributeNotFound { node: NodePath, attribute: String },

    #[error("Cannot store {found} in {expected:?} attribute {node}.{attribute}")]
    TypeCoercion {
        node: NodePath,
        attribute: String,
        expected: AttrType,
        found: String,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Document is closed")]
    Closed,
}

impl StageError {
    /// Whether the error only signals a missing target
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::AttributeNotFound { .. })
    }
}

impl From<StageError> for SyncError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::NodeNotFound(node) => SyncError::TargetNotFound(node.to_string()),
            StageError::AttributeNotFound { node, attribute } => {
                SyncError::TargetNotFound(format!("{}.{}", node, attribute))
            }
            StageError::TypeCoercion {
                node,
                attribute,
                expected,
                found,
            } => SyncError::TypeCoercionFailure {
                target: format!("{}.{}", node, attribute),
                expected,
                found,
            },
            StageError::InvalidPath(path) => SyncError::InvalidPayload(format!("invalid path {}", path)),
            StageError::Closed => SyncError::TargetNotFound("document is closed".to_string()),
        }
    }
}

pub type StageResult<T> = Result<T, StageError>;
