//! Error taxonomy for the synchronisation layer
//!
//! Nothing in this subsystem is fatal. Each variant maps to a recovery
//! policy applied by whoever observes it:
//!
//! - [`SyncError::BridgeCallFailure`] - logged, the loop continues
//! - [`SyncError::TargetNotFound`] - not an error at all, triggers deferred creation
//! - [`SyncError::TypeCoercionFailure`] - reported per key, the batch continues
//! - [`SyncError::EventPublishFailure`] - logged, never reaches the publisher's caller

use crate::attr::AttrType;
use thiserror::Error;

/// Synchronisation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("Bridge call failed: {0}")]
    BridgeCallFailure(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Cannot store {found} in {expected:?} attribute {target}")]
    TypeCoercionFailure {
        target: String,
        expected: AttrType,
        found: String,
    },

    #[error("Event publish failed: {0}")]
    EventPublishFailure(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl SyncError {
    /// Create a bridge failure from anything printable
    pub fn bridge(reason: impl Into<String>) -> Self {
        Self::BridgeCallFailure(reason.into())
    }

    /// Whether this error only signals a missing node or attribute
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TargetNotFound(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
