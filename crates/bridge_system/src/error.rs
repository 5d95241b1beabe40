//! System errors

use bridge_runtime::RuntimeError;
use bridge_stage::StageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Invalid component name: {0}")]
    InvalidName(String),

    #[error("Component already exists: {0}")]
    AlreadyExists(String),

    #[error("Component not found: {0}")]
    NotFound(String),

    #[error("Failed to build component {name}: {reason}")]
    Factory { name: String, reason: String },

    #[error("Document error: {0}")]
    Stage(#[from] StageError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

pub type SystemResult<T> = Result<T, SystemError>;
