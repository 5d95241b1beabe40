//! # Bridge Core
//!
//! Shared vocabulary for keeping a polled bridge device and a scene-graph
//! document consistent.
//!
//! ## Key Concepts
//!
//! - **Value**: the nested payload a bridge read produces
//! - **FlatKey**: a dotted path naming one leaf of such a payload
//! - **AttrValue**: the tagged leaf value carried from ingestion to the document
//! - **SyncError**: the error taxonomy shared by every layer
//!
//! ```text
//! Bridge read ──► Value ──► flatten ──► FlatKey → AttrValue ──► document
//! ```

pub mod attr;
pub mod config;
pub mod error;
pub mod key;
pub mod value;

pub use attr::{AttrType, AttrValue, Matrix4};
pub use config::{ComponentConfig, ConfigError, ConfigResult, RuntimeConfig, SyncConfig, SystemConfig};
pub use error::{SyncError, SyncResult};
pub use key::{flatten, flatten_attrs, FlatKey, FlatMap, KEY_SEPARATOR};
pub use value::Value;
