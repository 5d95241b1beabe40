//! # Bridge Stage
//!
//! Keeps a scene-graph document consistent with a live bridge.
//!
//! ## Architecture
//!
//! ```text
//! read thread                      main thread
//! ───────────                      ───────────
//! data_read ──► flatten ──► StagingBuffer ──► tick ──► SceneGraphStore
//!                                                            │
//! BridgeManager::write_variable ◄── FeedbackListener ◄── change notices
//! ```
//!
//! ## Key Concepts
//!
//! - **SceneGraphStore**: the document; only the main thread mutates it
//! - **StagingBuffer**: latest value per flat key, filled by the read thread
//! - **AttributeOperation**: what a flat key means for the document
//! - **Symbol bundle**: the attributes through which a user writes back

pub mod attributes;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod memory;
pub mod ops;
pub mod options;
pub mod path;
pub mod staging;
pub mod store;

pub use attributes::{
    create_attr, create_symbol_bundle, get_or_create_attr, set_or_create_attr, ATTR_CURRENT_VALUE,
    ATTR_WRITE_ONCE, ATTR_WRITE_PAUSE, ATTR_WRITE_SYMBOL, ATTR_WRITE_VALUE,
};
pub use engine::{SyncEngine, TickReport};
pub use error::{StageError, StageResult};
pub use feedback::FeedbackListener;
pub use memory::MemoryStage;
pub use ops::{compile_key, AttributeOperation, OpKind};
pub use options::{get_options_from_node, set_options_on_node, Options};
pub use path::NodePath;
pub use staging::StagingBuffer;
pub use store::{batch, BatchGuard, ChangeCallback, ChangeNotice, ListenerId, OpenedCallback, SceneGraphStore};
