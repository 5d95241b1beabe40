//! # Bridge System
//!
//! Owns every bridge component of a document. A component is a device
//! runtime (read and write loops) paired with the sync engine mirroring
//! it under `root/<name>`.
//!
//! ```text
//! System
//!   ├── plc_a: RuntimeLoop + SyncEngine  →  /World/Bridges/plc_a
//!   └── plc_b: RuntimeLoop + SyncEngine  →  /World/Bridges/plc_b
//! ```

pub mod component;
pub mod error;
pub mod system;

pub use component::{Component, ComponentFactory, ComponentParts, OptionsCallback};
pub use error::{SystemError, SystemResult};
pub use system::System;
