//! # Bridge Event
//!
//! Publish/subscribe channel between component runtimes and whoever
//! consumes their output.
//!
//! Events are addressed by `{kind}.{component}` so that every component gets
//! its own stream of each kind:
//!
//! ```text
//! RuntimeLoop("plc_a") ──► data_read.plc_a ──► SyncEngine("plc_a")
//!                      ──► status.plc_a    ──► UI / logging
//! ```
//!
//! The bus is an explicit handle passed to each component at construction;
//! there is no process-wide instance.

pub mod bus;
pub mod message;

pub use bus::{EventBus, EventBusStats, EventError, EventResult, EventBusResult, SubscriptionId};
pub use message::{EventId, EventKind, Message, MessageMeta};
