//! # Bridge Runtime
//!
//! Drives a bridge from two independent worker threads per component:
//!
//! - the **read loop** polls the bridge at a fixed, drift-corrected rate and
//!   republishes results on the event bus
//! - the **write loop** pushes pending writes to the bridge continuously,
//!   separated only by a short sleep
//!
//! Components plug in through [`RuntimeHooks`]; the driver never inspects
//! what a hook does. Failures returned (or panics raised) by a hook are
//! logged and the loop carries on.
//!
//! ## Usage
//!
//! ```ignore
//! let bus = EventBus::shared();
//! let hooks = Arc::new(MyDevice::new(EventPublisher::new("plc_a", bus.clone())));
//! let runtime = RuntimeLoop::start("plc_a", &RuntimeConfig::default(), hooks)?;
//!
//! // ... later, from any thread
//! runtime.cleanup();
//! ```

pub mod bridge;
pub mod hooks;
pub mod publisher;
pub mod runtime;

pub use bridge::{BridgeManager, DataCallback, QueuedBridge, WriteRequest};
pub use hooks::{LoopStatus, RuntimeHooks};
pub use publisher::EventPublisher;
pub use runtime::{AliveToken, LoopStats, RuntimeError, RuntimeLoop, RuntimeResult, RuntimeState};
