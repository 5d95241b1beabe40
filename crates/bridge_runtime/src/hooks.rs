//! Capability interface implemented by each component variant

use bridge_core::SyncResult;

/// Outcome of one loop iteration
pub type LoopStatus = SyncResult<()>;

/// Callbacks driven by a [`RuntimeLoop`](crate::RuntimeLoop).
///
/// The read-side and write-side methods are called from two different
/// threads at the same time, so implementors use interior mutability for
/// any state they share between the two sides.
///
/// Every method has a no-op default; a component only implements what it
/// needs.
pub trait RuntimeHooks: Send + Sync + 'static {
    /// Called on the read thread before its first iteration
    fn on_read_starting(&self) {}

    /// Called once per read period
    fn on_read(&self) -> LoopStatus {
        Ok(())
    }

    /// Called on the read thread after its last iteration
    fn on_read_ending(&self) {}

    /// Called on the write thread before its first iteration
    fn on_write_starting(&self) {}

    /// Called continuously, separated by the write sleep
    fn on_write(&self) -> LoopStatus {
        Ok(())
    }

    /// Called on the write thread after its last iteration
    fn on_write_ending(&self) {}

    /// Called once after both loops have been joined
    fn on_cleanup(&self) {}
}
