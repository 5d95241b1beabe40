//! Dual-loop runtime driver
//!
//! Each [`RuntimeLoop`] owns a read thread and a write thread, plus any
//! extra background loops registered after construction. All of them share
//! one liveness flag; [`RuntimeLoop::cleanup`] clears it, joins every thread
//! and then runs the component's teardown hook.
//!
//! A callback that never returns hangs cleanup. Threads are never aborted.

use crate::hooks::{LoopStatus, RuntimeHooks};
use bridge_core::{RuntimeConfig, SyncError};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Pause after a failed read before the next attempt
pub const READ_FAILURE_BACKOFF: Duration = Duration::from_millis(10);

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to spawn thread '{name}': {reason}")]
    Spawn { name: String, reason: String },

    #[error("Runtime '{0}' has been cleaned up")]
    Stopped(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Runtime lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Loops are running
    Running,
    /// Cleanup in progress, waiting for loops to exit
    Stopping,
    /// All loops joined
    Stopped,
}

/// Snapshot of loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub read_iterations: u64,
    pub read_failures: u64,
    pub write_iterations: u64,
    pub write_failures: u64,
    pub extra_loops: u64,
}

/// State shared between the owner and the worker threads
struct LoopShared {
    alive: AtomicBool,
    read_period_us: AtomicU64,
    write_sleep_us: AtomicU64,
    read_iterations: AtomicU64,
    read_failures: AtomicU64,
    write_iterations: AtomicU64,
    write_failures: AtomicU64,
    extra_loops: AtomicU64,
}

impl LoopShared {
    fn new(config: &RuntimeConfig) -> Self {
        Self {
            alive: AtomicBool::new(true),
            read_period_us: AtomicU64::new(config.read_period().as_micros() as u64),
            write_sleep_us: AtomicU64::new(config.write_sleep().as_micros() as u64),
            read_iterations: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            write_iterations: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            extra_loops: AtomicU64::new(0),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn read_period(&self) -> Duration {
        Duration::from_micros(self.read_period_us.load(Ordering::Relaxed))
    }

    fn write_sleep(&self) -> Duration {
        Duration::from_micros(self.write_sleep_us.load(Ordering::Relaxed))
    }
}

/// Liveness view handed to extra background loops
#[derive(Clone)]
pub struct AliveToken {
    shared: Arc<LoopShared>,
}

impl AliveToken {
    /// False once cleanup has started
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }
}

/// Per-component read/write loop driver
pub struct RuntimeLoop {
    name: String,
    shared: Arc<LoopShared>,
    hooks: Arc<dyn RuntimeHooks>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    state: RwLock<RuntimeState>,
    cleaned: AtomicBool,
}

impl RuntimeLoop {
    /// Start the read and write loops for a component
    pub fn start(
        name: impl Into<String>,
        config: &RuntimeConfig,
        hooks: Arc<dyn RuntimeHooks>,
    ) -> RuntimeResult<Self> {
        let name = name.into();
        let shared = Arc::new(LoopShared::new(config));
        let runtime = Self {
            name,
            shared,
            hooks,
            threads: Mutex::new(Vec::with_capacity(2)),
            state: RwLock::new(RuntimeState::Running),
            cleaned: AtomicBool::new(false),
        };

        let read = {
            let shared = Arc::clone(&runtime.shared);
            let hooks = Arc::clone(&runtime.hooks);
            let name = runtime.name.clone();
            runtime.spawn_thread("read", move || read_loop(&name, &shared, hooks.as_ref()))
        };
        let write = read.and_then(|_| {
            let shared = Arc::clone(&runtime.shared);
            let hooks = Arc::clone(&runtime.hooks);
            let name = runtime.name.clone();
            runtime.spawn_thread("write", move || write_loop(&name, &shared, hooks.as_ref()))
        });

        // Dropping the runtime on error joins whatever did start
        write?;
        log::info!(
            "Runtime '{}' started (read period {:?}, write sleep {:?})",
            runtime.name,
            config.read_period(),
            config.write_sleep()
        );
        Ok(runtime)
    }

    /// Component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    /// Read loop period
    pub fn read_period(&self) -> Duration {
        self.shared.read_period()
    }

    /// Change the read loop period, effective from the next iteration
    pub fn set_read_period(&self, period: Duration) {
        self.shared
            .read_period_us
            .store(period.as_micros() as u64, Ordering::Relaxed);
    }

    /// Write loop sleep
    pub fn write_sleep(&self) -> Duration {
        self.shared.write_sleep()
    }

    /// Change the write loop sleep, effective from the next iteration
    pub fn set_write_sleep(&self, sleep: Duration) {
        self.shared
            .write_sleep_us
            .store(sleep.as_micros() as u64, Ordering::Relaxed);
    }

    /// Loop counters
    pub fn stats(&self) -> LoopStats {
        let s = &self.shared;
        LoopStats {
            read_iterations: s.read_iterations.load(Ordering::Relaxed),
            read_failures: s.read_failures.load(Ordering::Relaxed),
            write_iterations: s.write_iterations.load(Ordering::Relaxed),
            write_failures: s.write_failures.load(Ordering::Relaxed),
            extra_loops: s.extra_loops.load(Ordering::Relaxed),
        }
    }

    /// Run `body` on its own background thread until it returns.
    ///
    /// The body receives a token it should poll to notice shutdown; cleanup
    /// joins it together with the read and write loops.
    pub fn spawn_loop<F>(&self, name: &str, body: F) -> RuntimeResult<()>
    where
        F: FnOnce(AliveToken) + Send + 'static,
    {
        let token = AliveToken {
            shared: Arc::clone(&self.shared),
        };
        self.spawn_thread(name, move || body(token))?;
        self.shared.extra_loops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop and join every loop, then run the cleanup hook.
    ///
    /// Idempotent; only the first call does any work. Blocks until all
    /// threads have returned.
    pub fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return;
        }

        *self.state.write() = RuntimeState::Stopping;
        self.shared.alive.store(false, Ordering::Release);

        let handles = std::mem::take(&mut *self.threads.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                log::warn!("Runtime '{}' cleaned up from its own loop; not joining it", self.name);
                continue;
            }
            let thread_name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                log::error!("Runtime thread '{}' panicked", thread_name);
            }
        }

        if let Err(e) = guarded(|| {
            self.hooks.on_cleanup();
            Ok(())
        }) {
            log::error!("Runtime '{}' cleanup hook failed: {}", self.name, e);
        }

        *self.state.write() = RuntimeState::Stopped;
        log::info!("Runtime '{}' stopped", self.name);
    }

    fn spawn_thread<F>(&self, role: &str, body: F) -> RuntimeResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut threads = self.threads.lock();
        if self.cleaned.load(Ordering::Acquire) {
            return Err(RuntimeError::Stopped(self.name.clone()));
        }

        let thread_name = format!("{}-{}", self.name, role);
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(body)
            .map_err(|e| RuntimeError::Spawn {
                name: thread_name,
                reason: e.to_string(),
            })?;
        threads.push(handle);
        Ok(())
    }
}

impl Drop for RuntimeLoop {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Fixed-rate read loop.
///
/// Sleeps whatever is left of the period since the previous tick. When a
/// callback overruns the period the loop only yields and restarts the
/// schedule from now, so a slow bridge never causes catch-up bursts.
fn read_loop(name: &str, shared: &LoopShared, hooks: &dyn RuntimeHooks) {
    run_hook(name, "read starting", || hooks.on_read_starting());

    let mut last_tick = Instant::now();
    let mut failing = false;

    while shared.is_alive() {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(last_tick);
        match shared.read_period().checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => {
                last_tick = now + remaining;
                thread::sleep(remaining);
            }
            _ => {
                last_tick = now;
                thread::yield_now();
            }
        }

        if !shared.is_alive() {
            break;
        }

        shared.read_iterations.fetch_add(1, Ordering::Relaxed);
        match guarded(|| hooks.on_read()) {
            Ok(()) => failing = false,
            Err(e) => {
                shared.read_failures.fetch_add(1, Ordering::Relaxed);
                if failing {
                    log::debug!("Read failed again for '{}': {}", name, e);
                } else {
                    log::warn!("Read failed for '{}': {}", name, e);
                    failing = true;
                }
                thread::sleep(READ_FAILURE_BACKOFF);
            }
        }
    }

    run_hook(name, "read ending", || hooks.on_read_ending());
}

/// Continuous write loop. Failures are counted and otherwise ignored.
fn write_loop(name: &str, shared: &LoopShared, hooks: &dyn RuntimeHooks) {
    run_hook(name, "write starting", || hooks.on_write_starting());

    while shared.is_alive() {
        shared.write_iterations.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = guarded(|| hooks.on_write()) {
            shared.write_failures.fetch_add(1, Ordering::Relaxed);
            log::trace!("Write failed for '{}': {}", name, e);
        }
        thread::sleep(shared.write_sleep());
    }

    run_hook(name, "write ending", || hooks.on_write_ending());
}

fn run_hook(name: &str, what: &str, hook: impl FnOnce()) {
    if let Err(e) = guarded(|| {
        hook();
        Ok(())
    }) {
        log::error!("Runtime '{}' {} hook failed: {}", name, what, e);
    }
}

/// Run a callback, turning a panic into a bridge failure
fn guarded(callback: impl FnOnce() -> LoopStatus) -> LoopStatus {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(status) => status,
        Err(payload) => Err(SyncError::BridgeCallFailure(format!(
            "callback panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
