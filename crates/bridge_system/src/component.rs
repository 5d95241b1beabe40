//! A runtime and its sync engine

use crate::error::SystemResult;
use bridge_event::EventBus;
use bridge_runtime::{BridgeManager, RuntimeHooks, RuntimeLoop};
use bridge_stage::{NodePath, Options, SyncEngine, TickReport};
use parking_lot::RwLock;
use std::sync::Arc;

/// Told about option changes read back from the document
pub type OptionsCallback = Arc<dyn Fn(&Options) + Send + Sync>;

/// The device side of a component, as built by a [`ComponentFactory`]
pub struct ComponentParts {
    pub hooks: Arc<dyn RuntimeHooks>,
    pub bridge: Arc<dyn BridgeManager>,
    pub on_options: Option<OptionsCallback>,
}

impl ComponentParts {
    pub fn new(hooks: Arc<dyn RuntimeHooks>, bridge: Arc<dyn BridgeManager>) -> Self {
        Self {
            hooks,
            bridge,
            on_options: None,
        }
    }

    pub fn with_options_callback(mut self, callback: OptionsCallback) -> Self {
        self.on_options = Some(callback);
        self
    }
}

/// Builds the device side of new components
pub trait ComponentFactory: Send + Sync {
    /// `bus` carries the component's `data_read`, `status` and `connection` events
    fn create(&self, name: &str, options: &Options, bus: &Arc<EventBus>) -> SystemResult<ComponentParts>;
}

impl<F> ComponentFactory for F
where
    F: Fn(&str, &Options, &Arc<EventBus>) -> SystemResult<ComponentParts> + Send + Sync,
{
    fn create(&self, name: &str, options: &Options, bus: &Arc<EventBus>) -> SystemResult<ComponentParts> {
        self(name, options, bus)
    }
}

/// One registered component
pub struct Component {
    name: String,
    path: NodePath,
    options: RwLock<Options>,
    on_options: Option<OptionsCallback>,
    runtime: RuntimeLoop,
    engine: SyncEngine,
}

impl Component {
    pub(crate) fn new(
        name: String,
        path: NodePath,
        options: Options,
        on_options: Option<OptionsCallback>,
        runtime: RuntimeLoop,
        engine: SyncEngine,
    ) -> Self {
        Self {
            name,
            path,
            options: RwLock::new(options),
            on_options,
            runtime,
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node the component's options live on and its variables are mirrored under
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn options(&self) -> Options {
        self.options.read().clone()
    }

    /// Replace the options and tell the device side
    pub fn set_options(&self, options: Options) {
        if let Some(callback) = &self.on_options {
            callback(&options);
        }
        *self.options.write() = options;
    }

    pub fn runtime(&self) -> &RuntimeLoop {
        &self.runtime
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn tick(&self) -> TickReport {
        self.engine.tick()
    }

    /// Stop the runtime, then detach the engine
    pub fn cleanup(&self) {
        self.runtime.cleanup();
        self.engine.cleanup();
    }
}
