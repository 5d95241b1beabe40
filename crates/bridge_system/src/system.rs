//! Component registry

use crate::component::{Component, ComponentFactory};
use crate::error::{SystemError, SystemResult};
use bridge_core::{RuntimeConfig, SyncConfig};
use bridge_event::EventBus;
use bridge_runtime::RuntimeLoop;
use bridge_stage::{
    get_options_from_node, set_options_on_node, NodePath, Options, SceneGraphStore, SyncEngine, TickReport,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Owns every component mirrored into one document
pub struct System {
    root: NodePath,
    defaults: Options,
    factory: Arc<dyn ComponentFactory>,
    store: Arc<dyn SceneGraphStore>,
    bus: Arc<EventBus>,
    runtime_config: RuntimeConfig,
    components: RwLock<BTreeMap<String, Arc<Component>>>,
}

impl System {
    pub fn new(
        root: &str,
        defaults: Options,
        factory: Arc<dyn ComponentFactory>,
        store: Arc<dyn SceneGraphStore>,
        bus: Arc<EventBus>,
        runtime_config: RuntimeConfig,
    ) -> SystemResult<Self> {
        let root = NodePath::new(root)?;
        log::info!("System rooted at {} with {} default options", root, defaults.len());
        Ok(Self {
            root,
            defaults,
            factory,
            store,
            bus,
            runtime_config,
            components: RwLock::new(BTreeMap::new()),
        })
    }

    /// Build a system and add every component the configuration declares
    pub fn from_config(
        config: &SyncConfig,
        factory: Arc<dyn ComponentFactory>,
        store: Arc<dyn SceneGraphStore>,
        bus: Arc<EventBus>,
    ) -> SystemResult<Self> {
        let system = Self::new(
            &config.system.root,
            config.system.defaults.clone(),
            factory,
            store,
            bus,
            config.runtime.clone(),
        )?;
        for component in &config.components {
            system.add_component(&component.name, &component.options)?;
        }
        Ok(system)
    }

    pub fn root(&self) -> &NodePath {
        &self.root
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Node path of a component. Absolute names are used as-is.
    pub fn component_path(&self, name: &str) -> SystemResult<NodePath> {
        if name.is_empty() {
            return Err(SystemError::InvalidName(name.to_string()));
        }
        let path = if name.starts_with('/') {
            NodePath::new(name)
        } else {
            NodePath::new(format!("{}/{}", self.root.as_str().trim_end_matches('/'), name))
        };
        path.map_err(|_| SystemError::InvalidName(name.to_string()))
    }

    /// Register a component: store its options on its node, build the
    /// device side and start its loops.
    pub fn add_component(&self, name: &str, options: &Options) -> SystemResult<Arc<Component>> {
        if self.components.read().contains_key(name) {
            return Err(SystemError::AlreadyExists(name.to_string()));
        }
        let path = self.component_path(name)?;

        let mut merged = self.defaults.clone();
        merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        set_options_on_node(self.store.as_ref(), &path, &merged)?;

        let parts = self.factory.create(name, &merged, &self.bus)?;
        let engine = SyncEngine::new(name, path.clone(), Arc::clone(&self.store), parts.bridge);
        let runtime = RuntimeLoop::start(name, &self.runtime_config, parts.hooks)?;

        let component = Arc::new(Component::new(
            name.to_string(),
            path,
            merged,
            parts.on_options,
            runtime,
            engine,
        ));

        let mut components = self.components.write();
        if components.contains_key(name) {
            drop(components);
            component.cleanup();
            return Err(SystemError::AlreadyExists(name.to_string()));
        }
        components.insert(name.to_string(), Arc::clone(&component));
        log::info!("Added component '{}' at {}", name, component.path());
        Ok(component)
    }

    /// Stop and forget a component. Its document nodes are left in place.
    pub fn remove_component(&self, name: &str) -> SystemResult<()> {
        let component = self
            .components
            .write()
            .remove(name)
            .ok_or_else(|| SystemError::NotFound(name.to_string()))?;
        component.cleanup();
        log::info!("Removed component '{}'", name);
        Ok(())
    }

    /// Stop every component
    pub fn cleanup(&self) {
        let components = std::mem::take(&mut *self.components.write());
        for (name, component) in components {
            log::debug!("Cleaning up component '{}'", name);
            component.cleanup();
        }
    }

    /// Components described in the document: every node carrying at least
    /// one default option, with its options.
    pub fn find_components(&self) -> BTreeMap<String, Options> {
        if !self.store.is_open() {
            return BTreeMap::new();
        }
        self.store
            .nodes()
            .into_iter()
            .filter(|path| {
                self.defaults
                    .keys()
                    .any(|option| self.store.has_attribute(path, option))
            })
            .map(|path| {
                let name = if path.parent().as_ref() == Some(&self.root) {
                    path.name().to_string()
                } else {
                    path.to_string()
                };
                let options = get_options_from_node(self.store.as_ref(), &path, &self.defaults);
                (name, options)
            })
            .collect()
    }

    /// Add components found in the document and remove those no longer in it.
    ///
    /// Returns the names of the registered components.
    pub fn find_and_create_components(&self) -> Vec<String> {
        let found = self.find_components();

        for (name, options) in &found {
            if self.components.read().contains_key(name) {
                continue;
            }
            if let Err(e) = self.add_component(name, options) {
                log::warn!("Failed to add component '{}': {}", name, e);
            }
        }

        let vanished: BTreeSet<String> = self
            .components
            .read()
            .keys()
            .filter(|name| !found.contains_key(*name))
            .cloned()
            .collect();
        for name in vanished {
            if let Err(e) = self.remove_component(&name) {
                log::warn!("Failed to remove component '{}': {}", name, e);
            }
        }

        self.component_names()
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    pub fn get_component(&self, name: &str) -> Option<Arc<Component>> {
        self.components.read().get(name).cloned()
    }

    /// Store a component's current options on its node
    pub fn write_options_to_stage(&self, name: &str) -> SystemResult<()> {
        let component = self
            .get_component(name)
            .ok_or_else(|| SystemError::NotFound(name.to_string()))?;
        set_options_on_node(self.store.as_ref(), component.path(), &component.options())?;
        Ok(())
    }

    /// Replace a component's options with those stored on its node
    pub fn read_options_from_stage(&self, name: &str) -> SystemResult<Options> {
        let component = self
            .get_component(name)
            .ok_or_else(|| SystemError::NotFound(name.to_string()))?;
        if !self.store.has_node(component.path()) {
            return Err(SystemError::NotFound(component.path().to_string()));
        }
        let options = get_options_from_node(self.store.as_ref(), component.path(), &self.defaults);
        component.set_options(options.clone());
        Ok(options)
    }

    /// Run the merge tick of every component. Main thread only.
    pub fn tick(&self) -> BTreeMap<String, TickReport> {
        let components: Vec<Arc<Component>> = self.components.read().values().cloned().collect();
        components
            .into_iter()
            .map(|component| (component.name().to_string(), component.tick()))
            .filter(|(_, report)| !report.is_empty())
            .collect()
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.cleanup();
    }
}
