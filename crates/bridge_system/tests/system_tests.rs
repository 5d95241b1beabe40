//! Integration tests for bridge_system

use bridge_core::{AttrValue, RuntimeConfig, Value};
use bridge_event::EventBus;
use bridge_runtime::{EventPublisher, LoopStatus, QueuedBridge, RuntimeHooks, WriteRequest};
use bridge_stage::{MemoryStage, NodePath, Options, SceneGraphStore, ATTR_CURRENT_VALUE, ATTR_WRITE_VALUE};
use bridge_system::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counts up on every read and records every write it receives
struct FakeDevice {
    publisher: EventPublisher,
    bridge: Arc<QueuedBridge>,
    counter: AtomicU64,
    written: Mutex<Vec<WriteRequest>>,
    options: Mutex<Options>,
}

impl RuntimeHooks for FakeDevice {
    fn on_read(&self) -> LoopStatus {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.publisher.push_data(Value::object().with("counter", n as f64));
        Ok(())
    }

    fn on_write(&self) -> LoopStatus {
        self.written.lock().extend(self.bridge.drain_writes());
        Ok(())
    }
}

type Devices = Arc<Mutex<Vec<Arc<FakeDevice>>>>;

fn build_device(devices: &Devices, name: &str, options: &Options, bus: &Arc<EventBus>) -> SystemResult<ComponentParts> {
    let bridge = Arc::new(QueuedBridge::new(name, Arc::clone(bus)));
    let device = Arc::new(FakeDevice {
        publisher: EventPublisher::new(name, Arc::clone(bus)),
        bridge: Arc::clone(&bridge),
        counter: AtomicU64::new(0),
        written: Mutex::new(Vec::new()),
        options: Mutex::new(options.clone()),
    });
    devices.lock().push(Arc::clone(&device));

    let sink = Arc::clone(&device);
    Ok(ComponentParts::new(device, bridge)
        .with_options_callback(Arc::new(move |options: &Options| *sink.options.lock() = options.clone())))
}

fn factory(devices: Devices) -> Arc<dyn ComponentFactory> {
    Arc::new(move |name: &str, options: &Options, bus: &Arc<EventBus>| build_device(&devices, name, options, bus))
}

fn defaults() -> Options {
    let mut defaults = Options::new();
    defaults.insert("host".into(), "127.0.0.1".into());
    defaults.insert("port".into(), AttrValue::Int(851));
    defaults
}

fn system() -> (System, Arc<MemoryStage>, Devices) {
    let devices: Devices = Arc::new(Mutex::new(Vec::new()));
    let stage = Arc::new(MemoryStage::new());
    let config = RuntimeConfig::default().with_read_period(Duration::from_millis(5));
    let system = System::new(
        "/World/Bridges/",
        defaults(),
        factory(Arc::clone(&devices)),
        stage.clone(),
        EventBus::shared(),
        config,
    )
    .unwrap();
    (system, stage, devices)
}

fn node(path: &str) -> NodePath {
    NodePath::new(path).unwrap()
}

/// Tick until `done` holds or the deadline passes
fn tick_until(system: &System, done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        system.tick();
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_add_component_stores_merged_options() {
    let (system, stage, devices) = system();
    let mut options = Options::new();
    options.insert("port".into(), AttrValue::Int(852));

    let component = system.add_component("plc", &options).unwrap();
    assert_eq!(component.path(), &node("/World/Bridges/plc"));
    assert_eq!(stage.get_attribute(component.path(), "port"), Some(AttrValue::Int(852)));
    assert_eq!(
        stage.get_attribute(component.path(), "host"),
        Some(AttrValue::String("127.0.0.1".into()))
    );
    assert_eq!(devices.lock()[0].options.lock()["port"], AttrValue::Int(852));
    assert_eq!(system.component_names(), vec!["plc".to_string()]);

    assert!(matches!(
        system.add_component("plc", &Options::new()),
        Err(SystemError::AlreadyExists(_))
    ));
    system.cleanup();
}

#[test]
fn test_reads_reach_the_document() {
    let (system, stage, _devices) = system();
    system.add_component("plc", &Options::new()).unwrap();

    let path = node("/World/Bridges/plc/counter");
    let reached = tick_until(&system, || {
        matches!(stage.get_attribute(&path, ATTR_CURRENT_VALUE), Some(AttrValue::Number(n)) if n >= 3.0)
    });
    assert!(reached);
    system.cleanup();
}

#[test]
fn test_edits_reach_the_device() {
    let (system, stage, devices) = system();
    system.add_component("plc", &Options::new()).unwrap();

    let path = node("/World/Bridges/plc/counter");
    assert!(tick_until(&system, || stage.has_attribute(&path, ATTR_CURRENT_VALUE)));

    stage.set_attribute(&path, ATTR_WRITE_VALUE, AttrValue::Number(-1.0)).unwrap();
    let device = Arc::clone(&devices.lock()[0]);
    let delivered = tick_until(&system, || {
        device
            .written
            .lock()
            .iter()
            .any(|w| w.symbol == "counter" && w.value == AttrValue::Number(-1.0))
    });
    assert!(delivered);
    system.cleanup();
}

#[test]
fn test_absolute_component_names() {
    let (system, stage, _devices) = system();
    let component = system.add_component("/Elsewhere/plc", &Options::new()).unwrap();
    assert_eq!(component.path(), &node("/Elsewhere/plc"));
    assert!(stage.has_node(&node("/Elsewhere/plc")));

    let found = system.find_components();
    assert!(found.contains_key("/Elsewhere/plc"));
    system.cleanup();
}

#[test]
fn test_invalid_names_are_rejected() {
    let (system, _stage, _devices) = system();
    assert!(matches!(system.add_component("", &Options::new()), Err(SystemError::InvalidName(_))));
    assert!(matches!(system.add_component("a//b", &Options::new()), Err(SystemError::InvalidName(_))));
    assert!(system.component_names().is_empty());
}

#[test]
fn test_find_and_create_components_follows_the_document() {
    let (system, stage, _devices) = system();
    let defaults = defaults();
    bridge_stage::set_options_on_node(stage.as_ref(), &node("/World/Bridges/a"), &defaults).unwrap();
    bridge_stage::set_options_on_node(stage.as_ref(), &node("/World/Bridges/b"), &defaults).unwrap();

    assert_eq!(system.find_and_create_components(), vec!["a".to_string(), "b".to_string()]);

    // A document without component nodes removes them all
    stage.open_new();
    assert!(system.find_and_create_components().is_empty());
    assert!(system.get_component("a").is_none());
}

#[test]
fn test_remove_component_stops_its_runtime() {
    let (system, _stage, devices) = system();
    system.add_component("plc", &Options::new()).unwrap();
    let component = system.get_component("plc").unwrap();

    system.remove_component("plc").unwrap();
    assert_eq!(component.runtime().state(), bridge_runtime::RuntimeState::Stopped);

    let device = Arc::clone(&devices.lock()[0]);
    let reads = device.counter.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(device.counter.load(Ordering::SeqCst), reads);

    assert!(matches!(system.remove_component("plc"), Err(SystemError::NotFound(_))));
}

#[test]
fn test_options_round_trip_through_stage() {
    let (system, stage, devices) = system();
    let component = system.add_component("plc", &Options::new()).unwrap();

    stage.set_attribute(component.path(), "port", AttrValue::Int(900)).unwrap();
    let options = system.read_options_from_stage("plc").unwrap();
    assert_eq!(options["port"], AttrValue::Int(900));
    assert_eq!(component.options()["port"], AttrValue::Int(900));
    assert_eq!(devices.lock()[0].options.lock()["port"], AttrValue::Int(900));

    let mut changed = component.options();
    changed.insert("host".into(), "10.0.0.2".into());
    component.set_options(changed);
    system.write_options_to_stage("plc").unwrap();
    assert_eq!(
        stage.get_attribute(component.path(), "host"),
        Some(AttrValue::String("10.0.0.2".into()))
    );

    assert!(matches!(system.read_options_from_stage("nope"), Err(SystemError::NotFound(_))));
    system.cleanup();
}

#[test]
fn test_from_config_adds_declared_components() {
    let config = bridge_core::SyncConfig::from_str(
        r#"
        [runtime]
        read_period_ms = 5

        [system]
        root = "/World/Bridges/"

        [system.defaults]
        port = 851

        [[components]]
        name = "line_a"

        [[components]]
        name = "line_b"
        options = { port = 852 }
        "#,
    )
    .unwrap();

    let devices: Devices = Arc::new(Mutex::new(Vec::new()));
    let stage = Arc::new(MemoryStage::new());
    let system = System::from_config(&config, factory(devices), stage.clone(), EventBus::shared()).unwrap();

    assert_eq!(system.component_names(), vec!["line_a".to_string(), "line_b".to_string()]);
    assert_eq!(
        stage.get_attribute(&node("/World/Bridges/line_b"), "port"),
        Some(AttrValue::Int(852))
    );
}
