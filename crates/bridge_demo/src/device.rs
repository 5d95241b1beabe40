//! Simulated conveyor controller

use bridge_core::{AttrValue, Value};
use bridge_event::{EventBus, EventKind};
use bridge_runtime::{EventPublisher, LoopStatus, QueuedBridge, RuntimeHooks};
use bridge_stage::Options;
use bridge_system::{ComponentParts, SystemResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
struct State {
    speed: f64,
    position: f64,
    last_read: Instant,
}

/// A conveyor whose belt position advances at `speed` units per second.
///
/// Exposes `conveyor.speed`, `conveyor.position` and a `cube` node whose
/// transform follows the belt.
pub struct SimulatedConveyor {
    publisher: EventPublisher,
    bridge: Arc<QueuedBridge>,
    state: Mutex<State>,
}

impl SimulatedConveyor {
    pub fn new(name: &str, options: &Options, bus: &Arc<EventBus>, bridge: Arc<QueuedBridge>) -> Self {
        let speed = options.get("speed").and_then(AttrValue::as_f64).unwrap_or(1.0);
        Self {
            publisher: EventPublisher::new(name, Arc::clone(bus)),
            bridge,
            state: Mutex::new(State {
                speed,
                position: 0.0,
                last_read: Instant::now(),
            }),
        }
    }

    /// Build the component parts for the system
    pub fn parts(name: &str, options: &Options, bus: &Arc<EventBus>) -> SystemResult<ComponentParts> {
        let bridge = Arc::new(QueuedBridge::new(name, Arc::clone(bus)));
        let device = Arc::new(Self::new(name, options, bus, Arc::clone(&bridge)));

        let target = Arc::clone(&device);
        let on_options = Arc::new(move |options: &Options| {
            if let Some(speed) = options.get("speed").and_then(AttrValue::as_f64) {
                target.state.lock().speed = speed;
            }
        });
        Ok(ComponentParts::new(device, bridge).with_options_callback(on_options))
    }

    fn apply_write(&self, symbol: &str, value: &AttrValue) {
        match (symbol, value.as_f64()) {
            ("conveyor.speed", Some(speed)) => {
                self.state.lock().speed = speed;
                self.publisher.push_status(format!("speed set to {}", speed));
            }
            ("conveyor.position", Some(position)) => {
                self.state.lock().position = position;
                self.publisher.push_status(format!("position reset to {}", position));
            }
            _ => log::warn!("'{}' ignores write {} = {:?}", self.publisher.name(), symbol, value),
        }
    }
}

impl RuntimeHooks for SimulatedConveyor {
    fn on_read_starting(&self) {
        self.state.lock().last_read = Instant::now();
        self.publisher
            .push(EventKind::CONNECTION, None, Some("connected".to_string()));
    }

    fn on_read(&self) -> LoopStatus {
        let (speed, position) = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let dt = now.duration_since(state.last_read).as_secs_f64();
            state.last_read = now;
            state.position += state.speed * dt;
            (state.speed, state.position)
        };

        let data = Value::object()
            .with(
                "conveyor",
                Value::object()
                    .with("speed", speed)
                    .with("position", position)
                    .with("running", speed != 0.0),
            )
            .with(
                "cube",
                Value::object()
                    .with("usd:type", "Cube")
                    .with("usd:attr:xformOp:transform", translation(position % 10.0, 0.0, 0.0)),
            );
        self.publisher.push_data(data);
        Ok(())
    }

    fn on_read_ending(&self) {
        self.publisher
            .push(EventKind::CONNECTION, None, Some("disconnected".to_string()));
    }

    fn on_write(&self) -> LoopStatus {
        for write in self.bridge.drain_writes() {
            self.apply_write(&write.symbol, &write.value);
        }
        Ok(())
    }

    fn on_cleanup(&self) {
        log::debug!("'{}' final position {:.2}", self.publisher.name(), self.state.lock().position);
    }
}

/// Row-major 4x4 translation matrix, translation in the last row
fn translation(x: f64, y: f64, z: f64) -> Value {
    let rows = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [x, y, z, 1.0],
    ];
    Value::Array(
        rows.iter()
            .map(|row| Value::Array(row.iter().map(|v| Value::from(*v)).collect()))
            .collect(),
    )
}
