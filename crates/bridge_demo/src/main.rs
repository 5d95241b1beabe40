//! Bridge demo
//!
//! Mirrors simulated conveyor controllers into an in-memory document and
//! plays the part of a user editing it.
//!
//! Run with: cargo run -p bridge_demo -- [config.toml] [--for <seconds>]

mod device;

use bridge_core::{AttrValue, ComponentConfig, SyncConfig};
use bridge_event::{EventBus, EventId, EventKind, EventResult};
use bridge_stage::{MemoryStage, NodePath, SceneGraphStore, ATTR_CURRENT_VALUE, ATTR_WRITE_VALUE};
use bridge_system::System;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_CONFIG: &str = "bridge.toml";
const TICK_PERIOD: Duration = Duration::from_millis(16);
const EDIT_AFTER: Duration = Duration::from_secs(2);

struct Args {
    config: PathBuf,
    run_for: Option<Duration>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: PathBuf::from(DEFAULT_CONFIG),
        run_for: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--for" => {
                let secs = iter
                    .next()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or("--for expects a number of seconds")?;
                args.run_for = Some(Duration::from_secs_f64(secs));
            }
            other => args.config = PathBuf::from(other),
        }
    }
    Ok(args)
}

fn load_config(path: &PathBuf) -> SyncConfig {
    let mut config = if path.exists() {
        match SyncConfig::load(path) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("Invalid configuration {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        log::info!("{} not found, using defaults", path.display());
        SyncConfig::default()
    };

    if config.components.is_empty() {
        config.components.push(ComponentConfig {
            name: "conveyor".to_string(),
            options: Default::default(),
        });
    }
    config
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("PANIC: {}", panic_info);
    }));

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: bridge-demo [config.toml] [--for <seconds>]");
            std::process::exit(2);
        }
    };
    let config = load_config(&args.config);

    let bus = EventBus::shared();
    for component in &config.components {
        for kind in [EventKind::STATUS, EventKind::CONNECTION] {
            bus.subscribe(EventId::for_component(kind, &component.name), |message| {
                if let Some(status) = &message.status {
                    log::info!("[{}] {}", message.component(), status);
                }
                EventResult::Handled
            });
        }
    }

    let stage = Arc::new(MemoryStage::new());
    let system = match System::from_config(
        &config,
        Arc::new(device::SimulatedConveyor::parts),
        stage.clone(),
        Arc::clone(&bus),
    ) {
        Ok(system) => system,
        Err(e) => {
            log::error!("Failed to start components: {}", e);
            std::process::exit(1);
        }
    };

    // Install signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    log::info!("Running {} components, press Ctrl+C to exit", system.component_names().len());

    let started = Instant::now();
    let mut edited = false;
    while running.load(Ordering::SeqCst) {
        let frame = Instant::now();

        for (name, report) in system.tick() {
            for (key, e) in &report.failures {
                log::warn!("[{}] {}: {}", name, key, e);
            }
            if report.created > 0 {
                log::info!("[{}] created {} nodes", name, report.created);
            }
        }

        if !edited && started.elapsed() >= EDIT_AFTER {
            edited = true;
            edit_speeds(stage.as_ref(), &system);
        }

        if let Some(run_for) = args.run_for {
            if started.elapsed() >= run_for {
                break;
            }
        }

        if let Some(rest) = TICK_PERIOD.checked_sub(frame.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    report_positions(stage.as_ref(), &system);
    system.cleanup();
    log::info!("Shutdown complete");
}

/// Double every conveyor's speed through the document
fn edit_speeds(stage: &dyn SceneGraphStore, system: &System) {
    for name in system.component_names() {
        let Some(component) = system.get_component(&name) else {
            continue;
        };
        let path = speed_path(component.path());
        let current = stage
            .get_attribute(&path, ATTR_CURRENT_VALUE)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let target = if current == 0.0 { 1.0 } else { current * 2.0 };
        match stage.set_attribute(&path, ATTR_WRITE_VALUE, AttrValue::Number(target)) {
            Ok(()) => log::info!("[{}] user sets speed {} -> {}", name, current, target),
            Err(e) => log::warn!("[{}] cannot edit speed: {}", name, e),
        }
    }
}

fn report_positions(stage: &dyn SceneGraphStore, system: &System) {
    for name in system.component_names() {
        if let Some(component) = system.get_component(&name) {
            let path = component.path().child("conveyor").child("position");
            if let Some(position) = stage.get_attribute(&path, ATTR_CURRENT_VALUE) {
                log::info!("[{}] belt position {:?}", name, position);
            }
            let stats = component.runtime().stats();
            log::info!(
                "[{}] {} reads ({} failed), {} writes forwarded",
                name,
                stats.read_iterations,
                stats.read_failures,
                component.engine().feedback().forwarded()
            );
        }
    }
}

fn speed_path(component: &NodePath) -> NodePath {
    component.child("conveyor").child("speed")
}
