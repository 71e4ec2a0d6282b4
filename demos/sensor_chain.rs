//! Demo: a three-plugin sensor chain on a host.
//!
//! - `plugin1` publishes a `SensorMsg` carrying an incrementing counter to
//!   `plugin2` every 500 ms.
//! - `plugin2` collects readings and, once it has six, publishes a
//!   `SummaryMsg` to `p3` from inside its handler.
//! - `p3` prints every summary it receives.
//!
//! Each plugin loop runs on its own `std` thread, driven by
//! `futures::executor::block_on` and the Embassy `std` time driver.
//!
//! ```text
//! cargo run --example sensor_chain
//! ```

use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use embassy_time::Duration;
use futures::executor::block_on;
use heapless::Vec;
use myrtio_bus::{
    EmbassyTime, Handler, MessageBus, NoopComponent, Plugin, PluginRegistry, Runtime,
    StopFlag,
};

type Bus = MessageBus<'static>;
type Launcher = fn(&'static Bus, &'static StopFlag);

const BATCH: usize = 6;
const SUMMARY_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
struct SensorMsg {
    timestamp: u32,
}

#[derive(Debug, Clone, Copy)]
struct SummaryMsg {
    timestamps: [u32; SUMMARY_CAPACITY],
    count: usize,
}

static BUS: Bus = MessageBus::new();
static STOP: StopFlag = StopFlag::new();
static THREADS: Mutex<std::vec::Vec<JoinHandle<u64>>> = Mutex::new(std::vec::Vec::new());

/// Collects readings for `plugin2` and forwards a summary per batch.
struct Collector {
    pending: Mutex<Vec<u32, SUMMARY_CAPACITY>>,
}

impl Handler<SensorMsg> for Collector {
    fn on_message(&self, msg: &SensorMsg) {
        let summary = {
            let mut pending = self.pending.lock().unwrap();
            // Capacity is above the batch size.
            let _ = pending.push(msg.timestamp);
            if pending.len() < BATCH {
                return;
            }
            let mut timestamps = [0; SUMMARY_CAPACITY];
            timestamps[..pending.len()].copy_from_slice(&pending[..]);
            let summary = SummaryMsg {
                timestamps,
                count: pending.len(),
            };
            pending.clear();
            summary
        };
        BUS.publish("plugin2", "p3", summary);
    }
}

struct Printer;

impl Handler<SummaryMsg> for Printer {
    fn on_message(&self, msg: &SummaryMsg) {
        println!(
            "p3: summary of {} readings: {:?}",
            msg.count,
            &msg.timestamps[..msg.count]
        );
    }
}

static COLLECTOR: Collector = Collector {
    pending: Mutex::new(Vec::new()),
};
static PRINTER: Printer = Printer;

/// Runs an already configured plugin on its own thread.
fn spawn_loop(name: &'static str, mut plugin: Plugin<'static, Bus>) {
    let handle = thread::Builder::new()
        .name(name.into())
        .spawn(move || block_on(plugin.run(EmbassyTime, NoopComponent)))
        .unwrap();
    THREADS.lock().unwrap().push(handle);
}

fn plugin1(bus: &'static Bus, stop: &'static StopFlag) {
    let mut counter = 0u32;
    let source: &'static mut _ = Box::leak(Box::new(move || {
        let msg = SensorMsg { timestamp: counter };
        counter += 1;
        msg
    }));

    let mut plugin = Plugin::new(bus, "plugin1", stop).unwrap();
    plugin
        .node_mut()
        .publish_periodic("plugin2", Duration::from_millis(500), source)
        .unwrap();
    spawn_loop("plugin1", plugin);
}

// Subscriptions are in place before `start_all` moves on to the next
// factory, so no early message finds an empty channel.
fn plugin2(bus: &'static Bus, stop: &'static StopFlag) {
    let plugin = Plugin::new(bus, "plugin2", stop).unwrap();
    plugin
        .node()
        .subscribe::<SensorMsg, _>("plugin1", &COLLECTOR)
        .unwrap();
    spawn_loop("plugin2", plugin);
}

fn p3(bus: &'static Bus, stop: &'static StopFlag) {
    let plugin = Plugin::new(bus, "p3", stop).unwrap();
    plugin
        .node()
        .subscribe::<SummaryMsg, _>("plugin2", &PRINTER)
        .unwrap();
    spawn_loop("p3", plugin);
}

fn main() {
    let mut registry = PluginRegistry::<Launcher>::new();
    registry.add("plugin1", plugin1);
    registry.add("plugin2", plugin2);
    registry.add("p3", p3);

    let mut runtime = Runtime::with_registry(&BUS, &STOP, registry);
    runtime.start_all();

    // Two batches of six readings at 500 ms each.
    thread::sleep(std::time::Duration::from_millis(6_300));
    runtime.shutdown();

    for handle in THREADS.lock().unwrap().drain(..) {
        let iterations = handle.join().unwrap();
        println!("loop finished after {iterations} iterations");
    }
}
