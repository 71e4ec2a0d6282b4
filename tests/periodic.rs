use std::cell::Cell;
use std::sync::Mutex;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Duration, Instant};
use futures::executor::block_on;
use myrtio_bus::{
    Broker, Component, DriftPolicy, Epoch, Flow, Handler, MessageBus, Node, NoopComponent, Plugin,
    RelativeClock, StopFlag, TimeSource,
};

type TestBus<'c> = MessageBus<'c, NoopRawMutex>;

struct Recorder(Mutex<Vec<u32>>);

impl Recorder {
    fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn values(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}

impl Handler<u32> for Recorder {
    fn on_message(&self, msg: &u32) {
        self.0.lock().unwrap().push(*msg);
    }
}

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

/// Simulated clock: `sleep` advances time instantly and raises the stop flag
/// once the clock passes `until`.
struct SimulatedTime<'s> {
    now_ms: Cell<u64>,
    until_ms: u64,
    stop: &'s StopFlag,
}

impl<'s> SimulatedTime<'s> {
    fn new(until_ms: u64, stop: &'s StopFlag) -> Self {
        Self::starting_at(0, until_ms, stop)
    }

    fn starting_at(start_ms: u64, until_ms: u64, stop: &'s StopFlag) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
            until_ms,
            stop,
        }
    }
}

impl TimeSource for SimulatedTime<'_> {
    fn now(&self) -> Instant {
        at(self.now_ms.get())
    }

    async fn sleep(&self, duration: Duration) {
        let now = self.now_ms.get() + duration.as_millis();
        self.now_ms.set(now);
        if now > self.until_ms {
            self.stop.request();
        }
    }
}

#[test]
fn job_fires_once_per_reached_deadline() {
    let recorder = Recorder::new();
    let bus = TestBus::new();
    let mut counter = 0u32;
    let mut source = || {
        counter += 1;
        counter
    };
    let mut node: Node<_> = Node::initialize(&bus, "a").unwrap();
    node.subscribe::<u32, _>("a", &recorder).unwrap();

    let job = node
        .publish_periodic("a", Duration::from_millis(10), &mut source)
        .unwrap();

    assert_eq!(node.service_tick(at(5)), 0);
    assert_eq!(node.service_tick(at(11)), 1);
    assert_eq!(node.next_fire(job), Some(at(21)));
    assert_eq!(node.service_tick(at(12)), 0);
    assert_eq!(recorder.values(), [1]);
}

#[test]
fn accumulate_policy_keeps_the_initial_grid() {
    let bus = TestBus::new();
    let mut source = || 0u32;
    let mut node: Node<_> = Node::initialize(&bus, "a").unwrap();
    node.set_drift_policy(DriftPolicy::Accumulate);
    let job = node
        .publish_periodic("b", Duration::from_millis(10), &mut source)
        .unwrap();

    assert_eq!(node.service_tick(at(11)), 1);
    assert_eq!(node.next_fire(job), Some(at(20)));
    assert_eq!(node.service_tick(at(12)), 0);
    assert_eq!(node.service_tick(at(20)), 1);
    assert_eq!(node.next_fire(job), Some(at(30)));
}

#[test]
fn job_registered_at_an_instant_is_due_one_interval_later() {
    let bus = TestBus::new();
    let mut source = || 7u32;
    let mut node: Node<_> = Node::initialize(&bus, "a").unwrap();
    let job = node
        .publish_periodic_at("b", Duration::from_millis(250), at(4_000), &mut source)
        .unwrap();

    assert_eq!(node.next_fire(job), Some(at(4_250)));
    assert_eq!(node.service_tick(at(4_100)), 0);
    assert_eq!(node.service_tick(at(4_250)), 1);
    assert_eq!(node.next_fire(job), Some(at(4_500)));
}

#[test]
fn counter_reaches_receiver_every_interval() {
    let recorder = Recorder::new();
    let bus = TestBus::new();
    let mut counter = 0u32;
    let mut source = || {
        let value = counter;
        counter += 1;
        value
    };

    let mut a: Node<_> = Node::initialize(&bus, "A").unwrap();
    let b: Node<_> = Node::initialize(&bus, "B").unwrap();
    b.subscribe::<u32, _>("A", &recorder).unwrap();
    a.publish_periodic("B", Duration::from_millis(500), &mut source)
        .unwrap();

    for ms in (0..=2500).step_by(10) {
        a.service_tick(at(ms));
    }

    assert_eq!(recorder.values(), [0, 1, 2, 3, 4]);
}

#[test]
fn plugin_loop_drives_periodic_jobs() {
    let recorder = Recorder::new();
    let stop = StopFlag::new();
    let bus = TestBus::new();
    let mut counter = 0u32;
    let mut source = || {
        let value = counter;
        counter += 1;
        value
    };

    let b: Node<_> = Node::initialize(&bus, "B").unwrap();
    b.subscribe::<u32, _>("A", &recorder).unwrap();

    let mut plugin: Plugin<_> = Plugin::new(&bus, "A", &stop).unwrap();
    plugin
        .node_mut()
        .publish_periodic("B", Duration::from_millis(500), &mut source)
        .unwrap();

    let time = SimulatedTime::new(2500, &stop);
    let iterations = block_on(plugin.run(&time, NoopComponent));

    // One iteration per 10 ms cadence step, from 0 to 2500 inclusive.
    assert_eq!(iterations, 251);
    assert_eq!(recorder.values(), [0, 1, 2, 3, 4]);
    assert!(plugin.is_stopped());
}

/// Publishes its tick count and asks to stop after `limit` ticks.
struct Ticker {
    ticks: u32,
    limit: u32,
    started: bool,
    stopped: bool,
}

impl<'b, B: Broker> Component<Node<'b, B>> for Ticker {
    fn on_start(&mut self, _node: &mut Node<'b, B>) {
        self.started = true;
    }

    fn on_tick(&mut self, node: &mut Node<'b, B>) -> Flow {
        self.ticks += 1;
        node.publish("monitor", self.ticks);
        if self.ticks >= self.limit {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn on_stop(&mut self, _node: &mut Node<'b, B>) {
        self.stopped = true;
    }
}

#[test]
fn component_may_end_its_own_loop() {
    let recorder = Recorder::new();
    let stop = StopFlag::new();
    let bus = TestBus::new();
    bus.subscribe::<u32, _>("ticker", "monitor", &recorder).unwrap();

    let mut ticker = Ticker {
        ticks: 0,
        limit: 3,
        started: false,
        stopped: false,
    };
    let mut plugin: Plugin<_> = Plugin::new(&bus, "ticker", &stop)
        .unwrap()
        .with_cadence(Duration::from_ticks(0));
    let time = SimulatedTime::new(u64::MAX, &stop);

    assert_eq!(block_on(plugin.run(&time, &mut ticker)), 3);
    assert!(ticker.started && ticker.stopped);
    assert_eq!(recorder.values(), [1, 2, 3]);
    // A component stop does not raise the shared flag.
    assert!(!stop.is_requested());
}

#[test]
fn raised_stop_flag_skips_the_loop() {
    let stop = StopFlag::new();
    let bus = TestBus::new();
    let mut plugin: Plugin<_> = Plugin::new(&bus, "idle", &stop).unwrap();
    plugin.stop();

    let time = SimulatedTime::new(u64::MAX, &stop);
    assert_eq!(block_on(plugin.run(&time, NoopComponent)), 0);
}

#[test]
fn jobs_registered_before_a_late_start_wait_one_interval() {
    let recorder = Recorder::new();
    let stop = StopFlag::new();
    let bus = TestBus::new();
    let mut source = || 1u32;

    let b: Node<_> = Node::initialize(&bus, "B").unwrap();
    b.subscribe::<u32, _>("A", &recorder).unwrap();

    let mut plugin: Plugin<_> = Plugin::new(&bus, "A", &stop).unwrap();
    plugin
        .node_mut()
        .publish_periodic("B", Duration::from_millis(500), &mut source)
        .unwrap();

    let time = SimulatedTime::starting_at(10_000, 10_100, &stop);
    assert_eq!(block_on(plugin.run(&time, NoopComponent)), 11);
    assert!(recorder.values().is_empty());
}

#[test]
fn late_start_does_not_burst_under_either_policy() {
    for policy in [DriftPolicy::Rebase, DriftPolicy::Accumulate] {
        let recorder = Recorder::new();
        let stop = StopFlag::new();
        let bus = TestBus::new();
        let mut counter = 0u32;
        let mut source = || {
            let value = counter;
            counter += 1;
            value
        };

        let b: Node<_> = Node::initialize(&bus, "B").unwrap();
        b.subscribe::<u32, _>("A", &recorder).unwrap();

        let mut plugin: Plugin<_> = Plugin::new(&bus, "A", &stop).unwrap();
        plugin.node_mut().set_drift_policy(policy);
        let job = plugin
            .node_mut()
            .publish_periodic("B", Duration::from_millis(500), &mut source)
            .unwrap();

        let time = SimulatedTime::starting_at(10_000, 11_000, &stop);
        assert_eq!(block_on(plugin.run(&time, NoopComponent)), 101);
        assert_eq!(recorder.values(), [0, 1], "{policy:?}");
        assert_eq!(plugin.node().next_fire(job), Some(at(11_500)));
    }
}

#[test]
fn relative_clock_drives_the_loop_from_its_restart() {
    let recorder = Recorder::new();
    let stop = StopFlag::new();
    let bus = TestBus::new();
    let mut source = || 9u32;

    let b: Node<_> = Node::initialize(&bus, "B").unwrap();
    b.subscribe::<u32, _>("A", &recorder).unwrap();

    let mut plugin: Plugin<_> = Plugin::new(&bus, "A", &stop).unwrap();
    plugin
        .node_mut()
        .publish_periodic("B", Duration::from_millis(500), &mut source)
        .unwrap();

    let clock = RelativeClock::new(SimulatedTime::starting_at(10_000, 11_000, &stop));
    clock.restart();
    assert_eq!(block_on(plugin.run(&clock, NoopComponent)), 101);
    assert_eq!(recorder.values(), [9, 9]);
    assert_eq!(clock.now(), at(1_010));
}

#[test]
fn stopping_one_plugin_leaves_the_other_running() {
    let recorder = Recorder::new();
    let shutdown = StopFlag::new();
    let first_stop = StopFlag::new();
    let second_stop = StopFlag::new();
    let bus = TestBus::new();
    let mut counter = 0u32;
    let mut source = || {
        let value = counter;
        counter += 1;
        value
    };

    let observer: Node<_> = Node::initialize(&bus, "observer").unwrap();
    observer.subscribe::<u32, _>("second", &recorder).unwrap();

    let mut first: Plugin<_> = Plugin::new(&bus, "first", &shutdown)
        .unwrap()
        .with_stop_flag(&first_stop);
    let mut second: Plugin<_> = Plugin::new(&bus, "second", &shutdown)
        .unwrap()
        .with_stop_flag(&second_stop);
    second
        .node_mut()
        .publish_periodic("observer", Duration::from_millis(100), &mut source)
        .unwrap();

    let first_time = SimulatedTime::new(50, &first_stop);
    assert_eq!(block_on(first.run(&first_time, NoopComponent)), 6);
    assert!(first.is_stopped());
    assert!(!second.is_stopped());
    assert!(!shutdown.is_requested());

    let second_time = SimulatedTime::new(300, &second_stop);
    assert_eq!(block_on(second.run(&second_time, NoopComponent)), 31);
    assert_eq!(recorder.values(), [0, 1, 2]);
}

/// Plays back a fixed sequence of flows, then raises `stop`.
struct Scripted<'s> {
    script: &'static [Flow],
    ticks: usize,
    stop: &'s StopFlag,
}

impl<'b, B: Broker> Component<Node<'b, B>> for Scripted<'_> {
    fn on_tick(&mut self, _node: &mut Node<'b, B>) -> Flow {
        let flow = self.script[self.ticks];
        self.ticks += 1;
        if self.ticks == self.script.len() {
            self.stop.request();
        }
        flow
    }
}

#[test]
fn skipped_iterations_neither_count_nor_sleep() {
    let shutdown = StopFlag::new();
    let own = StopFlag::new();
    let bus = TestBus::new();
    let mut plugin: Plugin<_> = Plugin::new(&bus, "worker", &shutdown)
        .unwrap()
        .with_stop_flag(&own);
    let mut component = Scripted {
        script: &[
            Flow::Continue,
            Flow::Skip,
            Flow::Yield,
            Flow::Continue,
            Flow::Skip,
            Flow::Yield,
        ],
        ticks: 0,
        stop: &own,
    };
    let time = SimulatedTime::new(u64::MAX, &shutdown);

    assert_eq!(block_on(plugin.run(&time, &mut component)), 2);
    assert_eq!(component.ticks, 6);
    assert_eq!(plugin.iterations(), 2);
    assert_eq!(plugin.skips(), 2);
    // Only the two completed iterations slept.
    assert_eq!(time.now(), at(20));
}
