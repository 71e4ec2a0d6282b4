//! Plugin service loop.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_time::Duration;

use super::traits::{Component, Flow};
use crate::bus::Broker;
use crate::config::{DEFAULT_SERVICE_CADENCE, MAX_PERIODIC_JOBS};
use crate::error::Error;
use crate::node::Node;
use crate::time::TimeSource;

/// Cooperative stop request shared between a controller and one or more
/// plugin loops.
///
/// A loop checks the flag once at the top of every iteration. In-flight
/// publishes and handler calls always complete.
#[derive(Debug, Default)]
pub struct StopFlag {
    requested: AtomicBool,
}

impl StopFlag {
    /// Create a flag with no stop requested.
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
        }
    }

    /// Ask every loop observing this flag to stop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Check if a stop was requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Withdraw a stop request so the flag can be reused.
    pub fn clear(&self) {
        self.requested.store(false, Ordering::Release);
    }
}

/// One component bound to one node and one execution unit.
///
/// The plugin does not create the execution unit: the host spawns a task or
/// thread and calls [`run`](Plugin::run) inside it.
///
/// A loop stops when its own stop flag or the runtime-wide shutdown flag is
/// raised. By default the own flag lives inside the plugin, so
/// [`stop`](Plugin::stop) affects this plugin only; use
/// [`with_stop_flag`](Plugin::with_stop_flag) to make it reachable from
/// another task while the loop runs.
///
/// # Example
///
/// ```ignore
/// static IMU_STOP: StopFlag = StopFlag::new();
///
/// #[embassy_executor::task]
/// async fn imu_task(mut plugin: Plugin<'static, MessageBus<'static>>) {
///     plugin.run(EmbassyTime, ImuReader::new()).await;
/// }
///
/// let plugin = Plugin::new(&BUS, "imu", &SHUTDOWN)?.with_stop_flag(&IMU_STOP);
/// spawner.must_spawn(imu_task(plugin));
/// // later, from any task:
/// IMU_STOP.request();
/// ```
pub struct Plugin<'b, B, const MAX_JOBS: usize = MAX_PERIODIC_JOBS> {
    node: Node<'b, B, MAX_JOBS>,
    cadence: Duration,
    local_stop: StopFlag,
    own_stop: Option<&'b StopFlag>,
    shutdown: &'b StopFlag,
    iterations: u64,
    skips: u64,
}

impl<'b, B: Broker, const MAX_JOBS: usize> Plugin<'b, B, MAX_JOBS> {
    /// Register `name` on `bus` and wrap the resulting node.
    ///
    /// `shutdown` is the flag shared by every plugin of the runtime.
    pub fn new(bus: &'b B, name: &str, shutdown: &'b StopFlag) -> Result<Self, Error> {
        Ok(Self::from_node(Node::initialize(bus, name)?, shutdown))
    }

    /// Wrap an already initialized node.
    pub fn from_node(node: Node<'b, B, MAX_JOBS>, shutdown: &'b StopFlag) -> Self {
        Self {
            node,
            cadence: DEFAULT_SERVICE_CADENCE,
            local_stop: StopFlag::new(),
            own_stop: None,
            shutdown,
            iterations: 0,
            skips: 0,
        }
    }

    /// Use `stop` as this plugin's own stop flag instead of the built-in one.
    pub fn with_stop_flag(mut self, stop: &'b StopFlag) -> Self {
        self.own_stop = Some(stop);
        self
    }

    /// Set the sleep between two loop iterations.
    ///
    /// A zero cadence yields to the executor instead of sleeping.
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Get the sleep between two loop iterations.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Get the plugin's node.
    pub fn node(&self) -> &Node<'b, B, MAX_JOBS> {
        &self.node
    }

    /// Get the plugin's node mutably, e.g. to register periodic jobs.
    pub fn node_mut(&mut self) -> &mut Node<'b, B, MAX_JOBS> {
        &mut self.node
    }

    /// Get this plugin's own stop flag.
    pub fn stop_flag(&self) -> &StopFlag {
        self.own_stop.unwrap_or(&self.local_stop)
    }

    /// Request this plugin's loop to stop at its next iteration.
    ///
    /// Other plugins, including those sharing the shutdown flag, keep
    /// running.
    pub fn stop(&self) {
        self.stop_flag().request();
    }

    /// Check if this plugin was asked to stop, on its own or by shutdown.
    pub fn is_stopped(&self) -> bool {
        self.stop_flag().is_requested() || self.shutdown.is_requested()
    }

    /// Get the number of completed iterations over every `run`.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Get the number of iterations skipped since the last completed one.
    pub fn skips(&self) -> u64 {
        self.skips
    }

    /// Run the service loop until a stop is requested or `component` returns
    /// [`Flow::Stop`].
    ///
    /// The node's clock is synced to `time.now()` first, so periodic jobs
    /// registered before the loop are first due one interval after it
    /// starts. Each iteration then fires the node's due jobs, ticks the
    /// component, and waits according to the returned [`Flow`]. Returns the
    /// number of iterations completed by this call.
    pub async fn run<T, C>(&mut self, time: T, mut component: C) -> u64
    where
        T: TimeSource,
        C: Component<Node<'b, B, MAX_JOBS>>,
    {
        info!("plugin '{}' started", self.node.name());
        self.node.sync_clock(time.now());
        component.on_start(&mut self.node);

        let mut completed = 0u64;
        while !self.is_stopped() {
            self.node.service_tick(time.now());
            match component.on_tick(&mut self.node) {
                Flow::Continue => {
                    completed += 1;
                    self.iterations += 1;
                    self.skips = 0;
                }
                Flow::Skip => {
                    self.skips += 1;
                    continue;
                }
                Flow::Yield => {
                    self.skips += 1;
                    embassy_futures::yield_now().await;
                    continue;
                }
                Flow::Stop => {
                    completed += 1;
                    self.iterations += 1;
                    self.skips = 0;
                    debug!("plugin '{}' asked to stop", self.node.name());
                    break;
                }
            }

            if self.cadence == Duration::from_ticks(0) {
                embassy_futures::yield_now().await;
            } else {
                time.sleep(self.cadence).await;
            }
        }

        component.on_stop(&mut self.node);
        info!(
            "plugin '{}' stopped after {} iterations",
            self.node.name(),
            completed
        );
        completed
    }
}
