//! Process-level startup and shutdown.

use super::plugin::StopFlag;
use super::registry::PluginRegistry;
use crate::config::MAX_REGISTERED_PLUGINS;
use crate::time::Epoch;

/// Starts every registered plugin and requests them to stop.
///
/// The runtime does not own execution units. Each factory receives the shared
/// bus and stop flag and is expected to spawn its plugin loop on a task or
/// thread of the host's choosing; `start_all` returns once every factory has
/// returned. Stopping is cooperative: [`shutdown`](Runtime::shutdown) raises
/// the shared flag and the host joins its tasks.
///
/// A runtime given a clock with [`with_clock`](Runtime::with_clock) restarts
/// it before launching anything, so plugins sharing that clock measure time
/// from the runtime's start.
///
/// # Example
///
/// ```ignore
/// static BUS: MessageBus<'static> = MessageBus::new();
/// static STOP: StopFlag = StopFlag::new();
///
/// let mut runtime = Runtime::new(&BUS, &STOP);
/// runtime.registry_mut().add("plugin1", |bus, stop| spawner.must_spawn(plugin1(bus, stop)));
/// runtime.start_all();
/// ```
pub struct Runtime<'r, B, F, const MAX_PLUGINS: usize = MAX_REGISTERED_PLUGINS> {
    bus: &'r B,
    stop: &'r StopFlag,
    registry: PluginRegistry<F, MAX_PLUGINS>,
    clock: Option<&'r dyn Epoch>,
    started: bool,
}

impl<'r, B, F, const MAX_PLUGINS: usize> Runtime<'r, B, F, MAX_PLUGINS>
where
    F: Fn(&'r B, &'r StopFlag),
{
    /// Create a runtime with an empty registry.
    pub fn new(bus: &'r B, stop: &'r StopFlag) -> Self {
        Self::with_registry(bus, stop, PluginRegistry::new())
    }

    /// Create a runtime over an already filled registry.
    pub fn with_registry(
        bus: &'r B,
        stop: &'r StopFlag,
        registry: PluginRegistry<F, MAX_PLUGINS>,
    ) -> Self {
        Self {
            bus,
            stop,
            registry,
            clock: None,
            started: false,
        }
    }

    /// Restart `clock` every time the runtime starts.
    pub fn with_clock(mut self, clock: &'r dyn Epoch) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Get the plugin registry.
    pub fn registry(&self) -> &PluginRegistry<F, MAX_PLUGINS> {
        &self.registry
    }

    /// Get the plugin registry mutably, to add factories before startup.
    pub fn registry_mut(&mut self) -> &mut PluginRegistry<F, MAX_PLUGINS> {
        &mut self.registry
    }

    /// Get the shared bus.
    pub fn bus(&self) -> &'r B {
        self.bus
    }

    /// Call every registered factory once, in registration order.
    ///
    /// Clears a previous stop request and restarts the clock first. Calling
    /// this again while the runtime is started does nothing. Returns the
    /// number of factories called.
    pub fn start_all(&mut self) -> usize {
        if self.started {
            warn!("runtime already started");
            return 0;
        }
        self.stop.clear();
        if let Some(clock) = self.clock {
            clock.restart();
        }

        let mut launched = 0;
        for entry in self.registry.iter() {
            info!("starting plugin '{}'", entry.name());
            (entry.factory())(self.bus, self.stop);
            launched += 1;
        }
        self.started = true;
        info!("runtime started {} plugins", launched);
        launched
    }

    /// Ask every plugin loop sharing the stop flag to exit.
    ///
    /// Loops observe the request at their next iteration; the host joins its
    /// execution units afterwards. The runtime may be started again.
    pub fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        info!("runtime shutting down");
        self.stop.request();
        self.started = false;
    }

    /// Check if [`start_all`](Self::start_all) ran since the last shutdown.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    type Launcher<'r> = fn(&'r Cell<u32>, &'r StopFlag);

    struct Restarts(Cell<u32>);

    impl Epoch for Restarts {
        fn restart(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn bump(calls: &Cell<u32>, _stop: &StopFlag) {
        calls.set(calls.get() + 1);
    }

    #[test]
    fn start_all_is_idempotent() {
        let calls = Cell::new(0);
        let stop = StopFlag::new();
        let mut runtime: Runtime<'_, _, Launcher<'_>, 4> = Runtime::new(&calls, &stop);
        runtime.registry_mut().add("plugin1", bump);
        runtime.registry_mut().add("plugin2", bump);

        assert_eq!(runtime.start_all(), 2);
        assert_eq!(runtime.start_all(), 0);
        assert_eq!(calls.get(), 2);
        assert!(runtime.is_started());
    }

    #[test]
    fn shutdown_raises_stop_and_allows_restart() {
        let calls = Cell::new(0);
        let stop = StopFlag::new();
        let mut runtime: Runtime<'_, _, Launcher<'_>, 4> = Runtime::new(&calls, &stop);
        runtime.registry_mut().add("plugin1", bump);

        runtime.start_all();
        runtime.shutdown();
        assert!(stop.is_requested());
        assert!(!runtime.is_started());

        assert_eq!(runtime.start_all(), 1);
        assert!(!stop.is_requested());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn start_restarts_the_clock_once_per_start() {
        let calls = Cell::new(0);
        let stop = StopFlag::new();
        let clock = Restarts(Cell::new(0));
        let mut runtime: Runtime<'_, _, Launcher<'_>, 4> =
            Runtime::new(&calls, &stop).with_clock(&clock);

        runtime.start_all();
        runtime.start_all();
        assert_eq!(clock.0.get(), 1);

        runtime.shutdown();
        runtime.start_all();
        assert_eq!(clock.0.get(), 2);
    }
}
