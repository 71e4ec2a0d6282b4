//! # Host Time Abstraction
//!
//! The service loop needs two things from the host: a monotonic clock to
//! drive periodic jobs, and a way to suspend the current execution unit.
//! The `TimeSource` trait abstracts both so the loop runs unchanged on an
//! Embassy executor or under a simulated clock in tests.
//!
//! With the Rust 2024 Edition, this trait uses native `async fn`, removing the
//! need for the `#[async_trait]` macro.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant, Timer};

/// A monotonic clock plus a sleep primitive.
#[allow(async_fn_in_trait)]
pub trait TimeSource {
    /// Read the current instant.
    fn now(&self) -> Instant;

    /// Suspend the calling execution unit for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// `TimeSource` backed by the Embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTime;

impl TimeSource for EmbassyTime {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        Timer::after(duration).await;
    }
}

impl<T: TimeSource> TimeSource for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}

/// Something that can be restarted when the runtime starts.
///
/// [`Runtime`](crate::Runtime) restarts its clock, if it has one, at the top
/// of [`start_all`](crate::Runtime::start_all).
pub trait Epoch {
    /// Make the current instant the new time zero.
    fn restart(&self);
}

/// A `TimeSource` that reports time elapsed since it was last restarted.
///
/// Share one instance between every plugin of a process to give them a
/// common time base that starts with the runtime. Before the first restart
/// the epoch is instant zero and the clock reads the same as its source.
///
/// # Example
///
/// ```ignore
/// static CLOCK: RelativeClock<EmbassyTime> = RelativeClock::new(EmbassyTime);
///
/// let mut runtime = Runtime::new(&BUS, &STOP).with_clock(&CLOCK);
/// runtime.start_all();
///
/// // in a plugin task
/// plugin.run(&CLOCK, component).await;
/// ```
pub struct RelativeClock<T> {
    source: T,
    epoch: Mutex<CriticalSectionRawMutex, Cell<Instant>>,
}

impl<T: TimeSource> RelativeClock<T> {
    /// Wrap `source`, with the epoch at instant zero.
    pub const fn new(source: T) -> Self {
        Self {
            source,
            epoch: Mutex::new(Cell::new(Instant::from_ticks(0))),
        }
    }

    /// Get the source instant that reads as zero.
    pub fn epoch(&self) -> Instant {
        self.epoch.lock(Cell::get)
    }

    /// Get the time elapsed since the epoch.
    pub fn elapsed(&self) -> Duration {
        self.now().duration_since(Instant::from_ticks(0))
    }

    /// Convert a relative instant back to the source's time base.
    pub fn to_absolute(&self, relative: Instant) -> Instant {
        let ticks = self.epoch().as_ticks().saturating_add(relative.as_ticks());
        Instant::from_ticks(ticks)
    }
}

impl<T: TimeSource> Epoch for RelativeClock<T> {
    fn restart(&self) {
        let now = self.source.now();
        self.epoch.lock(|epoch| epoch.set(now));
        debug!("clock restarted at {} ms", now.as_millis());
    }
}

impl<T: TimeSource> TimeSource for RelativeClock<T> {
    fn now(&self) -> Instant {
        let ticks = self
            .source
            .now()
            .as_ticks()
            .saturating_sub(self.epoch().as_ticks());
        Instant::from_ticks(ticks)
    }

    async fn sleep(&self, duration: Duration) {
        self.source.sleep(duration).await
    }
}
