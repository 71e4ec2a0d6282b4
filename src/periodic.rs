//! Periodic Job Scheduler
//!
//! A node can register jobs that generate a message at a fixed interval and
//! publish it to a receiver. Nothing here owns a timer: jobs only fire when
//! the owning execution unit calls [`Scheduler::tick`], normally from its
//! plugin service loop.
//!
//! # Drift
//!
//! After a job fires its next deadline is recomputed according to the
//! scheduler's [`DriftPolicy`]:
//!
//! - [`DriftPolicy::Rebase`] (default) schedules the next fire one interval
//!   after the tick that fired. A late tick delays every later fire, and a
//!   burst of catch-up fires never happens.
//! - [`DriftPolicy::Accumulate`] adds the interval to the previous deadline.
//!   The long-run cadence does not drift; after a stall the job fires once
//!   per tick until it has caught up.
//!
//! # Clock
//!
//! A job is first due one interval after it was registered. The scheduler
//! knows the time only through the instants it is given: either explicitly
//! ([`Scheduler::register_at`]) or as the most recent clock reading, set by
//! [`Scheduler::tick`] and [`Scheduler::sync`]. A job registered before the
//! clock was ever read is rescheduled by the first `sync`, so the service
//! loop syncs once before its first tick.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::bus::{Broker, Message};
use crate::error::{Error, Table};
use crate::util::{Name, to_name};

/// Produces the messages of a periodic job.
///
/// Implemented for every `FnMut() -> T`, so a closure holding a counter is
/// the usual generator.
pub trait Generator {
    /// The type of message produced.
    type Message: Message;

    /// Produce the next message.
    fn generate(&mut self) -> Self::Message;
}

impl<T, F> Generator for F
where
    T: Message,
    F: FnMut() -> T,
{
    type Message = T;

    fn generate(&mut self) -> T {
        self()
    }
}

/// Generates one message and publishes it on `bus`.
///
/// This erases the message type so jobs of different types share one list.
trait Fire<B> {
    fn fire(&mut self, bus: &B, sender: &str, receiver: &str) -> usize;
}

impl<B: Broker, G: Generator> Fire<B> for G {
    fn fire(&mut self, bus: &B, sender: &str, receiver: &str) -> usize {
        let msg = self.generate();
        bus.publish(sender, receiver, msg)
    }
}

/// How a job's next deadline is computed after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriftPolicy {
    /// `next = now + interval`.
    #[default]
    Rebase,
    /// `next = previous deadline + interval`.
    Accumulate,
}

/// Handle of a registered job, unique within its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JobId(usize);

impl JobId {
    /// Position of the job in registration order.
    pub fn index(self) -> usize {
        self.0
    }
}

struct Job<'g, B> {
    receiver: Name,
    interval: Duration,
    next_fire: Instant,
    fired: bool,
    source: &'g mut (dyn Fire<B> + Send + 'g),
}

/// The periodic jobs of one node.
///
/// `'g` is the lifetime of the generators, which are borrowed mutably for as
/// long as the scheduler lives.
pub struct Scheduler<'g, B, const MAX_JOBS: usize> {
    jobs: Vec<Job<'g, B>, MAX_JOBS>,
    policy: DriftPolicy,
    last_tick: Instant,
}

impl<'g, B: Broker, const MAX_JOBS: usize> Scheduler<'g, B, MAX_JOBS> {
    /// Create an empty scheduler using `policy`.
    ///
    /// The scheduler's clock starts at instant zero and follows the `now`
    /// values passed to [`tick`](Self::tick).
    pub const fn new(policy: DriftPolicy) -> Self {
        Self {
            jobs: Vec::new(),
            policy,
            last_tick: Instant::from_ticks(0),
        }
    }

    /// Register a job publishing `generator`'s messages to `receiver` every
    /// `interval`, registered at the most recent clock reading.
    ///
    /// Fails when the scheduler already holds `MAX_JOBS` jobs or when
    /// `receiver` is not a valid name.
    pub fn register<G>(
        &mut self,
        receiver: &str,
        interval: Duration,
        generator: &'g mut G,
    ) -> Result<JobId, Error>
    where
        G: Generator + Send,
    {
        self.register_at(receiver, interval, self.last_tick, generator)
    }

    /// Register a job whose first deadline is `registered_at + interval`.
    pub fn register_at<G>(
        &mut self,
        receiver: &str,
        interval: Duration,
        registered_at: Instant,
        generator: &'g mut G,
    ) -> Result<JobId, Error>
    where
        G: Generator + Send,
    {
        if self.jobs.is_full() {
            return Err(Error::CapacityExceeded(Table::Jobs));
        }
        let id = JobId(self.jobs.len());
        let job = Job {
            receiver: to_name(receiver)?,
            interval,
            next_fire: deadline(registered_at, interval),
            fired: false,
            source: generator,
        };
        self.jobs
            .push(job)
            .map_err(|_| Error::CapacityExceeded(Table::Jobs))?;
        Ok(id)
    }

    /// Set the clock to `now` without firing anything.
    ///
    /// Jobs that have never fired are rescheduled to `now + interval`, as if
    /// they had been registered at `now`.
    pub fn sync(&mut self, now: Instant) {
        self.last_tick = now;
        for job in self.jobs.iter_mut().filter(|job| !job.fired) {
            job.next_fire = deadline(now, job.interval);
        }
    }

    /// Fire every job whose deadline is at or before `now`, publishing from
    /// `owner`.
    ///
    /// Jobs are visited in registration order and each fires at most once per
    /// call. Returns the number of jobs fired.
    pub fn tick(&mut self, bus: &B, owner: &str, now: Instant) -> usize {
        self.last_tick = now;
        let mut fired = 0;
        for job in self.jobs.iter_mut() {
            if now < job.next_fire {
                continue;
            }
            let delivered = job.source.fire(bus, owner, job.receiver.as_str());
            trace!(
                "job '{}' -> '{}' fired at {} ms, {} delivered",
                owner,
                job.receiver.as_str(),
                now.as_millis(),
                delivered
            );
            job.next_fire = match self.policy {
                DriftPolicy::Rebase => deadline(now, job.interval),
                DriftPolicy::Accumulate => deadline(job.next_fire, job.interval),
            };
            job.fired = true;
            fired += 1;
        }
        fired
    }

    /// Get the next deadline of `job`.
    pub fn next_fire(&self, job: JobId) -> Option<Instant> {
        self.jobs.get(job.0).map(|job| job.next_fire)
    }

    /// Get the drift policy.
    pub fn policy(&self) -> DriftPolicy {
        self.policy
    }

    /// Change the drift policy. Deadlines already computed are kept.
    pub fn set_policy(&mut self, policy: DriftPolicy) {
        self.policy = policy;
    }

    /// Get the number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if no job is registered.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn deadline(from: Instant, interval: Duration) -> Instant {
    from.checked_add(interval).unwrap_or(Instant::MAX)
}
