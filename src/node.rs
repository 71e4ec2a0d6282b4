//! Endpoint of one component.

use embassy_time::{Duration, Instant};

use crate::bus::{Broker, Handler, Message, NodeId, Subscribe};
use crate::config::MAX_PERIODIC_JOBS;
use crate::error::Error;
use crate::periodic::{DriftPolicy, Generator, JobId, Scheduler};
use crate::util::{Name, to_name};

/// A named facade binding one component to the bus.
///
/// The node registers its name on [`initialize`](Node::initialize) and then
/// fills in its own name as the receiver of every subscription and as the
/// sender of every publish. Periodic jobs registered through the node are
/// fired by [`service_tick`](Node::service_tick), which only the owning
/// execution unit should call.
///
/// `'b` bounds both the borrow of the bus and the borrow of every periodic
/// generator.
pub struct Node<'b, B, const MAX_JOBS: usize = MAX_PERIODIC_JOBS> {
    bus: &'b B,
    name: Name,
    id: NodeId,
    scheduler: Scheduler<'b, B, MAX_JOBS>,
}

impl<'b, B: Broker, const MAX_JOBS: usize> Node<'b, B, MAX_JOBS> {
    /// Register `name` on `bus` and return its endpoint.
    ///
    /// Fails when the name is already taken, too long, or the directory is
    /// full; nothing is registered in that case.
    pub fn initialize(bus: &'b B, name: &str) -> Result<Self, Error> {
        let owned = to_name(name)?;
        let id = bus.register(name)?;
        Ok(Self {
            bus,
            name: owned,
            id,
            scheduler: Scheduler::new(DriftPolicy::default()),
        })
    }

    /// Get the registered name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the directory id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the bus this node is attached to.
    pub fn bus(&self) -> &'b B {
        self.bus
    }

    /// Subscribe `handler` to messages of type `T` sent by `sender` to this node.
    pub fn subscribe<'c, T, H>(&self, sender: &str, handler: &'c H) -> Result<(), Error>
    where
        B: Subscribe<'c>,
        T: Message,
        H: Handler<T>,
    {
        self.bus.subscribe::<T, H>(sender, self.name(), handler)
    }

    /// Publish `msg` from this node to `receiver`.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish<T: Message>(&self, receiver: &str, msg: T) -> usize {
        self.bus.publish(self.name(), receiver, msg)
    }

    /// Publish `generator`'s output to `receiver` every `interval`.
    ///
    /// No thread or timer is created: the job fires from
    /// [`service_tick`](Self::service_tick). The job is registered at the
    /// node's latest clock reading; a plugin loop re-reads the clock with
    /// [`sync_clock`](Self::sync_clock) before its first tick, so jobs added
    /// before the loop starts are first due one interval after it starts.
    pub fn publish_periodic<G>(
        &mut self,
        receiver: &str,
        interval: Duration,
        generator: &'b mut G,
    ) -> Result<JobId, Error>
    where
        G: Generator + Send,
    {
        let result = self.scheduler.register(receiver, interval, generator);
        self.log_registration(receiver, interval, result)
    }

    /// Publish `generator`'s output to `receiver` every `interval`, the first
    /// time at `now + interval`.
    pub fn publish_periodic_at<G>(
        &mut self,
        receiver: &str,
        interval: Duration,
        now: Instant,
        generator: &'b mut G,
    ) -> Result<JobId, Error>
    where
        G: Generator + Send,
    {
        let result = self
            .scheduler
            .register_at(receiver, interval, now, generator);
        self.log_registration(receiver, interval, result)
    }

    fn log_registration(
        &self,
        receiver: &str,
        interval: Duration,
        result: Result<JobId, Error>,
    ) -> Result<JobId, Error> {
        match result {
            Ok(job) => debug!(
                "'{}' publishes to '{}' every {} ms (job {})",
                self.name(),
                receiver,
                interval.as_millis(),
                job.index()
            ),
            Err(err) => warn!("'{}' dropped periodic job to '{}': {}", self.name(), receiver, err),
        }
        result
    }

    /// Read the clock without firing: jobs that have not fired yet are
    /// rescheduled to `now + interval`.
    pub fn sync_clock(&mut self, now: Instant) {
        self.scheduler.sync(now);
    }

    /// Fire the periodic jobs that are due at `now`.
    ///
    /// Returns the number of jobs fired.
    pub fn service_tick(&mut self, now: Instant) -> usize {
        self.scheduler.tick(self.bus, self.name.as_str(), now)
    }

    /// Get the next deadline of one of this node's jobs.
    pub fn next_fire(&self, job: JobId) -> Option<Instant> {
        self.scheduler.next_fire(job)
    }

    /// Get the number of periodic jobs.
    pub fn job_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Get the drift policy applied to this node's jobs.
    pub fn drift_policy(&self) -> DriftPolicy {
        self.scheduler.policy()
    }

    /// Change the drift policy applied to this node's jobs.
    pub fn set_drift_policy(&mut self, policy: DriftPolicy) {
        self.scheduler.set_policy(policy);
    }
}
