//! Component trait and utilities.
//!
//! A component is the application logic of a plugin: the part that runs
//! once per service-loop iteration next to the node's periodic jobs.
//!
//! # Design
//!
//! The trait is generic over the node type `N` instead of over the bus and
//! capacity parameters, so a component can be written once against
//! `Node<'_, B>` for any bus `B`. Components never sleep or block: the plugin
//! owns the cadence and suspends between iterations.

/// What the service loop should do after a component's tick.
///
/// Only `Continue` counts as a completed iteration. `Skip` and `Yield` tell
/// the loop the component was not ready; the loop goes around again without
/// waiting a full cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flow {
    /// Iteration done, sleep for the cadence.
    #[default]
    Continue,
    /// Not ready, go around again immediately.
    Skip,
    /// Not ready, yield to the executor once and go around again.
    Yield,
    /// Leave the loop after this iteration. Other plugins are not affected.
    Stop,
}

/// Application logic driven by a [`Plugin`](super::Plugin) service loop.
///
/// # Example
///
/// ```ignore
/// struct Heartbeat {
///     beats: u32,
/// }
///
/// impl<'b, B: Broker> Component<Node<'b, B>> for Heartbeat {
///     fn on_tick(&mut self, node: &mut Node<'b, B>) -> Flow {
///         self.beats += 1;
///         node.publish("monitor", self.beats);
///         Flow::Continue
///     }
/// }
/// ```
pub trait Component<N> {
    /// Called once before the first iteration.
    ///
    /// Use this to register periodic jobs or publish an initial state.
    fn on_start(&mut self, _node: &mut N) {}

    /// Called once per iteration, after the node's due jobs have fired.
    ///
    /// The default implementation does nothing and keeps the loop running.
    fn on_tick(&mut self, _node: &mut N) -> Flow {
        Flow::Continue
    }

    /// Called once after the loop exits, whatever the reason.
    fn on_stop(&mut self, _node: &mut N) {}
}

/// A component that does nothing.
///
/// The plugin then only services its node's periodic jobs.
pub struct NoopComponent;

impl<N> Component<N> for NoopComponent {}

/// Two components run one after the other on the same node.
///
/// Both see every start, tick and stop. The loop stops when either asks it
/// to, and the pair only skips an iteration when neither did any work.
///
/// # Example
///
/// ```ignore
/// let combined = ComponentPair::new(imu_reader, heartbeat);
/// plugin.run(EmbassyTime, combined).await;
/// ```
pub struct ComponentPair<C1, C2> {
    /// First component
    pub first: C1,
    /// Second component
    pub second: C2,
}

impl<C1, C2> ComponentPair<C1, C2> {
    /// Create a new combined component from two components.
    pub fn new(first: C1, second: C2) -> Self {
        Self { first, second }
    }
}

impl<N, C1, C2> Component<N> for ComponentPair<C1, C2>
where
    C1: Component<N>,
    C2: Component<N>,
{
    fn on_start(&mut self, node: &mut N) {
        self.first.on_start(node);
        self.second.on_start(node);
    }

    fn on_tick(&mut self, node: &mut N) -> Flow {
        let f1 = self.first.on_tick(node);
        let f2 = self.second.on_tick(node);
        match (f1, f2) {
            (Flow::Stop, _) | (_, Flow::Stop) => Flow::Stop,
            (Flow::Continue, _) | (_, Flow::Continue) => Flow::Continue,
            (Flow::Yield, _) | (_, Flow::Yield) => Flow::Yield,
            (Flow::Skip, Flow::Skip) => Flow::Skip,
        }
    }

    fn on_stop(&mut self, node: &mut N) {
        self.first.on_stop(node);
        self.second.on_stop(node);
    }
}

/// Blanket implementation for mutable references.
///
/// This allows a caller to keep ownership of a component it passes to
/// [`Plugin::run`](super::Plugin::run).
impl<N, C: Component<N> + ?Sized> Component<N> for &mut C {
    fn on_start(&mut self, node: &mut N) {
        (**self).on_start(node)
    }

    fn on_tick(&mut self, node: &mut N) -> Flow {
        (**self).on_tick(node)
    }

    fn on_stop(&mut self, node: &mut N) {
        (**self).on_stop(node)
    }
}
