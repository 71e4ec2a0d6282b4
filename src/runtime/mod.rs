//! Plugin Runtime
//!
//! Hosts components on top of the bus.
//!
//! # Overview
//!
//! - A [`Plugin`] binds one [`Component`] to one [`Node`](crate::Node) and
//!   runs its service loop: fire due periodic jobs, tick the component,
//!   sleep for the cadence, repeat until the [`StopFlag`] is raised.
//! - The [`PluginRegistry`] collects plugin factories by name.
//! - The [`Runtime`] calls every factory once at startup and raises the
//!   shared stop flag at shutdown.
//! - A [`Mailbox`] is a bounded queue that can be subscribed as a handler,
//!   for components that want to process messages on their own execution
//!   unit instead of the publisher's.
//!
//! The runtime never spawns anything itself. Factories decide where each
//! plugin loop runs: an Embassy task, a `std` thread, or a test executor.

pub(crate) mod bootstrap;
pub(crate) mod mailbox;
pub(crate) mod plugin;
pub(crate) mod registry;
pub(crate) mod traits;

pub use bootstrap::Runtime;
pub use mailbox::Mailbox;
pub use plugin::{Plugin, StopFlag};
pub use registry::{PluginRegistry, RegistryEntry};
pub use traits::{Component, ComponentPair, Flow, NoopComponent};
