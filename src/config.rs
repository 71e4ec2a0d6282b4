//! Compile-time capacities.
//!
//! These are the defaults for the const-generic parameters of
//! [`MessageBus`](crate::MessageBus), [`Node`](crate::Node) and the runtime
//! types. Nothing in the crate grows past them; an insertion into a full
//! table is refused.

use embassy_time::Duration;

/// Maximum number of components in the directory.
pub const MAX_NODES: usize = 10;

/// Maximum number of `(sender, receiver)` channels on one bus.
pub const MAX_CHANNELS: usize = 20;

/// Maximum number of subscribers attached to one channel.
pub const MAX_SUBSCRIBERS_PER_CHANNEL: usize = 4;

/// Maximum number of periodic jobs owned by one node.
pub const MAX_PERIODIC_JOBS: usize = 8;

/// Maximum length in bytes of a component name.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum number of plugin factories in a [`PluginRegistry`](crate::runtime::PluginRegistry).
pub const MAX_REGISTERED_PLUGINS: usize = 20;

/// Sleep between two iterations of a plugin service loop.
pub const DEFAULT_SERVICE_CADENCE: Duration = Duration::from_millis(10);
