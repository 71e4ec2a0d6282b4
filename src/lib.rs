//! # In-Process Message Bus for Embedded Systems
//!
//! `myrtio-bus` lets independently written components of one process exchange
//! typed messages by name, without knowing about each other at build time.
//! It is `no_std` and allocation free, built on the
//! [Embassy](https://embassy.dev/) synchronization and time primitives.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Every table has a fixed capacity, set by a
//!   const parameter. Names are stored in `heapless` strings.
//! - **Typed channels:** A channel is identified by a `(sender, receiver)`
//!   name pair. Each subscriber declares the message type it accepts and only
//!   sees messages of that type.
//! - **Synchronous delivery:** `publish` calls every matching handler on the
//!   caller's execution unit before returning. Handlers may publish in turn.
//! - **Periodic publishing:** A node can publish a generator's output at a
//!   fixed interval, fired from its own service loop. No timer task is
//!   created.
//! - **Rust 2024 Edition:** Uses native `async fn` in traits, removing the
//!   need for `async-trait`.
//!
//! ## Architecture
//!
//! ### 1. Bus and Nodes
//!
//! ```ignore
//! static BUS: MessageBus<'static> = MessageBus::new();
//! static RECORDER: Recorder = Recorder::new();
//!
//! let sensor: Node<_> = Node::initialize(&BUS, "plugin1")?;
//! let logger: Node<_> = Node::initialize(&BUS, "plugin2")?;
//!
//! logger.subscribe::<SensorMsg, _>("plugin1", &RECORDER)?;
//! sensor.publish("plugin2", SensorMsg { timestamp: 0 });
//! ```
//!
//! ### 2. Plugins and the Runtime
//!
//! A [`Plugin`] runs a [`Component`] and the node's periodic jobs in a
//! service loop. The [`Runtime`] starts every registered plugin and stops
//! them cooperatively:
//!
//! ```ignore
//! #[embassy_executor::task]
//! async fn plugin1(bus: &'static MessageBus<'static>, stop: &'static StopFlag) {
//!     let mut plugin = Plugin::new(bus, "plugin1", stop).unwrap();
//!     plugin
//!         .node_mut()
//!         .publish_periodic("plugin2", Duration::from_millis(500), COUNTER.take())
//!         .unwrap();
//!     plugin.run(EmbassyTime, NoopComponent).await;
//! }
//! ```
//!
//! ## Logging
//!
//! Enable one of the `log`, `defmt` or `esp32-log` features to get
//! registration, subscription and loop lifecycle events.

#![no_std]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod bus;
pub mod config;
pub mod error;
pub mod node;
pub mod periodic;
pub mod runtime;
pub mod time;
pub mod util;

// Re-export key types for easier access at the crate root.
pub use bus::{Broker, Handler, Message, MessageBus, NodeId, Subscribe, TypeTag};
pub use error::{Error, Table};
pub use node::Node;
pub use periodic::{DriftPolicy, Generator, JobId};
pub use runtime::{
    Component, ComponentPair, Flow, Mailbox, NoopComponent, Plugin, PluginRegistry, Runtime,
    StopFlag,
};
pub use time::{EmbassyTime, Epoch, RelativeClock, TimeSource};
