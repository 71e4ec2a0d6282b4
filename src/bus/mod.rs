//! Message Bus
//!
//! The bus owns the two shared tables of the system: the component
//! [`Directory`] and the channel table. Both sit behind a single blocking
//! mutex, and every critical section is a bounded table read or write.
//!
//! # Delivery
//!
//! Channels are keyed by the `(sender, receiver)` name pair rather than by
//! node identity, so a component can subscribe to a sender that has not
//! registered yet. Resolution happens at publish time.
//!
//! `publish` copies the matching channel's subscriber list while holding the
//! lock, releases the lock, and only then calls the handlers. A handler may
//! therefore publish or subscribe on the same bus without deadlocking.
//! Handlers run synchronously on the publisher's execution unit, in
//! subscription order.
//!
//! # Example
//!
//! ```ignore
//! static BUS: MessageBus<'static> = MessageBus::new();
//! static RECORDER: Recorder = Recorder::new();
//!
//! BUS.subscribe::<SensorMsg, _>("plugin1", "plugin2", &RECORDER)?;
//! BUS.publish("plugin1", "plugin2", SensorMsg { timestamp: 0 });
//! ```

pub(crate) mod channel;
pub(crate) mod directory;
pub(crate) mod message;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};

use self::channel::{Channel, ChannelTable, Subscriber};
use crate::config;
use crate::error::Error;
use crate::util::{Name, to_name};

pub use directory::{Directory, NodeId};
pub use message::{Handler, Message, TypeTag};

/// Directory and publish operations of a bus.
///
/// [`Node`](crate::Node) and the periodic scheduler are generic over this
/// trait rather than over the bus's capacity parameters.
pub trait Broker {
    /// Register a component name in the directory.
    fn register(&self, name: &str) -> Result<NodeId, Error>;

    /// Find the id registered under `name`.
    fn lookup(&self, name: &str) -> Option<NodeId>;

    /// Deliver `msg` to every matching subscriber of `(sender, receiver)`.
    ///
    /// Returns the number of handlers invoked.
    fn publish<T: Message>(&self, sender: &str, receiver: &str, msg: T) -> usize;
}

/// Subscription side of a bus whose handlers live for `'c`.
pub trait Subscribe<'c>: Broker {
    /// Attach `handler` to the `(sender, receiver)` channel for messages of type `T`.
    fn subscribe<T, H>(&self, sender: &str, receiver: &str, handler: &'c H) -> Result<(), Error>
    where
        T: Message,
        H: Handler<T>;
}

struct Tables<'c, const MAX_NODES: usize, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize>
{
    directory: Directory<MAX_NODES>,
    channels: ChannelTable<'c, MAX_CHANNELS, MAX_SUBSCRIBERS>,
}

/// The shared directory and message bus.
///
/// `'c` is the lifetime of the subscribed handlers. Capacities are const
/// parameters defaulting to the values in [`config`]; an operation that
/// would exceed one of them is refused and reported as
/// [`Error::CapacityExceeded`].
///
/// `MessageBus::new` is `const`, so a bus can be a `static` shared by every
/// component, or a local passed down by reference.
pub struct MessageBus<
    'c,
    M = CriticalSectionRawMutex,
    const MAX_NODES: usize = { config::MAX_NODES },
    const MAX_CHANNELS: usize = { config::MAX_CHANNELS },
    const MAX_SUBSCRIBERS: usize = { config::MAX_SUBSCRIBERS_PER_CHANNEL },
> {
    tables: Mutex<M, RefCell<Tables<'c, MAX_NODES, MAX_CHANNELS, MAX_SUBSCRIBERS>>>,
}

impl<'c, M, const MAX_NODES: usize, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize>
    MessageBus<'c, M, MAX_NODES, MAX_CHANNELS, MAX_SUBSCRIBERS>
where
    M: RawMutex,
{
    /// Create a bus with empty tables.
    pub const fn new() -> Self {
        Self {
            tables: Mutex::new(RefCell::new(Tables {
                directory: Directory::new(),
                channels: ChannelTable::new(),
            })),
        }
    }

    /// Register `name` in the directory.
    ///
    /// Duplicate names, names longer than
    /// [`MAX_NAME_LEN`](config::MAX_NAME_LEN) and registrations past
    /// `MAX_NODES` are refused.
    pub fn register(&self, name: &str) -> Result<NodeId, Error> {
        let result = self
            .tables
            .lock(|tables| tables.borrow_mut().directory.register(name));
        match result {
            Ok(id) => info!("registered '{}' as node {}", name, id.index()),
            Err(err) => warn!("refused registration of '{}': {}", name, err),
        }
        result
    }

    /// Find the id registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.tables
            .lock(|tables| tables.borrow().directory.lookup(name))
    }

    /// Check if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Copy out the name registered under `id`.
    pub fn name_of(&self, id: NodeId) -> Option<Name> {
        self.tables.lock(|tables| {
            let tables = tables.borrow();
            let name = tables.directory.name_of(id)?;
            to_name(name).ok()
        })
    }

    /// Get the number of registered components.
    pub fn node_count(&self) -> usize {
        self.tables.lock(|tables| tables.borrow().directory.len())
    }

    /// Attach `handler` to the `(sender, receiver)` channel for messages of
    /// type `T`.
    ///
    /// The channel is created on the first subscription for the pair and
    /// reused afterwards. The subscription is dropped, with a warning, if the
    /// channel already holds `MAX_SUBSCRIBERS` handlers or if a new channel is
    /// needed and the table holds `MAX_CHANNELS`.
    pub fn subscribe<T, H>(&self, sender: &str, receiver: &str, handler: &'c H) -> Result<(), Error>
    where
        T: Message,
        H: Handler<T>,
    {
        let subscriber = Subscriber::new::<T, H>(handler);
        let result = self.tables.lock(|tables| {
            tables
                .borrow_mut()
                .channels
                .attach(sender, receiver, subscriber)
        });
        match result {
            Ok(created) => {
                if created {
                    debug!("opened channel '{}' -> '{}'", sender, receiver);
                }
                Ok(())
            }
            Err(err) => {
                warn!("dropped subscription '{}' -> '{}': {}", sender, receiver, err);
                Err(err)
            }
        }
    }

    /// Deliver `msg` to the `(sender, receiver)` channel.
    ///
    /// Every subscriber registered for `T` is invoked once, in subscription
    /// order, before this returns. Subscribers registered for other types are
    /// skipped. Publishing to a pair nobody subscribed to is a no-op and does
    /// not create a channel.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish<T: Message>(&self, sender: &str, receiver: &str, msg: T) -> usize {
        let snapshot = self.tables.lock(|tables| {
            tables
                .borrow()
                .channels
                .find(sender, receiver)
                .map(Channel::snapshot)
        });
        let Some(subscribers) = snapshot else {
            trace!("no channel '{}' -> '{}', message dropped", sender, receiver);
            return 0;
        };

        let tag = TypeTag::of::<T>();
        let mut delivered = 0;
        for subscriber in subscribers.iter().filter(|s| s.accepts(tag)) {
            subscriber.deliver(&msg);
            delivered += 1;
        }
        delivered
    }

    /// Check if a channel exists for `(sender, receiver)`.
    pub fn has_channel(&self, sender: &str, receiver: &str) -> bool {
        self.tables
            .lock(|tables| tables.borrow().channels.find(sender, receiver).is_some())
    }

    /// Get the number of subscribers on `(sender, receiver)`, of any type.
    pub fn subscriber_count(&self, sender: &str, receiver: &str) -> usize {
        self.tables.lock(|tables| {
            tables
                .borrow()
                .channels
                .find(sender, receiver)
                .map_or(0, Channel::len)
        })
    }

    /// Get the number of channels on the bus.
    pub fn channel_count(&self) -> usize {
        self.tables.lock(|tables| tables.borrow().channels.len())
    }
}

impl<'c, M, const MAX_NODES: usize, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize> Default
    for MessageBus<'c, M, MAX_NODES, MAX_CHANNELS, MAX_SUBSCRIBERS>
where
    M: RawMutex,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'c, M, const MAX_NODES: usize, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize> Broker
    for MessageBus<'c, M, MAX_NODES, MAX_CHANNELS, MAX_SUBSCRIBERS>
where
    M: RawMutex,
{
    fn register(&self, name: &str) -> Result<NodeId, Error> {
        MessageBus::register(self, name)
    }

    fn lookup(&self, name: &str) -> Option<NodeId> {
        MessageBus::lookup(self, name)
    }

    fn publish<T: Message>(&self, sender: &str, receiver: &str, msg: T) -> usize {
        MessageBus::publish(self, sender, receiver, msg)
    }
}

impl<'c, M, const MAX_NODES: usize, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize>
    Subscribe<'c> for MessageBus<'c, M, MAX_NODES, MAX_CHANNELS, MAX_SUBSCRIBERS>
where
    M: RawMutex,
{
    fn subscribe<T, H>(&self, sender: &str, receiver: &str, handler: &'c H) -> Result<(), Error>
    where
        T: Message,
        H: Handler<T>,
    {
        MessageBus::subscribe(self, sender, receiver, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Table;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    struct Count(AtomicUsize);

    impl Handler<u8> for Count {
        fn on_message(&self, _msg: &u8) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    type SmallBus<'c> = MessageBus<'c, NoopRawMutex, 2, 2, 2>;

    #[test]
    fn subscription_past_channel_capacity_is_refused() {
        let count = Count(AtomicUsize::new(0));
        let bus = SmallBus::new();

        bus.subscribe::<u8, _>("a", "x", &count).unwrap();
        bus.subscribe::<u8, _>("b", "x", &count).unwrap();
        assert_eq!(
            bus.subscribe::<u8, _>("c", "x", &count),
            Err(Error::CapacityExceeded(Table::Channels))
        );
        assert_eq!(bus.channel_count(), 2);
        assert!(!bus.has_channel("c", "x"));
    }

    #[test]
    fn name_of_returns_registered_name() {
        let bus = SmallBus::new();
        let id = bus.register("imu").unwrap();

        assert_eq!(bus.name_of(id).as_deref(), Some("imu"));
        assert!(bus.contains("imu"));
        assert!(!bus.contains("gps"));
    }

    #[test]
    fn long_sender_name_refuses_subscription() {
        let count = Count(AtomicUsize::new(0));
        let bus = SmallBus::new();
        let long = "a-component-name-that-is-far-longer-than-the-limit";

        assert_eq!(
            bus.subscribe::<u8, _>(long, "x", &count),
            Err(Error::NameTooLong)
        );
        assert_eq!(bus.channel_count(), 0);
    }
}
