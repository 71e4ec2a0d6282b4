//! Message typing.
//!
//! A channel can carry several message types. Each subscription records the
//! [`TypeTag`] of the type it was made for, and a publish only reaches the
//! subscriptions whose tag matches the published value.

use core::any::{Any, TypeId};

/// Marker for values that can travel over the bus.
///
/// Any `'static` type qualifies. Messages are passed to handlers by
/// reference for the duration of one publish call and never stored.
pub trait Message: Any {}

impl<T: Any> Message for T {}

/// Stable per-type identifier used to filter delivery.
///
/// Two tags are equal exactly when they were produced for the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag(TypeId);

impl TypeTag {
    /// Returns the tag for `T`.
    pub fn of<T: Message>() -> Self {
        TypeTag(TypeId::of::<T>())
    }
}

/// Receives messages of type `T` from the bus.
///
/// The implementor plays the role of the subscription context: the bus keeps
/// a shared reference to it and calls [`Handler::on_message`] on the
/// publisher's execution unit. Implementations mutate their own state through
/// interior mutability (atomics, a blocking mutex, a [`Mailbox`]).
///
/// A type may implement `Handler` for several message types and be
/// subscribed once per type.
///
/// # Example
///
/// ```ignore
/// struct Recorder {
///     last: AtomicI32,
/// }
///
/// impl Handler<SensorMsg> for Recorder {
///     fn on_message(&self, msg: &SensorMsg) {
///         self.last.store(msg.timestamp, Ordering::Relaxed);
///     }
/// }
/// ```
///
/// [`Mailbox`]: crate::runtime::Mailbox
pub trait Handler<T: Message>: Any + Send + Sync {
    /// Handles one published message.
    ///
    /// Runs without the bus lock held, so it may publish or subscribe.
    fn on_message(&self, msg: &T);
}
