//! Channels and the type-erased subscriber entries they hold.

use core::any::Any;

use heapless::Vec;

use super::message::{Handler, Message, TypeTag};
use crate::error::{Error, Table};
use crate::util::{Name, to_name};

type Deliver = fn(&(dyn Any + Send + Sync), &dyn Any);

/// One subscription: the handler, the delivery function monomorphised for
/// its message type, and the tag of that type.
///
/// Entries are `Copy` so a channel's list can be snapshotted under the bus
/// lock and invoked after the lock is released.
#[derive(Clone, Copy)]
pub(crate) struct Subscriber<'c> {
    context: &'c (dyn Any + Send + Sync),
    deliver: Deliver,
    tag: TypeTag,
}

impl<'c> Subscriber<'c> {
    pub(crate) fn new<T, H>(handler: &'c H) -> Self
    where
        T: Message,
        H: Handler<T>,
    {
        Self {
            context: handler,
            deliver: deliver_as::<T, H>,
            tag: TypeTag::of::<T>(),
        }
    }

    pub(crate) fn accepts(&self, tag: TypeTag) -> bool {
        self.tag == tag
    }

    pub(crate) fn deliver(&self, msg: &dyn Any) {
        (self.deliver)(self.context, msg)
    }
}

fn deliver_as<T, H>(context: &(dyn Any + Send + Sync), msg: &dyn Any)
where
    T: Message,
    H: Handler<T>,
{
    if let (Some(handler), Some(msg)) = (context.downcast_ref::<H>(), msg.downcast_ref::<T>()) {
        handler.on_message(msg);
    }
}

/// The subscribers attached to one `(sender, receiver)` pair, in
/// subscription order.
pub(crate) struct Channel<'c, const MAX_SUBSCRIBERS: usize> {
    sender: Name,
    receiver: Name,
    subscribers: Vec<Subscriber<'c>, MAX_SUBSCRIBERS>,
}

impl<'c, const MAX_SUBSCRIBERS: usize> Channel<'c, MAX_SUBSCRIBERS> {
    pub(crate) fn new(sender: &str, receiver: &str) -> Result<Self, Error> {
        Ok(Self {
            sender: to_name(sender)?,
            receiver: to_name(receiver)?,
            subscribers: Vec::new(),
        })
    }

    pub(crate) fn matches(&self, sender: &str, receiver: &str) -> bool {
        self.sender.as_str() == sender && self.receiver.as_str() == receiver
    }

    pub(crate) fn attach(&mut self, subscriber: Subscriber<'c>) -> Result<(), Error> {
        self.subscribers
            .push(subscriber)
            .map_err(|_| Error::CapacityExceeded(Table::Subscribers))
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Subscriber<'c>, MAX_SUBSCRIBERS> {
        self.subscribers.clone()
    }
}

/// All channels of one bus.
pub(crate) struct ChannelTable<'c, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize> {
    channels: Vec<Channel<'c, MAX_SUBSCRIBERS>, MAX_CHANNELS>,
}

impl<'c, const MAX_CHANNELS: usize, const MAX_SUBSCRIBERS: usize>
    ChannelTable<'c, MAX_CHANNELS, MAX_SUBSCRIBERS>
{
    pub(crate) const fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    pub(crate) fn find(
        &self,
        sender: &str,
        receiver: &str,
    ) -> Option<&Channel<'c, MAX_SUBSCRIBERS>> {
        self.channels.iter().find(|ch| ch.matches(sender, receiver))
    }

    /// Append `subscriber` to the `(sender, receiver)` channel, creating the
    /// channel first if this is the pair's first subscription.
    ///
    /// A full subscriber list or a full channel table refuses the
    /// subscription without creating anything.
    pub(crate) fn attach(
        &mut self,
        sender: &str,
        receiver: &str,
        subscriber: Subscriber<'c>,
    ) -> Result<bool, Error> {
        if let Some(ch) = self.channels.iter_mut().find(|ch| ch.matches(sender, receiver)) {
            ch.attach(subscriber)?;
            return Ok(false);
        }

        if self.channels.is_full() {
            return Err(Error::CapacityExceeded(Table::Channels));
        }
        let mut ch = Channel::new(sender, receiver)?;
        ch.attach(subscriber)?;
        self.channels
            .push(ch)
            .map_err(|_| Error::CapacityExceeded(Table::Channels))?;
        Ok(true)
    }

    pub(crate) fn len(&self) -> usize {
        self.channels.len()
    }
}
