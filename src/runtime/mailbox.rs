//! Bounded hand-off queue.
//!
//! A `Mailbox` moves messages from the publisher's execution unit to a
//! dedicated consumer. It is the alternative to handling a message inside the
//! publish call: the handler only enqueues, and the consumer processes the
//! message later on its own unit, where it is free to publish in turn.
//!
//! The producer never blocks. When the queue is full the message is dropped
//! and counted; this is the backpressure policy, not an error.

use core::sync::atomic::{AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::bus::{Handler, Message};

/// A fixed-depth, drop-on-full message queue.
///
/// # Type Parameters
///
/// - `M`: Raw mutex guarding the queue
/// - `T`: Message type
/// - `DEPTH`: Maximum number of queued messages
///
/// # Example
///
/// ```ignore
/// static INBOX: Mailbox<CriticalSectionRawMutex, ImuMsg, 8> = Mailbox::new();
///
/// node.subscribe::<ImuMsg, _>("offline_imu", &INBOX)?;
///
/// loop {
///     let msg = INBOX.recv().await;
///     // process on this task
/// }
/// ```
pub struct Mailbox<M: RawMutex, T, const DEPTH: usize> {
    queue: Channel<M, T, DEPTH>,
    dropped: AtomicUsize,
}

impl<M: RawMutex, T, const DEPTH: usize> Mailbox<M, T, DEPTH> {
    /// Create an empty mailbox.
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Try to enqueue `msg` without waiting.
    ///
    /// Returns `false`, and drops the message, if the mailbox is full.
    pub fn post(&self, msg: T) -> bool {
        if self.queue.try_send(msg).is_ok() {
            return true;
        }
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("mailbox full, message dropped ({} so far)", dropped);
        false
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> T {
        self.queue.receive().await
    }

    /// Take the next message if one is queued.
    pub fn try_recv(&self) -> Option<T> {
        self.queue.try_receive().ok()
    }

    /// Get the number of messages dropped because the mailbox was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Get the number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the mailbox is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if the next post would be dropped.
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

impl<M: RawMutex, T, const DEPTH: usize> Default for Mailbox<M, T, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

/// A mailbox can be subscribed directly: every delivered message is cloned
/// into the queue.
impl<M, T, const DEPTH: usize> Handler<T> for Mailbox<M, T, DEPTH>
where
    M: RawMutex + Send + Sync + 'static,
    T: Message + Clone + Send,
{
    fn on_message(&self, msg: &T) {
        self.post(msg.clone());
    }
}
