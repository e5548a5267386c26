//! Bounded outgoing queue for the buffered client.

use std::collections::VecDeque;

use crate::message::Message;

/// FIFO of messages waiting to be flushed.
///
/// Pushing onto a full queue evicts the oldest entry, so the queue holds
/// at most `capacity` messages and the newest submissions always win.
#[derive(Debug)]
pub(crate) struct OutgoingQueue {
    items: VecDeque<Message>,
    capacity: usize,
}

impl OutgoingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append `message`, returning whatever had to be evicted to make room.
    pub fn push(&mut self, message: Message) -> Option<Message> {
        if self.capacity == 0 {
            return Some(message);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(message);
        evicted
    }

    /// Take every queued message, oldest first.
    pub fn take(&mut self) -> Vec<Message> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
