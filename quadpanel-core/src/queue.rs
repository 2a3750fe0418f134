//! Bounded request and response queues
//!
//! Both queues live inside the bus and are only touched from the
//! foreground loop, so they need no locking.

use heapless::Deque;

use crate::request::{Request, Response};

/// Capacity of each port's request queue
pub const MAX_REQ_QUEUE_LENGTH: usize = 16;

/// Capacity of the global response queue
pub const RESPONSE_QUEUE_MAX: usize = 4;

/// Request queue has no room left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

/// Outcome of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Enqueued {
    /// Request appended
    Added,
    /// An equal request was already queued; nothing changed
    Duplicate,
}

/// FIFO of requests waiting for their port to be selected
///
/// Never holds two requests for which [`Request::same_as`] is true.
pub struct RequestQueue<'a> {
    items: Deque<Request<'a>, MAX_REQ_QUEUE_LENGTH>,
}

impl<'a> RequestQueue<'a> {
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
        }
    }

    /// Append `request` unless an equal one is already queued
    ///
    /// Duplicates are reported before fullness, so resubmitting a queued
    /// request into a full queue is harmless.
    pub fn push(&mut self, request: Request<'a>) -> Result<Enqueued, QueueFull> {
        if self.contains(&request) {
            return Ok(Enqueued::Duplicate);
        }
        self.items
            .push_back(request)
            .map(|()| Enqueued::Added)
            .map_err(|_| QueueFull)
    }

    /// Remove the oldest request
    pub fn take(&mut self) -> Option<Request<'a>> {
        self.items.pop_front()
    }

    pub fn contains(&self, request: &Request<'_>) -> bool {
        self.items.iter().any(|queued| queued.same_as(request))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request<'a>> {
        self.items.iter()
    }
}

impl Default for RequestQueue<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO of completed responses waiting for the application
///
/// When full, new responses are dropped and counted.
pub struct ResponseQueue<'a> {
    items: Deque<Response<'a>, RESPONSE_QUEUE_MAX>,
    dropped: u32,
}

impl<'a> ResponseQueue<'a> {
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
            dropped: 0,
        }
    }

    /// Append `response`
    ///
    /// Returns `false` if the queue was full and the response was dropped.
    pub fn push(&mut self, response: Response<'a>) -> bool {
        match self.items.push_back(response) {
            Ok(()) => true,
            Err(_) => {
                self.dropped = self.dropped.wrapping_add(1);
                false
            }
        }
    }

    /// Remove the oldest response
    pub fn take(&mut self) -> Option<Response<'a>> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Responses lost to overflow since start-up
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl Default for ResponseQueue<'_> {
    fn default() -> Self {
        Self::new()
    }
}
