//! Control-plane request correlation
//!
//! Requests that expect an answer are registered in a [`RequestStage`] under a
//! numeric identifier taken from [`RequestIds`]. When a reply carrying that
//! identifier comes back, the stage hands the request to exactly one caller.

use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub mod stage;

pub use stage::{RequestStage, StagedRequest};

/// Monotonic request identifier source
///
/// Identifiers never repeat until the counter wraps, and 0 is never issued.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: AtomicU32,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue counting after `last`
    pub fn starting_after(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    /// Get next request identifier
    pub fn next(&self) -> u32 {
        loop {
            let id = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if id != 0 {
                return id;
            }
        }
    }
}

/// A dispatched request waiting for its reply
#[derive(Debug)]
pub struct PendingRequest {
    id: u32,
    reply_required: bool,
    payload: Bytes,
    created: Instant,
    reply: Option<oneshot::Sender<Bytes>>,
}

impl PendingRequest {
    /// Create a request without a reply slot
    pub fn new(id: u32, payload: Bytes, reply_required: bool) -> Self {
        Self {
            id,
            reply_required,
            payload,
            created: Instant::now(),
            reply: None,
        }
    }

    /// Create a request whose reply is delivered through the returned receiver
    pub fn with_reply(id: u32, payload: Bytes) -> (Self, oneshot::Receiver<Bytes>) {
        let (tx, rx) = oneshot::channel();
        let mut request = Self::new(id, payload, true);
        request.reply = Some(tx);
        (request, rx)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn reply_required(&self) -> bool {
        self.reply_required
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Time since the request was created
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// Hand `reply` to the original caller
    ///
    /// Returns false when the request has no reply slot or the caller stopped
    /// waiting.
    pub fn deliver(self, reply: Bytes) -> bool {
        match self.reply {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }
}
