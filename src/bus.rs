//! Live line fan-out for command and process output.
//!
//! Every subscriber owns a small bounded queue. Publishing never waits: a line
//! that does not fit in a subscriber's queue is dropped for that subscriber
//! only. Nothing is retained for subscribers that attach later.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// Per-subscriber queue depth used when none is configured.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

struct Slot {
    id: u64,
    sender: mpsc::Sender<Arc<str>>,
    dropped: Arc<AtomicU64>,
}

struct BusInner {
    slots: RwLock<Vec<Slot>>,
    next_id: AtomicU64,
    capacity: usize,
    published: AtomicU64,
}

impl BusInner {
    fn detach(&self, id: u64) {
        self.slots.write().retain(|slot| slot.id != id);
    }
}

/// Non-buffering broadcast channel for text lines. Cheap to clone.
#[derive(Clone)]
pub struct LogBus {
    inner: Arc<BusInner>,
}

impl LogBus {
    pub fn new(subscriber_capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                slots: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                capacity: subscriber_capacity.max(1),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Offer `line` to every attached subscriber without blocking.
    pub fn publish(&self, line: impl Into<String>) {
        let line: Arc<str> = Arc::from(line.into());
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut closed = Vec::new();
        {
            let slots = self.inner.slots.read();
            for slot in slots.iter() {
                match slot.sender.try_send(Arc::clone(&line)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        slot.dropped.fetch_add(1, Ordering::Relaxed);
                        trace!(subscriber = slot.id, "subscriber queue full, line dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(slot.id),
                }
            }
        }
        for id in closed {
            self.inner.detach(id);
        }
    }

    /// Publish each line in order.
    pub fn publish_all<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.publish(line);
        }
    }

    /// Attach a subscriber that receives lines published from now on.
    pub fn subscribe(&self) -> LineSubscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicU64::new(0));
        self.inner.slots.write().push(Slot {
            id,
            sender,
            dropped: Arc::clone(&dropped),
        });
        LineSubscription {
            id,
            receiver,
            dropped,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.slots.read().len()
    }

    /// Lines offered to subscribers since the bus was created.
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

/// A live view of the bus. Dropping it releases its queue immediately.
pub struct LineSubscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<str>>,
    dropped: Arc<AtomicU64>,
    bus: Weak<BusInner>,
}

impl LineSubscription {
    /// Next line, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Next queued line without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }

    /// Lines this subscriber missed because its queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Stream for LineSubscription {
    type Item = Arc<str>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Arc<str>>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for LineSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(bus) = self.bus.upgrade() {
            bus.detach(self.id);
        }
    }
}
