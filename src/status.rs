//! Observable boolean state cells.
//!
//! A [`StatusCell`] holds one flag (for example "project initialization in
//! progress") that the owning subsystem flips and any number of observers
//! follow. Subscribers get the current value first and then every change, with
//! consecutive duplicates suppressed.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

/// A serialized, observable boolean.
#[derive(Debug)]
pub struct StatusCell {
    name: &'static str,
    sender: watch::Sender<bool>,
}

impl StatusCell {
    pub fn new(name: &'static str, initial: bool) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { name, sender }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Commit `value` and wake subscribers if it differs from the current one.
    ///
    /// Writes go through the channel's single lock, so concurrent callers are
    /// serialized and readers never see a torn value.
    pub fn set_value(&self, value: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
        if changed {
            debug!(cell = self.name, value, "status changed");
        }
    }

    /// Last committed value.
    pub fn get_value(&self) -> bool {
        *self.sender.borrow()
    }

    /// Stream of the current value followed by every change.
    pub fn subscribe(&self) -> StatusStream {
        StatusStream {
            inner: WatchStream::new(self.sender.subscribe()),
            last: None,
        }
    }

    /// Set the cell to `true` until the returned guard is dropped.
    pub fn enter(&self) -> StatusGuard<'_> {
        self.set_value(true);
        StatusGuard { cell: self }
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Subscription to a [`StatusCell`]. Dropping it detaches only this subscriber.
pub struct StatusStream {
    inner: WatchStream<bool>,
    last: Option<bool>,
}

impl Stream for StatusStream {
    type Item = bool;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<bool>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(value)) => {
                    // A flip and flip-back between polls reads as the old value again.
                    if self.last == Some(value) {
                        continue;
                    }
                    self.last = Some(value);
                    return Poll::Ready(Some(value));
                }
                other => return other,
            }
        }
    }
}

/// Resets its cell to `false` on drop.
#[must_use = "the status resets as soon as the guard is dropped"]
pub struct StatusGuard<'a> {
    cell: &'a StatusCell,
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.cell.set_value(false);
    }
}
