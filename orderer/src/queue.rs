//! Envelope queue: a bounded FIFO between submitters and the single consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

/// Producer side of the submission queue.
///
/// [`EnvelopeQueue::submit`] never blocks: it rejects when the queue is full
/// or closed. The single consumer drains the paired receiver in arrival
/// order.
pub struct EnvelopeQueue<T> {
    tx: mpsc::Sender<T>,
    closed: Arc<AtomicBool>,
}

impl<T> Clone for EnvelopeQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> EnvelopeQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Offer an item. Returns `false` if it was not accepted.
    pub fn submit(&self, item: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("submission rejected: queue closed");
            return false;
        }
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.tx.max_capacity(), "submission rejected: queue full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("submission rejected: consumer gone");
                false
            }
        }
    }

    /// Stop accepting submissions. Items already queued stay for the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_in_arrival_order() {
        let (queue, mut rx) = EnvelopeQueue::new(8);
        for i in 0..5 {
            assert!(queue.submit(i));
        }
        assert_eq!(queue.len(), 5);
        for i in 0..5 {
            assert_eq!(rx.recv().await, Some(i));
        }
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let (queue, _rx) = EnvelopeQueue::new(2);
        assert!(queue.submit(1));
        assert!(queue.submit(2));
        assert!(!queue.submit(3));
    }

    #[tokio::test]
    async fn closed_queue_rejects_but_keeps_backlog() {
        let (queue, mut rx) = EnvelopeQueue::new(4);
        assert!(queue.submit("a"));
        queue.close();
        assert!(queue.is_closed());
        assert!(!queue.submit("b"));
        assert_eq!(rx.recv().await, Some("a"));
    }

    #[test]
    fn dropped_consumer_rejects() {
        let (queue, rx) = EnvelopeQueue::new(4);
        drop(rx);
        assert!(!queue.submit(1));
        assert!(queue.is_closed());
    }
}
