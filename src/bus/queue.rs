/*!
 * Ingestion Queue
 * Lock-free unbounded MPMC queue between submitters and the dispatch loop
 *
 * Design: many producers (submissions), one consumer (the bus loop). Enqueue
 * never blocks and never fails; the consumer polls to empty.
 */

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub produced: u64,
    pub consumed: u64,
}

impl QueueStats {
    /// Items enqueued but not yet consumed
    #[inline]
    pub fn backlog(&self) -> u64 {
        self.produced.saturating_sub(self.consumed)
    }
}

pub struct IngestQueue<T> {
    queue: Arc<SegQueue<T>>,

    produced: Arc<AtomicU64>,
    consumed: Arc<AtomicU64>,
}

impl<T> IngestQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
            produced: Arc::new(AtomicU64::new(0)),
            consumed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push an item (lock-free, never blocks)
    #[inline]
    pub fn enqueue(&self, item: T) {
        self.queue.push(item);
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop one item, `None` when empty (never blocks)
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        self.queue.pop().map(|item| {
            self.consumed.fetch_add(1, Ordering::Relaxed);
            item
        })
    }

    /// Pop until empty, handing every item to `f`
    pub fn drain(&self, mut f: impl FnMut(T)) -> usize {
        let mut drained = 0;
        while let Some(item) = self.dequeue() {
            f(item);
            drained += 1;
        }
        drained
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
        }
    }
}

impl<T> Clone for IngestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            produced: Arc::clone(&self.produced),
            consumed: Arc::clone(&self.consumed),
        }
    }
}

impl<T> Default for IngestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
