/*!
 * Read-Copy-Update Cell
 * Whole-value publication for tables that are read on every submission
 */

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Shared value replaced as a unit
///
/// Readers take an `Arc` snapshot with a single atomic load and keep using it
/// for as long as they like; a concurrent `store` or `update` never mutates a
/// published value, it publishes a new one. Clones share the same slot.
pub struct RcuCell<T> {
    slot: Arc<ArcSwap<T>>,
}

impl<T> RcuCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Arc::new(ArcSwap::from_pointee(value)),
        }
    }

    /// Snapshot of the published value
    #[inline(always)]
    pub fn load(&self) -> Arc<T> {
        self.slot.load_full()
    }

    /// Publish `value`, dropping the slot's reference to the previous one
    #[inline]
    pub fn store(&self, value: T) {
        self.slot.store(Arc::new(value));
    }

    /// Derive the next value from the published one
    ///
    /// `next` is retried when another writer publishes in between, so it must
    /// not have side effects.
    pub fn update<F>(&self, mut next: F)
    where
        F: FnMut(&T) -> T,
    {
        self.slot.rcu(|current| next(current));
    }
}

impl<T> Clone for RcuCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}
