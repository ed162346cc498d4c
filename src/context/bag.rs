/*!
 * Context Bag
 * Type-keyed values a framework attaches to an inbound call
 */

use ahash::RandomState;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Per-call extension map, one value per type
#[derive(Default)]
pub struct ContextBag {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>, RandomState>,
}

impl ContextBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value`, returning the one it replaces
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok().map(|boxed: Box<T>| *boxed))
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>())?.downcast_ref()
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.values.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast().ok().map(|boxed: Box<T>| *boxed))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for ContextBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBag").field("len", &self.values.len()).finish()
    }
}
