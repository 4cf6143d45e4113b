//! Private per-instance state keyed by name.

use core::any::Any;
use std::collections::HashMap;

/// Lazily allocated map of typed values owned by a single element instance.
#[derive(Default)]
pub struct InternalData {
    entries: Option<HashMap<String, Box<dyn Any>>>,
}

impl InternalData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `name`, if present and of type `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.entries.as_ref()?.get(name)?.downcast_ref()
    }

    pub fn get_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.entries.as_mut()?.get_mut(name)?.downcast_mut()
    }

    /// Store `value` under `name`, returning true if an entry was replaced.
    pub fn insert<T: 'static>(&mut self, name: &str, value: T) -> bool {
        self.entries
            .get_or_insert_with(HashMap::new)
            .insert(name.to_owned(), Box::new(value))
            .is_some()
    }

    /// Remove and return the value under `name` when it has type `T`.
    /// A value of another type is left in place.
    pub fn remove<T: 'static>(&mut self, name: &str) -> Option<T> {
        let entries = self.entries.as_mut()?;
        if !entries.get(name)?.is::<T>() {
            return None;
        }
        entries.remove(name)?.downcast().ok().map(|boxed| *boxed)
    }

    /// Value under `name`, inserting `init()` first when missing.
    /// Returns `None` when `name` already holds a value of another type.
    pub fn get_or_insert_with<T: 'static>(
        &mut self,
        name: &str,
        init: impl FnOnce() -> T,
    ) -> Option<&mut T> {
        self.entries
            .get_or_insert_with(HashMap::new)
            .entry(name.to_owned())
            .or_insert_with(|| Box::new(init()))
            .downcast_mut()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.contains_key(name))
    }

    /// True until the first insertion allocates the map.
    pub fn is_unallocated(&self) -> bool {
        self.entries.is_none()
    }
}
