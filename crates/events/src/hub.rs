//! Fan-out hub: one call, every listener, results collected per key.

use crate::registry::{HubKey, Registry, SubscriptionChange};

type Callback<P, R, A> = Box<dyn Fn(&A, &P) -> R>;

struct Listener<P, R, A> {
    callback: Callback<P, R, A>,
    args: A,
}

/// Result of [`EventHub::call`].
///
/// The shape depends on how many listeners fired: nothing, a bare result for the
/// common single-listener case, or every result keyed by subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<R> {
    Empty,
    Single(R),
    Keyed(Vec<(HubKey, R)>),
}

impl<R> Dispatch<R> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Number of listeners that fired.
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(_) => 1,
            Self::Keyed(results) => results.len(),
        }
    }

    /// Result for `key`. Only keyed dispatches carry keys.
    pub fn get(&self, key: &HubKey) -> Option<&R> {
        match self {
            Self::Keyed(results) => results
                .iter()
                .find(|(existing, _)| existing == key)
                .map(|(_, result)| result),
            Self::Empty | Self::Single(_) => None,
        }
    }

    pub fn into_single(self) -> Option<R> {
        match self {
            Self::Single(result) => Some(result),
            Self::Empty | Self::Keyed(_) => None,
        }
    }

    /// Every result in firing order, whatever the shape.
    pub fn into_values(self) -> Vec<R> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(result) => vec![result],
            Self::Keyed(results) => results.into_iter().map(|(_, result)| result).collect(),
        }
    }
}

/// Keyed registry of callbacks invoked with `params: P`, returning `R`.
///
/// Each listener may carry fixed arguments `A`, passed ahead of the call parameters.
pub struct EventHub<P, R = (), A = ()> {
    registry: Registry<Listener<P, R, A>>,
}

impl<P, R, A> EventHub<P, R, A> {
    pub const fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Register `callback` under `key` with fixed arguments, replacing any previous entry.
    pub fn add_with<F>(&mut self, key: impl Into<HubKey>, args: A, callback: F)
    where
        F: Fn(&A, &P) -> R + 'static,
    {
        self.registry.insert(
            key.into(),
            Listener {
                callback: Box::new(callback),
                args,
            },
        );
    }

    /// Register under a freshly minted key and return it.
    pub fn push_with<F>(&mut self, args: A, callback: F) -> HubKey
    where
        F: Fn(&A, &P) -> R + 'static,
    {
        let key = self.registry.fresh_key();
        self.add_with(key.clone(), args, callback);
        key
    }

    /// Remove the entry for `key`. The subscription sub-hub is notified either way.
    pub fn remove(&mut self, key: &HubKey) -> bool {
        self.registry.remove(key).is_some()
    }

    pub fn has(&self, key: &HubKey) -> bool {
        self.registry.contains(key)
    }

    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn have_events(&self) -> bool {
        self.count() > 0
    }

    /// Keys in firing order.
    pub fn keys(&self) -> impl Iterator<Item = &HubKey> {
        self.registry.iter().map(|(key, _)| key)
    }

    /// Drop every entry without per-entry removal notifications.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Invoke every listener in registration order.
    pub fn call(&self, params: &P) -> Dispatch<R> {
        let mut results: Vec<(HubKey, R)> = self
            .registry
            .iter()
            .map(|(key, listener)| (key.clone(), (listener.callback)(&listener.args, params)))
            .collect();
        match results.len() {
            0 => Dispatch::Empty,
            1 => match results.pop() {
                Some((_, result)) => Dispatch::Single(result),
                None => Dispatch::Empty,
            },
            _ => Dispatch::Keyed(results),
        }
    }

    /// Sub-hub notified when subscriptions are added or removed. Created on first access.
    pub fn subscriptions(&mut self) -> &mut EventHub<SubscriptionChange> {
        self.registry.watchers()
    }
}

impl<P, R, A: Default> EventHub<P, R, A> {
    /// Register `callback` under `key`, replacing any previous entry.
    pub fn add<F>(&mut self, key: impl Into<HubKey>, callback: F)
    where
        F: Fn(&P) -> R + 'static,
    {
        self.add_with(key, A::default(), move |_, params| callback(params));
    }

    /// Register under a freshly minted key and return it.
    pub fn push<F>(&mut self, callback: F) -> HubKey
    where
        F: Fn(&P) -> R + 'static,
    {
        self.push_with(A::default(), move |_, params| callback(params))
    }
}

impl<P, R, A> Default for EventHub<P, R, A> {
    fn default() -> Self {
        Self::new()
    }
}
