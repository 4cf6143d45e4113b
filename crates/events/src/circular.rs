//! Chained hub: listeners refine a single value in turn instead of answering independently.

use core::hash::{BuildHasher, Hash};
use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::hub::EventHub;
use crate::registry::{HubKey, Registry, SubscriptionChange};

/// Shallow merge of a partial value into a running result.
///
/// Keys present in `patch` overwrite existing keys; nested values are replaced, not merged.
pub trait Merge {
    fn merge(&mut self, patch: Self);
}

impl Merge for Map<String, Value> {
    fn merge(&mut self, patch: Self) {
        for (key, value) in patch {
            self.insert(key, value);
        }
    }
}

impl<K: Eq + Hash, V, S: BuildHasher> Merge for HashMap<K, V, S> {
    fn merge(&mut self, patch: Self) {
        self.extend(patch);
    }
}

impl<K: Ord, V> Merge for BTreeMap<K, V> {
    fn merge(&mut self, patch: Self) {
        self.extend(patch);
    }
}

/// The value travelling through a [`CircularHub`].
#[derive(Debug, Clone, PartialEq)]
pub struct Circulation<S, A> {
    pub value: S,
    /// Fixed arguments of the listener currently running (or the last one that ran).
    pub defaults_params: Option<A>,
}

type CircularCallback<S, A> = Box<dyn Fn(&Circulation<S, A>) -> Option<S>>;

struct CircularListener<S, A> {
    callback: CircularCallback<S, A>,
    args: A,
}

/// Keyed registry whose listeners each see the result accumulated so far.
pub struct CircularHub<S, A = ()> {
    registry: Registry<CircularListener<S, A>>,
}

impl<S, A> CircularHub<S, A> {
    pub const fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn add_with<F>(&mut self, key: impl Into<HubKey>, args: A, callback: F)
    where
        F: Fn(&Circulation<S, A>) -> Option<S> + 'static,
    {
        self.registry.insert(
            key.into(),
            CircularListener {
                callback: Box::new(callback),
                args,
            },
        );
    }

    pub fn push_with<F>(&mut self, args: A, callback: F) -> HubKey
    where
        F: Fn(&Circulation<S, A>) -> Option<S> + 'static,
    {
        let key = self.registry.fresh_key();
        self.add_with(key.clone(), args, callback);
        key
    }

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

    pub fn clear(&mut self) {
        self.registry.clear();
    }

    pub fn subscriptions(&mut self) -> &mut EventHub<SubscriptionChange> {
        self.registry.watchers()
    }
}

impl<S: Merge, A: Clone> CircularHub<S, A> {
    /// Thread `seed` through every listener in registration order.
    ///
    /// Before each listener runs, `defaults_params` is replaced by that listener's
    /// fixed arguments. A returned patch is merged into the running value; on key
    /// conflicts the later listener wins.
    pub fn call(&self, seed: S) -> Circulation<S, A> {
        let mut state = Circulation {
            value: seed,
            defaults_params: None,
        };
        for (_, listener) in self.registry.iter() {
            state.defaults_params = Some(listener.args.clone());
            if let Some(patch) = (listener.callback)(&state) {
                state.value.merge(patch);
            }
        }
        state
    }
}

impl<S, A: Default> CircularHub<S, A> {
    pub fn add<F>(&mut self, key: impl Into<HubKey>, callback: F)
    where
        F: Fn(&Circulation<S, A>) -> Option<S> + 'static,
    {
        self.add_with(key, A::default(), callback);
    }

    pub fn push<F>(&mut self, callback: F) -> HubKey
    where
        F: Fn(&Circulation<S, A>) -> Option<S> + 'static,
    {
        self.push_with(A::default(), callback)
    }
}

impl<S, A> Default for CircularHub<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn each_listener_sees_previous_result() {
        let mut hub: CircularHub<Map<String, Value>> = CircularHub::new();
        hub.add("width", |_| Some(object(json!({ "width": 10 }))));
        hub.add("area", |state| {
            let width = state.value.get("width").and_then(Value::as_i64).unwrap_or(0);
            Some(object(json!({ "area": width * 2 })))
        });
        let result = hub.call(object(json!({ "height": 2 })));
        assert_eq!(Value::Object(result.value), json!({ "height": 2, "width": 10, "area": 20 }));
    }

    #[test]
    fn none_leaves_value_untouched() {
        let mut hub: CircularHub<BTreeMap<&'static str, i32>> = CircularHub::new();
        hub.push(|_| None);
        let seed = BTreeMap::from([("a", 1)]);
        assert_eq!(hub.call(seed.clone()).value, seed);
    }
}
