use core::fmt;
use log::trace;

use crate::hub::EventHub;

/// Subscription key. Callers pick `Named` keys; `push` mints `Generated` ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HubKey {
    Named(String),
    Generated(u64),
}

impl From<&str> for HubKey {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for HubKey {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Display for HubKey {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => out.write_str(name),
            Self::Generated(id) => write!(out, "#{id}"),
        }
    }
}

/// Notification fired on a hub's subscription sub-hub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionChange {
    Added(HubKey),
    /// Fired for every `remove` call. `existed` is false when the key was not registered.
    Removed { key: HubKey, existed: bool },
}

/// Insertion-ordered keyed storage shared by the hub flavours.
pub(crate) struct Registry<L> {
    entries: Vec<(HubKey, L)>,
    next_generated: u64,
    watchers: Option<Box<EventHub<SubscriptionChange>>>,
}

impl<L> Registry<L> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_generated: 0,
            watchers: None,
        }
    }

    /// Insert or overwrite. An overwritten key keeps its original firing position.
    pub(crate) fn insert(&mut self, key: HubKey, listener: L) {
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = listener;
        } else {
            self.entries.push((key.clone(), listener));
        }
        trace!("hub: subscribed {key}");
        self.notify(&SubscriptionChange::Added(key));
    }

    /// Mint a key that no live entry uses.
    pub(crate) fn fresh_key(&mut self) -> HubKey {
        loop {
            self.next_generated = self.next_generated.wrapping_add(1);
            let key = HubKey::Generated(self.next_generated);
            if !self.contains(&key) {
                return key;
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &HubKey) -> Option<L> {
        let position = self.entries.iter().position(|(existing, _)| existing == key);
        self.notify(&SubscriptionChange::Removed {
            key: key.clone(),
            existed: position.is_some(),
        });
        let (_, listener) = self.entries.remove(position?);
        trace!("hub: unsubscribed {key}");
        Some(listener)
    }

    pub(crate) fn contains(&self, key: &HubKey) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&HubKey, &L)> {
        self.entries.iter().map(|(key, listener)| (key, listener))
    }

    pub(crate) fn watchers(&mut self) -> &mut EventHub<SubscriptionChange> {
        self.watchers.get_or_insert_with(|| Box::new(EventHub::new()))
    }

    fn notify(&self, change: &SubscriptionChange) {
        if let Some(watchers) = &self.watchers {
            watchers.call(change);
        }
    }
}
