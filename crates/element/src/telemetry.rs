//! Lifecycle counters and their JSON line format.
//! Kept independent of lifecycle internals; the host aggregates and emits them.

use core::ops::AddAssign;

use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleCounters {
    /// Completed first renders.
    pub renders: u64,
    /// Attribute notifications received from the host.
    pub notifications: u64,
    /// Notifications dropped because the element was not mounted yet.
    pub ignored_before_mount: u64,
    /// Notifications merged into an already pending change.
    pub coalesced: u64,
    pub flushes: u64,
    pub hook_calls: u64,
    /// Flushes cut short by [`crate::UpdateFlow::Stop`].
    pub early_stops: u64,
}

impl AddAssign for LifecycleCounters {
    fn add_assign(&mut self, other: Self) {
        self.renders += other.renders;
        self.notifications += other.notifications;
        self.ignored_before_mount += other.ignored_before_mount;
        self.coalesced += other.coalesced;
        self.flushes += other.flushes;
        self.hook_calls += other.hook_calls;
        self.early_stops += other.early_stops;
    }
}

pub fn counters_json(counters: &LifecycleCounters) -> String {
    serde_json::to_string(counters).unwrap_or_else(|_| String::from("{}"))
}

/// Log one telemetry line when enabled.
pub fn maybe_emit(enabled: bool, json_line: &str) {
    if enabled {
        info!(target: "elements::telemetry", "{json_line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_line_names_every_counter() {
        let counters = LifecycleCounters {
            renders: 1,
            flushes: 2,
            ..LifecycleCounters::default()
        };
        let value: serde_json::Value = serde_json::from_str(&counters_json(&counters)).unwrap();
        assert_eq!(value["renders"], 1);
        assert_eq!(value["flushes"], 2);
        assert_eq!(value["early_stops"], 0);
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn counters_add_up() {
        let mut total = LifecycleCounters::default();
        total += LifecycleCounters {
            coalesced: 2,
            ..LifecycleCounters::default()
        };
        total += LifecycleCounters {
            coalesced: 3,
            hook_calls: 1,
            ..LifecycleCounters::default()
        };
        assert_eq!(total.coalesced, 5);
        assert_eq!(total.hook_calls, 1);
    }
}
