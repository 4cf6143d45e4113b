//! Keyed multi-subscriber callback registries.
//!
//! [`EventHub`] fans one call out to every listener and collects their results;
//! [`CircularHub`] threads a single accumulating value through its listeners.
//! Both dispatch synchronously, in registration order, on the calling thread.

pub mod circular;
pub mod hub;
mod registry;

pub use circular::{Circulation, CircularHub, Merge};
pub use hub::{Dispatch, EventHub};
pub use registry::{HubKey, SubscriptionChange};
