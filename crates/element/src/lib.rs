#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

//! Custom element core.
//!
//! A concrete element implements [`CustomElement`]; an [`ElementLifecycle`] wraps it
//! and turns host notifications into one first render followed by attribute
//! updates coalesced into at most one flush per frame.

extern crate alloc;

pub mod attributes;
pub mod config;
pub mod data;
pub mod hooks;
pub mod lifecycle;
pub mod telemetry;

pub use attributes::{AttributeChange, AttributeChangeBuffer};
pub use config::ElementConfig;
pub use data::InternalData;
pub use hooks::{CustomElement, ElementContext, HookPhase, Isolation, UpdateFlow, UpdateMode};
pub use lifecycle::{ElementHandle, ElementLifecycle, LifecycleState};
pub use telemetry::LifecycleCounters;
