#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

//! Host runtime for custom elements: the registry of defined tags, upgrade of
//! matching nodes, and delivery of connection and attribute notifications derived
//! from the document's mutation records.

extern crate alloc;

mod host;
mod registry;

pub use host::ElementHost;
pub use registry::validate_tag;
