#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

//! Arena DOM used as the mount container for custom elements.
//!
//! The document records every mutation as a [`DOMUpdate`] so a host runtime can
//! derive connection and attribute notifications from it, and so mirrors can
//! follow the tree without touching it directly.

extern crate alloc;

pub mod dom;
pub mod style;
pub mod template;

pub use dom::updating::{DOMMirror, DOMSubscriber, DOMUpdate};
pub use dom::{DOMNode, Document, NodeKind, SharedDocument};
pub use indextree::NodeId;
pub use style::SharedStyle;
pub use template::{Template, TemplateNode};
