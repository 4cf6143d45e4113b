//! Deferred-callback plumbing for per-frame work.
//!
//! The host supplies a [`FrameHost`] ("run this once, next frame"). On top of it,
//! [`FrameScheduler`] coalesces any number of requests made within a frame into a
//! single invocation carrying the latest payload, and [`ListFrameScheduler`]
//! accumulates discrete items into batches delivered together.

extern crate alloc;

pub mod clock;
pub mod host;
pub mod list;
pub mod single;

pub use clock::FrameClock;
pub use host::{FrameCallback, FrameHost, FrameQueue, ImmediateHost};
pub use list::{Batch, BatchConsumer, ListFrameScheduler, ListInput};
pub use single::{Consumer, FrameScheduler};
