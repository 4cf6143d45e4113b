//! The "run this once, next frame" capability and its two stock implementations.

use alloc::collections::VecDeque;
use core::cell::{Cell, RefCell};
use core::mem;

use anyhow::Result;
use log::{debug, error};

/// A one-shot deferred callback. Errors are reported to whoever runs the frame.
pub type FrameCallback = Box<dyn FnOnce() -> Result<()>>;

/// Host primitive equivalent to an animation-frame request.
pub trait FrameHost {
    /// Run `callback` once, after the current pass.
    fn run_next(&self, callback: FrameCallback);
}

/// Manually stepped frame queue.
///
/// Callbacks requested while a frame is running are kept for the following frame,
/// matching how a browser treats `requestAnimationFrame` calls made from inside a
/// frame callback.
#[derive(Default)]
pub struct FrameQueue {
    queue: RefCell<VecDeque<FrameCallback>>,
    frames: Cell<u64>,
}

impl FrameQueue {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Number of frames run so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }

    /// Run every callback queued before this call.
    ///
    /// All callbacks run even when one fails. Every failure is logged and the first
    /// one is returned. On success returns how many callbacks ran.
    ///
    /// # Errors
    /// Returns the first error produced by a callback of this frame.
    pub fn run_frame(&self) -> Result<usize> {
        let batch = mem::take(&mut *self.queue.borrow_mut());
        self.frames.set(self.frames.get().saturating_add(1));
        let ran = batch.len();
        let mut first_error = None;
        for callback in batch {
            if let Err(err) = callback() {
                error!("frame {}: callback failed: {err:#}", self.frames.get());
                first_error.get_or_insert(err);
            }
        }
        debug!("frame {}: ran {ran} callbacks", self.frames.get());
        first_error.map_or(Ok(ran), Err)
    }
}

impl FrameHost for FrameQueue {
    fn run_next(&self, callback: FrameCallback) {
        self.queue.borrow_mut().push_back(callback);
    }
}

/// Runs every callback synchronously inside `run_next`.
///
/// There is no caller to hand errors back to, so they are logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateHost;

impl FrameHost for ImmediateHost {
    fn run_next(&self, callback: FrameCallback) {
        if let Err(err) = callback() {
            error!("immediate frame callback failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use anyhow::anyhow;

    #[test]
    fn callbacks_queued_during_a_frame_wait_for_the_next() {
        let queue = Rc::new(FrameQueue::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner_queue = Rc::clone(&queue);
        let sink = Rc::clone(&order);
        queue.run_next(Box::new(move || {
            sink.borrow_mut().push("first");
            let later = Rc::clone(&sink);
            inner_queue.run_next(Box::new(move || {
                later.borrow_mut().push("second");
                Ok(())
            }));
            Ok(())
        }));

        assert_eq!(queue.run_frame().unwrap(), 1);
        assert_eq!(*order.borrow(), vec!["first"]);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.run_frame().unwrap(), 1);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert_eq!(queue.frame_count(), 2);
    }

    #[test]
    fn failing_callback_does_not_starve_the_rest() {
        let queue = FrameQueue::new();
        let ran = Rc::new(Cell::new(0));
        queue.run_next(Box::new(|| Err(anyhow!("boom"))));
        let counter = Rc::clone(&ran);
        queue.run_next(Box::new(move || {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        queue.run_next(Box::new(|| Err(anyhow!("second"))));

        let err = queue.run_frame().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(ran.get(), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn immediate_host_runs_inline() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        ImmediateHost.run_next(Box::new(move || {
            flag.set(true);
            Ok(())
        }));
        assert!(ran.get());
    }
}
