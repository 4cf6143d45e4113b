//! Last-value-wins frame scheduler.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::mem;

use anyhow::Result;
use log::trace;

use crate::host::FrameHost;

/// Consumer invoked with a payload, once per frame at most through [`FrameScheduler::schedule`].
pub type Consumer<T> = Rc<dyn Fn(T) -> Result<()>>;

struct Slot<T> {
    payload: Option<T>,
    armed: bool,
}

/// Coalesces any number of `schedule` calls made before a frame into one consumer
/// call carrying the latest payload.
///
/// `call` is an independent, synchronous entry point: it neither consumes the
/// pending payload nor disarms a scheduled frame.
pub struct FrameScheduler<T> {
    slot: Rc<RefCell<Slot<T>>>,
    host: Rc<dyn FrameHost>,
    consumer: Consumer<T>,
}

impl<T: 'static> FrameScheduler<T> {
    pub fn new<F>(host: Rc<dyn FrameHost>, consumer: F) -> Self
    where
        F: Fn(T) -> Result<()> + 'static,
    {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                payload: None,
                armed: false,
            })),
            host,
            consumer: Rc::new(consumer),
        }
    }

    /// Record `value` as the latest payload and arm a deferred run if idle.
    pub fn schedule(&self, value: T) {
        let arm = {
            let mut slot = self.slot.borrow_mut();
            if slot.payload.replace(value).is_some() {
                trace!("frame scheduler: payload superseded");
            }
            !mem::replace(&mut slot.armed, true)
        };
        if !arm {
            return;
        }
        let slot = Rc::clone(&self.slot);
        let consumer = Rc::clone(&self.consumer);
        self.host.run_next(Box::new(move || {
            // Disarm before invoking so the consumer may schedule the next frame.
            let payload = {
                let mut slot = slot.borrow_mut();
                slot.armed = false;
                slot.payload.take()
            };
            payload.map_or(Ok(()), |value| consumer(value))
        }));
    }

    /// Invoke the consumer now with `value`, leaving any scheduled run untouched.
    ///
    /// # Errors
    /// Returns whatever the consumer returns.
    pub fn call(&self, value: T) -> Result<()> {
        (self.consumer)(value)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.borrow().armed
    }

    pub fn has_pending(&self) -> bool {
        self.slot.borrow().payload.is_some()
    }
}
