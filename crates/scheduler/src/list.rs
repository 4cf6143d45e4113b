//! Batching frame scheduler for sequences of discrete items.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::mem;

use anyhow::Result;
use log::{error, trace};

use crate::host::FrameHost;

/// What a producer hands to [`ListFrameScheduler::schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListInput<T> {
    /// Discard everything buffered so far; the consumer sees a [`Batch::Reset`].
    Reset,
    Item(T),
    Items(Vec<T>),
}

impl<T> From<Vec<T>> for ListInput<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Items(items)
    }
}

/// What the consumer receives, one call per batch, in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch<T> {
    Reset,
    Items(Vec<T>),
}

pub type BatchConsumer<T> = Rc<dyn Fn(Batch<T>) -> Result<()>>;

struct ListSlot<T> {
    batches: Vec<Batch<T>>,
    armed: bool,
}

impl<T> ListSlot<T> {
    fn push(&mut self, input: ListInput<T>) {
        match input {
            ListInput::Reset => {
                if !self.batches.is_empty() {
                    trace!("list scheduler: reset dropped {} batches", self.batches.len());
                }
                self.batches = vec![Batch::Reset, Batch::Items(Vec::new())];
            }
            ListInput::Item(item) => self.append(Some(item)),
            ListInput::Items(items) => self.append(items),
        }
    }

    /// Extend the last item batch, opening one when the buffer is empty or ends in a reset.
    fn append(&mut self, items: impl IntoIterator<Item = T>) {
        match self.batches.last_mut() {
            Some(Batch::Items(current)) => current.extend(items),
            Some(Batch::Reset) | None => self.batches.push(Batch::Items(items.into_iter().collect())),
        }
    }
}

/// Accumulates items into batches and delivers them together on the next frame.
///
/// Items scheduled before a frame are appended to the current batch. A
/// [`ListInput::Reset`] discards the buffer and opens a fresh batch behind a
/// [`Batch::Reset`] marker.
///
/// The consumer never receives an empty [`Batch::Items`]: the batch opened by a
/// reset is delivered only once it holds an item, so a reset with nothing
/// after it arrives as the marker alone. This holds for frames and for
/// [`ListFrameScheduler::call`].
pub struct ListFrameScheduler<T> {
    slot: Rc<RefCell<ListSlot<T>>>,
    host: Rc<dyn FrameHost>,
    consumer: BatchConsumer<T>,
}

impl<T: 'static> ListFrameScheduler<T> {
    pub fn new<F>(host: Rc<dyn FrameHost>, consumer: F) -> Self
    where
        F: Fn(Batch<T>) -> Result<()> + 'static,
    {
        Self {
            slot: Rc::new(RefCell::new(ListSlot {
                batches: Vec::new(),
                armed: false,
            })),
            host,
            consumer: Rc::new(consumer),
        }
    }

    pub fn schedule(&self, input: impl Into<ListInput<T>>) {
        let arm = {
            let mut slot = self.slot.borrow_mut();
            slot.push(input.into());
            !mem::replace(&mut slot.armed, true)
        };
        if !arm {
            return;
        }
        let slot = Rc::clone(&self.slot);
        let consumer = Rc::clone(&self.consumer);
        self.host.run_next(Box::new(move || {
            let batches = {
                let mut slot = slot.borrow_mut();
                slot.armed = false;
                mem::take(&mut slot.batches)
            };
            deliver(&consumer, batches)
        }));
    }

    /// Deliver synchronously.
    ///
    /// With `Some(input)` the buffer is first replaced by `input` alone; with `None`
    /// whatever is buffered is delivered. Either way the buffer ends up empty. A
    /// scheduled frame stays armed and finds nothing to deliver.
    ///
    /// # Errors
    /// Returns the first error raised by the consumer.
    pub fn call(&self, input: Option<ListInput<T>>) -> Result<()> {
        let batches = {
            let mut slot = self.slot.borrow_mut();
            if let Some(input) = input {
                slot.batches.clear();
                slot.push(input);
            }
            mem::take(&mut slot.batches)
        };
        deliver(&self.consumer, batches)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.borrow().armed
    }

    /// Number of non-empty batches waiting for delivery.
    pub fn pending_batches(&self) -> usize {
        self.slot
            .borrow()
            .batches
            .iter()
            .filter(|batch| !is_empty_batch(batch))
            .count()
    }
}

fn is_empty_batch<T>(batch: &Batch<T>) -> bool {
    matches!(batch, Batch::Items(items) if items.is_empty())
}

/// Hand every batch to the consumer, even after a failure, and return the first error.
fn deliver<T>(consumer: &BatchConsumer<T>, batches: Vec<Batch<T>>) -> Result<()> {
    let mut first_error = None;
    for batch in batches {
        if is_empty_batch(&batch) {
            continue;
        }
        if let Err(err) = consumer(batch) {
            error!("list scheduler: consumer failed: {err:#}");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
