use anyhow::{Error, anyhow};
use indextree::NodeId;
use tokio::sync::broadcast;

/// A mutation record produced by [`Document`](super::Document) and mirrored to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DOMUpdate {
    CreateElement {
        node: NodeId,
        tag: String,
    },
    CreateText {
        node: NodeId,
        text: String,
    },
    InsertNode {
        parent: NodeId,
        node: NodeId,
        pos: usize,
    },
    /// `value` is `None` when the attribute was removed.
    SetAttr {
        node: NodeId,
        name: String,
        old: Option<String>,
        value: Option<String>,
    },
    SetText {
        node: NodeId,
        text: String,
    },
    RemoveNode {
        node: NodeId,
        parent: NodeId,
    },
    AttachShadow {
        host: NodeId,
        root: NodeId,
    },
    /// The subtree rooted at `node` entered the live tree.
    Connected {
        node: NodeId,
    },
    /// The subtree rooted at `node` left the live tree.
    Disconnected {
        node: NodeId,
    },
}

/// A subscriber that receives `DOMUpdate` values and mirrors them into its own state.
pub trait DOMSubscriber {
    /// Apply a single `DOMUpdate` to the subscriber state.
    ///
    /// # Errors
    /// Implementations return an error when the update cannot be mirrored.
    fn apply_update(&mut self, update: DOMUpdate) -> Result<(), Error>;
}

/// Follows a broadcast stream of update batches and applies them to a subscriber.
pub struct DOMMirror<T: DOMSubscriber> {
    in_updater: broadcast::Receiver<Vec<DOMUpdate>>,
    mirror: T,
}

impl<T: DOMSubscriber> DOMMirror<T> {
    pub const fn new(in_updater: broadcast::Receiver<Vec<DOMUpdate>>, mirror: T) -> Self {
        Self { in_updater, mirror }
    }

    /// Drain and apply every pending batch without blocking.
    ///
    /// Lagged batches are skipped; the mirror is expected to tolerate gaps.
    ///
    /// # Errors
    /// Returns an error if the sender was dropped or the subscriber rejects an update.
    pub fn try_update_sync(&mut self) -> Result<(), Error> {
        use tokio::sync::broadcast::error::TryRecvError;
        loop {
            match self.in_updater.try_recv() {
                Ok(batch) => {
                    for update in batch {
                        self.mirror.apply_update(update)?;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("DOM mirror lagged behind by {skipped} batches");
                }
                Err(TryRecvError::Closed) => {
                    return Err(anyhow!("DOM update channel was closed"));
                }
            }
        }
        Ok(())
    }

    pub const fn mirror(&self) -> &T {
        &self.mirror
    }

    pub const fn mirror_mut(&mut self) -> &mut T {
        &mut self.mirror
    }
}
