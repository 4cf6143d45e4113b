//! Pending attribute changes, merged by name until the next flush.

use smallvec::SmallVec;

/// One coalesced attribute change: the value before the burst and the latest value.
///
/// `None` means the attribute was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Merge-on-write map from attribute name to its pending change.
///
/// Iteration follows first-occurrence order. Most elements observe a handful of
/// attributes, so entries live inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeChangeBuffer {
    changes: SmallVec<AttributeChange, 4>,
}

impl AttributeChangeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change. A name already pending keeps its original `old` and takes
    /// the new `new`. Returns true when the change merged into an existing entry.
    pub fn set(&mut self, name: &str, old: Option<&str>, new: Option<&str>) -> bool {
        if let Some(existing) = self.changes.iter_mut().find(|change| change.name == name) {
            existing.new = new.map(str::to_owned);
            return true;
        }
        self.changes.push(AttributeChange {
            name: name.to_owned(),
            old: old.map(str::to_owned),
            new: new.map(str::to_owned),
        });
        false
    }

    pub fn get(&self, name: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|change| change.name == name)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeChange> {
        self.changes.iter()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Move every pending change out, leaving the buffer empty.
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

impl<'buf> IntoIterator for &'buf AttributeChangeBuffer {
    type Item = &'buf AttributeChange;
    type IntoIter = core::slice::Iter<'buf, AttributeChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
