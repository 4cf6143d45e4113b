//! Style resources shared between many style-scoped containers.

use alloc::rc::Rc;
use core::fmt;

/// A stylesheet body that any number of shadow roots can adopt without copying.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SharedStyle(Rc<str>);

impl SharedStyle {
    pub fn new(css: &str) -> Self {
        Self(Rc::from(css))
    }

    pub fn css(&self) -> &str {
        &self.0
    }

    /// True when both handles refer to the same resource, not merely equal text.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedStyle {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(out, "SharedStyle({} bytes)", self.0.len())
    }
}

impl From<&str> for SharedStyle {
    fn from(css: &str) -> Self {
        Self::new(css)
    }
}
