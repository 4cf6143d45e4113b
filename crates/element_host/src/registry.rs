//! Tag to element-type definitions.

use alloc::rc::Rc;
use std::collections::HashMap;

use anyhow::{Result, bail};
use dom::{NodeId, SharedDocument};
use element::{CustomElement, ElementConfig, ElementHandle, ElementLifecycle};
use scheduler::FrameHost;

/// Builds a lifecycle for a freshly upgraded node.
pub(crate) type Spawner =
    Box<dyn Fn(NodeId, SharedDocument, Rc<ElementConfig>, Rc<dyn FrameHost>) -> Rc<dyn ElementHandle>>;

pub(crate) struct Definition {
    pub(crate) base_name: &'static str,
    pub(crate) spawn: Spawner,
}

#[derive(Default)]
pub(crate) struct Registry {
    definitions: HashMap<String, Definition>,
}

impl Registry {
    pub(crate) fn define<E, F>(&mut self, tag: &str, factory: F) -> Result<()>
    where
        E: CustomElement,
        F: Fn() -> E + 'static,
    {
        validate_tag(tag)?;
        if let Some(existing) = self.definitions.get(tag) {
            bail!("<{tag}> is already defined by `{}`", existing.base_name);
        }
        let spawn: Spawner = Box::new(move |node, document, config, frames| {
            ElementLifecycle::spawn(factory(), node, document, config, frames) as Rc<dyn ElementHandle>
        });
        self.definitions.insert(
            tag.to_owned(),
            Definition {
                base_name: E::BASE_NAME,
                spawn,
            },
        );
        Ok(())
    }

    pub(crate) fn get(&self, tag: &str) -> Option<&Definition> {
        self.definitions.get(tag)
    }

    pub(crate) fn tags(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

/// Custom element tags are lowercase ASCII, start with a letter and contain a hyphen.
pub fn validate_tag(tag: &str) -> Result<()> {
    if !tag.starts_with(|ch: char| ch.is_ascii_lowercase()) {
        bail!("tag `{tag}` must start with a lowercase ASCII letter");
    }
    if !tag.contains('-') {
        bail!("tag `{tag}` must contain a hyphen");
    }
    if let Some(bad) = tag
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '.')))
    {
        bail!("tag `{tag}` contains invalid character {bad:?}");
    }
    Ok(())
}
