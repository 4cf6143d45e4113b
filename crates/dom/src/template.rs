//! Reusable structural templates and small DOM-builder helpers.
//!
//! A [`Template`] is described once (typically per element type) and cloned into
//! a fresh container for every instance.

use anyhow::Error;
use indextree::NodeId;

use crate::dom::Document;

/// Declarative description of a node and its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<TemplateNode>,
    },
    Text(String),
}

impl TemplateNode {
    pub fn element(tag: &str) -> Self {
        Self::Element {
            tag: tag.to_owned(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text_node(text: &str) -> Self {
        Self::Text(text.to_owned())
    }

    /// Add an attribute. Has no effect on text nodes.
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        if let Self::Element { attrs, .. } = &mut self {
            attrs.push((name.to_owned(), value.to_owned()));
        }
        self
    }

    /// Append a child. Has no effect on text nodes.
    #[must_use]
    pub fn child(mut self, node: Self) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    /// Append a text child.
    #[must_use]
    pub fn text(self, text: &str) -> Self {
        self.child(Self::text_node(text))
    }

    fn build(&self, doc: &mut Document, parent: NodeId) -> Result<NodeId, Error> {
        match self {
            Self::Element {
                tag,
                attrs,
                children,
            } => {
                let node = doc.create_element(tag);
                for (name, value) in attrs {
                    doc.set_attribute(node, name, value)?;
                }
                for child in children {
                    child.build(doc, node)?;
                }
                doc.append_child(parent, node)?;
                Ok(node)
            }
            Self::Text(text) => {
                let node = doc.create_text(text);
                doc.append_child(parent, node)?;
                Ok(node)
            }
        }
    }
}

/// An ordered list of template roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    roots: Vec<TemplateNode>,
}

impl Template {
    pub const fn new() -> Self {
        Self { roots: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, node: TemplateNode) -> Self {
        self.roots.push(node);
        self
    }

    pub fn roots(&self) -> &[TemplateNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl Document {
    /// Clone every root of `template` into `parent`, returning the created roots.
    ///
    /// Subtrees are assembled detached and inserted last, so each root produces a
    /// single connection record.
    ///
    /// # Errors
    /// Returns an error if `parent` cannot hold children.
    pub fn instantiate(&mut self, template: &Template, parent: NodeId) -> Result<Vec<NodeId>, Error> {
        template
            .roots
            .iter()
            .map(|root| root.build(self, parent))
            .collect()
    }

    /// Build a single node description below `parent`.
    ///
    /// # Errors
    /// Returns an error if `parent` cannot hold children.
    pub fn build(&mut self, parent: NodeId, node: &TemplateNode) -> Result<NodeId, Error> {
        node.build(self, parent)
    }
}
