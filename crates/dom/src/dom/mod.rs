use alloc::rc::Rc;
use anyhow::{Error, anyhow, bail};
use core::cell::RefCell;
use indextree::{Arena, NodeId};
use log::trace;
use smallvec::SmallVec;

use crate::style::SharedStyle;
use updating::DOMUpdate;

mod printing;
pub mod updating;

/// A document shared between the host runtime and the deferred callbacks it schedules.
pub type SharedDocument = Rc<RefCell<Document>>;

#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
    },
    Text {
        text: String,
    },
    /// Style-scoped container attached to an element. Styles adopted here apply
    /// only to the subtree below it.
    ShadowRoot {
        adopted: Vec<SharedStyle>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DOMNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
}

impl DOMNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: SmallVec::new(),
        }
    }
}

/// Arena-backed document tree.
///
/// Nodes are created detached and become part of the live tree once they are
/// appended below the root. Every mutation is recorded and can be drained with
/// [`Document::take_updates`].
pub struct Document {
    dom: Arena<DOMNode>,
    root: NodeId,
    updates: Vec<DOMUpdate>,
}

impl Document {
    pub fn new() -> Self {
        let mut dom = Arena::new();
        Self {
            root: dom.new_node(DOMNode::default()),
            dom,
            updates: Vec::new(),
        }
    }

    /// Wrap a fresh document for sharing with frame callbacks.
    pub fn shared() -> SharedDocument {
        Rc::new(RefCell::new(Self::new()))
    }

    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Drain the mutation records accumulated since the last call.
    pub fn take_updates(&mut self) -> Vec<DOMUpdate> {
        core::mem::take(&mut self.updates)
    }

    /// Records accumulated since the last drain, oldest first.
    pub fn pending_updates(&self) -> &[DOMUpdate] {
        &self.updates
    }

    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let node = self.dom.new_node(DOMNode::with_kind(NodeKind::Element { tag: tag.clone() }));
        self.updates.push(DOMUpdate::CreateElement { node, tag });
        node
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.dom.new_node(DOMNode::with_kind(NodeKind::Text {
            text: text.to_owned(),
        }));
        self.updates.push(DOMUpdate::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    /// Append `child` as the last child of `parent`, detaching it from any previous parent.
    ///
    /// # Errors
    /// Returns an error if either node is unknown, if `parent` cannot hold children,
    /// or if the insertion would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        match &self.node(parent)?.kind {
            NodeKind::Text { .. } => bail!("text node {parent:?} cannot have children"),
            NodeKind::Document | NodeKind::Element { .. } | NodeKind::ShadowRoot { .. } => {}
        }
        match &self.node(child)?.kind {
            NodeKind::Document => bail!("the document root cannot be inserted"),
            NodeKind::ShadowRoot { .. } => bail!("shadow root {child:?} is owned by its host"),
            NodeKind::Element { .. } | NodeKind::Text { .. } => {}
        }
        if parent.ancestors(&self.dom).any(|ancestor| ancestor == child) {
            bail!("cannot insert {child:?} into its own subtree");
        }
        if self.parent(child).is_some() {
            self.remove(child)?;
        }
        let pos = self.children(parent).len();
        parent
            .checked_append(child, &mut self.dom)
            .map_err(|err| anyhow!("cannot append {child:?} to {parent:?}: {err}"))?;
        self.updates.push(DOMUpdate::InsertNode {
            parent,
            node: child,
            pos,
        });
        if self.is_connected(parent) {
            self.updates.push(DOMUpdate::Connected { node: child });
        }
        Ok(())
    }

    /// Detach `node` from its parent. The subtree stays alive and can be re-inserted.
    ///
    /// # Errors
    /// Returns an error if the node is unknown or is the document root.
    pub fn remove(&mut self, node: NodeId) -> Result<(), Error> {
        if node == self.root {
            bail!("the document root cannot be removed");
        }
        self.node(node)?;
        let Some(parent) = self.parent(node) else {
            trace!("remove({node:?}): already detached");
            return Ok(());
        };
        let was_connected = self.is_connected(node);
        node.detach(&mut self.dom);
        self.updates.push(DOMUpdate::RemoveNode { node, parent });
        if was_connected {
            self.updates.push(DOMUpdate::Disconnected { node });
        }
        Ok(())
    }

    /// Set an attribute, returning the previous value.
    ///
    /// # Errors
    /// Returns an error if the node is unknown or is not an element.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<Option<String>, Error> {
        let attrs = self.element_attrs_mut(node)?;
        let name = name.to_ascii_lowercase();
        let old = if let Some(slot) = attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(core::mem::replace(&mut slot.1, value.to_owned()))
        } else {
            attrs.push((name.clone(), value.to_owned()));
            None
        };
        self.updates.push(DOMUpdate::SetAttr {
            node,
            name,
            old: old.clone(),
            value: Some(value.to_owned()),
        });
        Ok(old)
    }

    /// Remove an attribute, returning the previous value. Removing a missing
    /// attribute records nothing.
    ///
    /// # Errors
    /// Returns an error if the node is unknown or is not an element.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<Option<String>, Error> {
        let attrs = self.element_attrs_mut(node)?;
        let name = name.to_ascii_lowercase();
        let Some(index) = attrs.iter().position(|(key, _)| *key == name) else {
            return Ok(None);
        };
        let (_, old) = attrs.remove(index);
        self.updates.push(DOMUpdate::SetAttr {
            node,
            name,
            old: Some(old.clone()),
            value: None,
        });
        Ok(Some(old))
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        let node_ref = self.dom.get(node)?;
        node_ref
            .get()
            .attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.dom
            .get(node)
            .into_iter()
            .flat_map(|node_ref| node_ref.get().attrs.iter())
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Replace the contents of a text node.
    ///
    /// # Errors
    /// Returns an error if the node is unknown or is not a text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), Error> {
        let node_ref = self
            .dom
            .get_mut(node)
            .ok_or_else(|| anyhow!("unknown node {node:?}"))?;
        match &mut node_ref.get_mut().kind {
            NodeKind::Text { text: current } => {
                text.clone_into(current);
            }
            NodeKind::Document | NodeKind::Element { .. } | NodeKind::ShadowRoot { .. } => {
                bail!("{node:?} is not a text node");
            }
        }
        self.updates.push(DOMUpdate::SetText {
            node,
            text: text.to_owned(),
        });
        Ok(())
    }

    /// Replace every light-DOM child of `node` with a single text node.
    ///
    /// A lone text child is rewritten in place. Otherwise the old children are
    /// removed: text nodes are freed, elements are only detached so their
    /// disconnection can still be observed.
    ///
    /// # Errors
    /// Returns an error if the node cannot hold children.
    pub fn replace_text_content(&mut self, node: NodeId, text: &str) -> Result<NodeId, Error> {
        let children = self.children(node);
        if let [only] = children.as_slice()
            && self.text(*only).is_some()
        {
            self.set_text(*only, text)?;
            return Ok(*only);
        }
        for child in children {
            self.remove(child)?;
            if self.text(child).is_some() {
                child.remove_subtree(&mut self.dom);
            }
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node)?;
        Ok(text_node)
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.dom.get(node)?.get().kind {
            NodeKind::Text { text } => Some(text.as_str()),
            NodeKind::Document | NodeKind::Element { .. } | NodeKind::ShadowRoot { .. } => None,
        }
    }

    /// Concatenated text of the light-DOM subtree below `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.text(node) {
            out.push_str(text);
            return;
        }
        for child in self.children(node) {
            self.collect_text(child, out);
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.dom.get(node)?.get().kind {
            NodeKind::Element { tag } => Some(tag.as_str()),
            NodeKind::Document | NodeKind::Text { .. } | NodeKind::ShadowRoot { .. } => None,
        }
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.dom.get(node).map(|node_ref| &node_ref.get().kind)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.dom.get(node).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom.get(node)?.parent()
    }

    /// Light-DOM children; the shadow root of a host is not one of them.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if !self.contains(node) {
            return Vec::new();
        }
        node.children(&self.dom)
            .filter(|child| !self.is_shadow_root(*child))
            .collect()
    }

    /// Pre-order traversal including `node` itself and every shadow tree below it.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        if !self.contains(node) {
            return Vec::new();
        }
        node.descendants(&self.dom).collect()
    }

    /// True when `node` is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(node) && node.ancestors(&self.dom).any(|ancestor| ancestor == self.root)
    }

    fn is_shadow_root(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::ShadowRoot { .. }))
    }

    /// Attach a style-scoped container to `host`. Attaching twice returns the existing root.
    ///
    /// # Errors
    /// Returns an error if `host` is unknown or is not an element.
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, Error> {
        if self.tag(host).is_none() {
            bail!("shadow roots can only be attached to elements, got {host:?}");
        }
        if let Some(existing) = self.shadow_root(host) {
            return Ok(existing);
        }
        let root = self
            .dom
            .new_node(DOMNode::with_kind(NodeKind::ShadowRoot { adopted: Vec::new() }));
        host.checked_prepend(root, &mut self.dom)
            .map_err(|err| anyhow!("cannot attach shadow root to {host:?}: {err}"))?;
        self.updates.push(DOMUpdate::AttachShadow { host, root });
        Ok(root)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        if !self.contains(host) {
            return None;
        }
        host.children(&self.dom).find(|child| self.is_shadow_root(*child))
    }

    /// Adopt shared styles into a shadow root without copying their text.
    ///
    /// # Errors
    /// Returns an error if `root` is not a shadow root.
    pub fn adopt_styles(&mut self, root: NodeId, styles: &[SharedStyle]) -> Result<(), Error> {
        let node_ref = self
            .dom
            .get_mut(root)
            .ok_or_else(|| anyhow!("unknown node {root:?}"))?;
        match &mut node_ref.get_mut().kind {
            NodeKind::ShadowRoot { adopted } => {
                for style in styles {
                    if !adopted.iter().any(|existing| existing.ptr_eq(style)) {
                        adopted.push(style.clone());
                    }
                }
                Ok(())
            }
            NodeKind::Document | NodeKind::Element { .. } | NodeKind::Text { .. } => {
                Err(anyhow!("{root:?} is not a shadow root"))
            }
        }
    }

    pub fn adopted_styles(&self, root: NodeId) -> &[SharedStyle] {
        match self.kind(root) {
            Some(NodeKind::ShadowRoot { adopted }) => adopted,
            _ => &[],
        }
    }

    /// Find the first element with the given `id` below `scope`, without crossing
    /// into nested shadow trees.
    pub fn find_by_id(&self, scope: NodeId, id: &str) -> Option<NodeId> {
        if !self.contains(scope) {
            return None;
        }
        let mut stack = vec![scope];
        while let Some(current) = stack.pop() {
            if self.attribute(current, "id") == Some(id) && self.tag(current).is_some() {
                return Some(current);
            }
            let mut children: Vec<NodeId> = current
                .children(&self.dom)
                .filter(|child| !self.is_shadow_root(*child))
                .collect();
            children.reverse();
            stack.extend(children);
        }
        None
    }

    fn node(&self, node: NodeId) -> Result<&DOMNode, Error> {
        self.dom
            .get(node)
            .filter(|node_ref| !node_ref.is_removed())
            .map(indextree::Node::get)
            .ok_or_else(|| anyhow!("unknown node {node:?}"))
    }

    fn element_attrs_mut(
        &mut self,
        node: NodeId,
    ) -> Result<&mut SmallVec<(String, String), 4>, Error> {
        let node_ref = self
            .dom
            .get_mut(node)
            .ok_or_else(|| anyhow!("unknown node {node:?}"))?;
        let data = node_ref.get_mut();
        match data.kind {
            NodeKind::Element { .. } => Ok(&mut data.attrs),
            NodeKind::Document | NodeKind::Text { .. } | NodeKind::ShadowRoot { .. } => {
                Err(anyhow!("{node:?} is not an element"))
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_div(doc: &mut Document) -> NodeId {
        let div = doc.create_element("div");
        doc.append_child(doc.root(), div).unwrap();
        div
    }

    #[test]
    fn append_to_root_emits_connected() {
        let mut doc = Document::new();
        let div = connected_div(&mut doc);
        let updates = doc.take_updates();
        assert!(matches!(updates[0], DOMUpdate::CreateElement { node, .. } if node == div));
        assert!(matches!(updates[1], DOMUpdate::InsertNode { node, pos: 0, .. } if node == div));
        assert!(matches!(updates[2], DOMUpdate::Connected { node } if node == div));
        assert!(!doc.has_updates());
    }

    #[test]
    fn detached_subtree_is_not_connected() {
        let mut doc = Document::new();
        let outer = doc.create_element("section");
        let inner = doc.create_element("p");
        doc.append_child(outer, inner).unwrap();
        assert!(!doc.is_connected(inner));
        let updates = doc.take_updates();
        assert!(!updates.iter().any(|update| matches!(update, DOMUpdate::Connected { .. })));

        doc.append_child(doc.root(), outer).unwrap();
        assert!(doc.is_connected(inner));
    }

    #[test]
    fn remove_reports_disconnected_only_for_live_nodes() {
        let mut doc = Document::new();
        let div = connected_div(&mut doc);
        doc.take_updates();
        doc.remove(div).unwrap();
        let updates = doc.take_updates();
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[1], DOMUpdate::Disconnected { node } if node == div));

        doc.remove(div).unwrap();
        assert!(!doc.has_updates());
    }

    #[test]
    fn cycles_are_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner).unwrap();
        assert!(doc.append_child(inner, outer).is_err());
        assert!(doc.append_child(outer, outer).is_err());
    }

    #[test]
    fn text_nodes_cannot_have_children() {
        let mut doc = Document::new();
        let text = doc.create_text("hi");
        let span = doc.create_element("span");
        assert!(doc.append_child(text, span).is_err());
        assert!(doc.set_attribute(text, "id", "x").is_err());
    }

    #[test]
    fn set_attribute_returns_previous_value() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        assert_eq!(doc.set_attribute(div, "Title", "a").unwrap(), None);
        assert_eq!(doc.set_attribute(div, "title", "b").unwrap().as_deref(), Some("a"));
        assert_eq!(doc.attribute(div, "TITLE"), Some("b"));
        assert_eq!(doc.remove_attribute(div, "title").unwrap().as_deref(), Some("b"));
        assert_eq!(doc.remove_attribute(div, "title").unwrap(), None);
        assert!(!doc.has_attribute(div, "title"));
    }

    #[test]
    fn shadow_root_is_idempotent_and_hidden_from_children() {
        let mut doc = Document::new();
        let host = connected_div(&mut doc);
        let light = doc.create_text("light");
        doc.append_child(host, light).unwrap();
        let root = doc.attach_shadow(host).unwrap();
        assert_eq!(doc.attach_shadow(host).unwrap(), root);
        assert_eq!(doc.children(host), vec![light]);
        assert!(doc.is_connected(root));
        assert_eq!(doc.text_content(host), "light");
    }

    #[test]
    fn adopted_styles_are_deduplicated() {
        let mut doc = Document::new();
        let host = doc.create_element("ui-card");
        let root = doc.attach_shadow(host).unwrap();
        let shared = SharedStyle::new(":host { display: block; }");
        doc.adopt_styles(root, &[shared.clone(), shared.clone()]).unwrap();
        assert_eq!(doc.adopted_styles(root).len(), 1);
        assert!(doc.adopt_styles(host, &[shared]).is_err());
    }

    #[test]
    fn find_by_id_stays_within_one_shadow_tree() {
        let mut doc = Document::new();
        let host = connected_div(&mut doc);
        let root = doc.attach_shadow(host).unwrap();
        let label = doc.create_element("span");
        doc.set_attribute(label, "id", "label").unwrap();
        doc.append_child(root, label).unwrap();

        assert_eq!(doc.find_by_id(root, "label"), Some(label));
        assert_eq!(doc.find_by_id(doc.root(), "label"), None);
    }

    #[test]
    fn replace_text_content_rewrites_a_lone_text_child() {
        let mut doc = Document::new();
        let div = connected_div(&mut doc);
        let first = doc.create_text("one");
        doc.append_child(div, first).unwrap();
        doc.take_updates();

        let second = doc.replace_text_content(div, "two").unwrap();
        assert_eq!(second, first);
        assert_eq!(doc.text_content(div), "two");
        assert!(matches!(doc.take_updates().as_slice(), [DOMUpdate::SetText { node, .. }] if *node == first));
    }

    #[test]
    fn replace_text_content_frees_text_and_detaches_elements() {
        let mut doc = Document::new();
        let div = connected_div(&mut doc);
        let first = doc.create_text("one");
        let span = doc.create_element("span");
        doc.append_child(div, first).unwrap();
        doc.append_child(div, span).unwrap();
        let slots = doc.dom.len();

        let text = doc.replace_text_content(div, "two").unwrap();
        assert_eq!(doc.children(div), vec![text]);
        assert!(!doc.contains(first));
        assert!(doc.contains(span));
        assert!(!doc.is_connected(span));
        assert_eq!(doc.dom.len(), slots);

        for round in 0..10 {
            doc.replace_text_content(div, &round.to_string()).unwrap();
        }
        assert_eq!(doc.dom.len(), slots);
    }
}
