//! Override points a concrete element implements.
//!
//! Every hook has a no-op default, so a minimal element only names itself. Hooks
//! receive an [`ElementContext`] giving them the document, their host node, the
//! resolved mount container and their private data for the duration of the call.

use alloc::rc::Rc;

use anyhow::{Result, anyhow};
use dom::{Document, NodeId, SharedDocument, SharedStyle, Template, TemplateNode};
use scheduler::FrameHost;

use crate::attributes::{AttributeChange, AttributeChangeBuffer};
use crate::config::ElementConfig;
use crate::data::InternalData;

/// Where an element mounts its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    /// A style-scoped shadow root attached to the host.
    #[default]
    Scoped,
    /// Directly under the host element.
    Light,
}

/// How buffered attribute changes are handed to the element on flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// One [`CustomElement::update`] call per changed attribute.
    #[default]
    PerAttribute,
    /// A single [`CustomElement::update_all`] call covering every change.
    Batch,
}

/// Returned by [`CustomElement::update`] to continue or end the current flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateFlow {
    #[default]
    Continue,
    /// Skip the remaining buffered changes of this flush. They are discarded.
    Stop,
}

/// Which hook an [`ElementContext`] was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreLoad,
    BuildDom,
    Attach,
    Update,
    AfterFlush,
    PreUnload,
    Detach,
    /// Called from outside the lifecycle, e.g. a setter invoked by the host user.
    External,
}

pub struct ElementContext<'ctx> {
    pub(crate) document: &'ctx mut Document,
    pub(crate) shared: &'ctx SharedDocument,
    pub(crate) frames: &'ctx Rc<dyn FrameHost>,
    pub(crate) host: NodeId,
    pub(crate) container: NodeId,
    pub(crate) data: &'ctx mut InternalData,
    pub(crate) config: &'ctx ElementConfig,
    pub(crate) phase: HookPhase,
}

impl ElementContext<'_> {
    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.document
    }

    /// Handle for work that outlives the hook, such as a frame callback. It is
    /// borrowed while the hook runs.
    pub fn shared_document(&self) -> SharedDocument {
        Rc::clone(self.shared)
    }

    /// The frame primitive this element's flushes are scheduled on.
    pub fn frames(&self) -> Rc<dyn FrameHost> {
        Rc::clone(self.frames)
    }

    /// The custom element node itself.
    pub fn host(&self) -> NodeId {
        self.host
    }

    /// The node structure is mounted into: the shadow root for scoped elements,
    /// the host otherwise. Before mounting this is the host.
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn data(&self) -> &InternalData {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut InternalData {
        self.data
    }

    pub fn config(&self) -> &ElementConfig {
        self.config
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// Current value of an attribute on the host.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.document.attribute(self.host, name)
    }

    /// Write an attribute on the host. Observed attributes written here are
    /// delivered in a later flush, never the running one.
    ///
    /// # Errors
    /// Returns an error if the host node no longer exists.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<Option<String>> {
        self.document.set_attribute(self.host, name, value)
    }

    /// # Errors
    /// Returns an error if the host node no longer exists.
    pub fn remove_attribute(&mut self, name: &str) -> Result<Option<String>> {
        self.document.remove_attribute(self.host, name)
    }

    /// Element with `id` inside this element's container.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.document.find_by_id(self.container, id)
    }

    /// Build `node` and append it to the container.
    ///
    /// # Errors
    /// Returns an error if the container can no longer hold children.
    pub fn append(&mut self, node: &TemplateNode) -> Result<NodeId> {
        self.document.build(self.container, node)
    }

    /// Replace the text content of the element with `id` inside the container.
    ///
    /// # Errors
    /// Returns an error if no such element exists.
    pub fn set_text_by_id(&mut self, id: &str, text: &str) -> Result<()> {
        let node = self
            .find_by_id(id)
            .ok_or_else(|| anyhow!("no element with id `{id}` below {:?}", self.container))?;
        self.document.replace_text_content(node, text)?;
        Ok(())
    }
}

/// A custom element: a named type with lifecycle hooks.
///
/// `BASE_NAME` has no default. The host registers the element under
/// [`ElementConfig::tag_name`] of it.
pub trait CustomElement: 'static {
    /// Base tag name, joined to the configured prefix.
    const BASE_NAME: &'static str;

    /// Attributes whose changes the host reports to [`CustomElement::update`].
    fn observed_attributes() -> &'static [&'static str] {
        &[]
    }

    fn isolation(&self) -> Isolation {
        Isolation::Scoped
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::PerAttribute
    }

    /// Style text owned by this element, injected into a scoped container.
    fn style(&self) -> Option<&str> {
        None
    }

    /// Shared style resources adopted by a scoped container.
    fn shared_styles(&self) -> Vec<SharedStyle> {
        Vec::new()
    }

    /// Structure cloned into the container before [`CustomElement::build_dom`].
    fn template(&self) -> Option<&Template> {
        None
    }

    /// Runs before any structure exists; may normalize initial attributes.
    fn pre_load(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        Ok(())
    }

    fn build_dom(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once the structure is in place, before the element counts as mounted.
    fn attach(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        Ok(())
    }

    fn pre_unload(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        Ok(())
    }

    fn detach(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut ElementContext<'_>, _change: &AttributeChange) -> Result<UpdateFlow> {
        Ok(UpdateFlow::Continue)
    }

    /// Batch counterpart of [`CustomElement::update`], used with [`UpdateMode::Batch`].
    fn update_all(&mut self, _ctx: &mut ElementContext<'_>, _changes: &AttributeChangeBuffer) -> Result<()> {
        Ok(())
    }

    fn after_flush(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        Ok(())
    }
}
