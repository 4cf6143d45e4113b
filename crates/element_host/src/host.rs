use alloc::rc::Rc;
use core::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Error, Result, anyhow};
use dom::{DOMMirror, DOMSubscriber, DOMUpdate, Document, NodeId, SharedDocument, TemplateNode};
use element::telemetry::{counters_json, maybe_emit};
use element::{
    CustomElement, ElementConfig, ElementHandle, ElementLifecycle, LifecycleCounters, LifecycleState,
};
use log::{debug, trace, warn};
use scheduler::{FrameClock, FrameHost, FrameQueue};
use tokio::sync::broadcast;
use tracing::info_span;

use crate::registry::Registry;

/// Capacity of the mutation broadcast channel. Mirrors that fall further behind lag.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Host runtime for custom elements.
///
/// Owns the document, the element registry and the frame queue. Document
/// mutations are turned into lifecycle notifications by [`ElementHost::pump`],
/// which every mutating host method runs before returning.
pub struct ElementHost {
    document: SharedDocument,
    config: Rc<ElementConfig>,
    frames: Rc<FrameQueue>,
    clock: FrameClock,
    registry: Registry,
    instances: HashMap<NodeId, Rc<dyn ElementHandle>>,
    /// Attribute records written on a host before its first render finished.
    /// The render already read them, so they are not delivered again.
    superseded: HashMap<NodeId, usize>,
    updater: broadcast::Sender<Vec<DOMUpdate>>,
}

impl ElementHost {
    pub fn new(config: ElementConfig) -> Self {
        let (updater, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            document: Document::shared(),
            clock: FrameClock::new(config.frame_budget()),
            config: Rc::new(config),
            frames: Rc::new(FrameQueue::new()),
            registry: Registry::default(),
            instances: HashMap::new(),
            superseded: HashMap::new(),
            updater,
        }
    }

    pub fn config(&self) -> &ElementConfig {
        &self.config
    }

    /// Shared handle to the document. Mutations made through it are delivered on
    /// the next [`ElementHost::pump`].
    pub fn document(&self) -> SharedDocument {
        Rc::clone(&self.document)
    }

    pub fn root(&self) -> Result<NodeId> {
        Ok(self.document_ref()?.root())
    }

    /// Register `E` under the configured tag for its base name.
    ///
    /// # Errors
    /// Returns an error if the tag is invalid, already defined, or if upgrading
    /// existing elements fails.
    pub fn define<E: CustomElement>(&mut self, factory: impl Fn() -> E + 'static) -> Result<String> {
        let tag = self.config.tag_name(E::BASE_NAME);
        self.define_as(&tag, factory)?;
        Ok(tag)
    }

    /// Register `E` under an explicit tag. Connected elements already carrying the
    /// tag are upgraded and connected.
    ///
    /// # Errors
    /// Returns an error if the tag is invalid, already defined, or if upgrading
    /// existing elements fails.
    pub fn define_as<E: CustomElement>(&mut self, tag: &str, factory: impl Fn() -> E + 'static) -> Result<()> {
        self.registry.define(tag, factory)?;
        debug!("defined <{tag}> as `{}`", E::BASE_NAME);
        self.upgrade_existing(tag)
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.registry.get(tag).is_some()
    }

    pub fn defined_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.registry.tags().map(str::to_owned).collect();
        tags.sort();
        tags
    }

    fn upgrade_existing(&mut self, tag: &str) -> Result<()> {
        let existing: Vec<NodeId> = {
            let document = self.document_ref()?;
            document
                .descendants(document.root())
                .into_iter()
                .filter(|node| document.tag(*node) == Some(tag))
                .filter(|node| !self.instances.contains_key(node))
                .collect()
        };
        let mut first_error = None;
        for node in existing {
            if let Some(handle) = self.upgrade(node, tag) {
                record(&mut first_error, self.connect(&handle, &[]));
            }
        }
        record(&mut first_error, self.pump().map(|_processed| ()));
        first_error.map_or(Ok(()), Err)
    }

    fn upgrade(&mut self, node: NodeId, tag: &str) -> Option<Rc<dyn ElementHandle>> {
        if self.instances.contains_key(&node) {
            return None;
        }
        let definition = self.registry.get(tag)?;
        let handle = (definition.spawn)(
            node,
            Rc::clone(&self.document),
            Rc::clone(&self.config),
            Rc::clone(&self.frames) as Rc<dyn FrameHost>,
        );
        debug!("upgraded <{tag}> at {node:?}");
        self.instances.insert(node, Rc::clone(&handle));
        Some(handle)
    }

    /// # Errors
    /// Returns lifecycle errors raised while delivering the creation.
    pub fn create_element(&mut self, tag: &str) -> Result<NodeId> {
        let node = self.document_mut()?.create_element(tag);
        self.pump()?;
        Ok(node)
    }

    /// # Errors
    /// Returns an error if the document is borrowed elsewhere.
    pub fn create_text(&mut self, text: &str) -> Result<NodeId> {
        let node = self.document_mut()?.create_text(text);
        self.pump()?;
        Ok(node)
    }

    /// Append `child` to `parent`. Custom elements entering the live tree render
    /// before this returns.
    ///
    /// # Errors
    /// Returns structural errors from the document and render errors.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.document_mut()?.append_child(parent, child)?;
        self.pump()?;
        Ok(())
    }

    /// Build `node` under `parent` and deliver the result.
    ///
    /// # Errors
    /// Returns structural errors from the document and render errors.
    pub fn build(&mut self, parent: NodeId, node: &TemplateNode) -> Result<NodeId> {
        let built = self.document_mut()?.build(parent, node)?;
        self.pump()?;
        Ok(built)
    }

    /// # Errors
    /// Returns structural errors from the document and unload hook errors.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.document_mut()?.remove(node)?;
        self.pump()?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if `node` is not an element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<Option<String>> {
        let old = self.document_mut()?.set_attribute(node, name, value)?;
        self.pump()?;
        Ok(old)
    }

    /// # Errors
    /// Returns an error if `node` is not an element.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<Option<String>> {
        let old = self.document_mut()?.remove_attribute(node, name)?;
        self.pump()?;
        Ok(old)
    }

    /// Drain mutation records until the document is quiet.
    ///
    /// Each batch is broadcast to mirrors, then delivered: defined tags are
    /// upgraded, connections and disconnections reach instances in tree order and
    /// observed attribute changes are buffered. Every record is delivered even when
    /// a hook fails; the first error is returned. Returns the number of records.
    ///
    /// # Errors
    /// Returns the first lifecycle error raised during delivery.
    pub fn pump(&mut self) -> Result<usize> {
        let _span = info_span!("elements.pump").entered();
        let mut processed = 0;
        let mut first_error = None;
        loop {
            let updates = self.document_mut()?.take_updates();
            if updates.is_empty() {
                break;
            }
            processed += updates.len();
            if self.updater.receiver_count() > 0 && self.updater.send(updates.clone()).is_err() {
                trace!("no mirror received {} updates", updates.len());
            }
            for (index, update) in updates.iter().enumerate() {
                let later = updates.get(index + 1..).unwrap_or_default();
                record(&mut first_error, self.deliver(update, later));
            }
        }
        first_error.map_or(Ok(processed), Err)
    }

    /// `later` holds the records of the same batch that follow `update`.
    fn deliver(&mut self, update: &DOMUpdate, later: &[DOMUpdate]) -> Result<()> {
        match update {
            DOMUpdate::CreateElement { node, tag } => {
                self.upgrade(*node, tag);
                Ok(())
            }
            DOMUpdate::Connected { node } => {
                let mut first_error = None;
                for handle in self.instances_below(*node, true)? {
                    record(&mut first_error, self.connect(&handle, later));
                }
                first_error.map_or(Ok(()), Err)
            }
            DOMUpdate::Disconnected { node } => {
                let mut first_error = None;
                for handle in self.instances_below(*node, false)? {
                    record(&mut first_error, handle.disconnected());
                }
                first_error.map_or(Ok(()), Err)
            }
            DOMUpdate::SetAttr { node, name, .. } if self.skip_superseded(*node) => {
                trace!("`{name}` on {node:?} was read by its first render");
                Ok(())
            }
            DOMUpdate::SetAttr {
                node,
                name,
                old,
                value,
            } => match self.instances.get(node) {
                Some(handle) if handle.observes(name) => {
                    handle.attribute_changed(name, old.as_deref(), value.as_deref())
                }
                Some(_) => {
                    trace!("`{name}` on {node:?} is not observed");
                    Ok(())
                }
                None => Ok(()),
            },
            DOMUpdate::CreateText { .. }
            | DOMUpdate::InsertNode { .. }
            | DOMUpdate::SetText { .. }
            | DOMUpdate::RemoveNode { .. }
            | DOMUpdate::AttachShadow { .. } => Ok(()),
        }
    }

    /// Deliver a connection. When it runs the first render, attribute records of
    /// the element that are still undelivered, whether queued before the render
    /// or by its hooks, are marked as already seen.
    fn connect(&mut self, handle: &Rc<dyn ElementHandle>, later: &[DOMUpdate]) -> Result<()> {
        let rendering = handle.state()? == LifecycleState::Constructed;
        handle.connected()?;
        if !rendering || handle.state()? == LifecycleState::Constructed {
            return Ok(());
        }
        let host = handle.host()?;
        let written = later
            .iter()
            .chain(self.document_ref()?.pending_updates())
            .filter(|update| matches!(update, DOMUpdate::SetAttr { node, .. } if *node == host))
            .count();
        if written > 0 {
            trace!("{written} attribute writes on {host:?} were read by its first render");
            *self.superseded.entry(host).or_default() += written;
        }
        Ok(())
    }

    /// Consume one superseded attribute record of `node`, if any is left.
    fn skip_superseded(&mut self, node: NodeId) -> bool {
        let Some(remaining) = self.superseded.remove(&node) else {
            return false;
        };
        if remaining > 1 {
            self.superseded.insert(node, remaining - 1);
        }
        true
    }

    /// Instances in the subtree of `node`, in tree order, provided the subtree is
    /// still in the connection state the record announced.
    fn instances_below(&self, node: NodeId, connected: bool) -> Result<Vec<Rc<dyn ElementHandle>>> {
        let document = self.document_ref()?;
        if document.is_connected(node) != connected {
            trace!("{node:?} changed connection again before delivery");
            return Ok(Vec::new());
        }
        Ok(document
            .descendants(node)
            .into_iter()
            .filter_map(|descendant| self.instances.get(&descendant).map(Rc::clone))
            .collect())
    }

    /// Run the frame callbacks queued before this call, then deliver what they changed.
    ///
    /// Callbacks queued while the frame runs wait for the next one. Returns the
    /// number of callbacks run.
    ///
    /// # Errors
    /// Returns the first callback error, or else the first delivery error.
    pub fn run_frame(&mut self) -> Result<usize> {
        let _span = info_span!("elements.frame", frame = self.frames.frame_count() + 1).entered();
        let ran = self.frames.run_frame();
        let pumped = self.pump();
        self.emit_telemetry_if_enabled();
        let ran = ran?;
        pumped?;
        Ok(ran)
    }

    /// Run a frame if the frame budget allows it now.
    ///
    /// # Errors
    /// Returns frame errors.
    pub fn tick(&mut self) -> Result<Option<usize>> {
        self.tick_at(Instant::now())
    }

    /// Run a frame if the frame budget allows it at `now`; otherwise count the
    /// tick as deferred and return `None`.
    ///
    /// # Errors
    /// Returns frame errors.
    pub fn tick_at(&mut self, now: Instant) -> Result<Option<usize>> {
        if self.clock.allow_at(now) {
            return self.run_frame().map(Some);
        }
        self.clock.incr_deferred();
        trace!("tick deferred ({} so far)", self.clock.deferred());
        Ok(None)
    }

    pub fn deferred_ticks(&self) -> u64 {
        self.clock.deferred()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.frame_count()
    }

    /// Callbacks waiting for the next frame.
    pub fn pending_frame_callbacks(&self) -> usize {
        self.frames.pending()
    }

    pub fn instance(&self, node: NodeId) -> Option<Rc<dyn ElementHandle>> {
        self.instances.get(&node).map(Rc::clone)
    }

    /// Typed access to the lifecycle of the element at `node`. Mutations made by
    /// `action` are delivered before this returns.
    ///
    /// # Errors
    /// Returns an error if `node` is not an upgraded `E`, if the lifecycle is
    /// borrowed, or whatever `action` or the delivery returns.
    pub fn with_element<E, R>(
        &mut self,
        node: NodeId,
        action: impl FnOnce(&mut ElementLifecycle<E>) -> Result<R>,
    ) -> Result<R>
    where
        E: CustomElement,
    {
        let handle = self
            .instance(node)
            .ok_or_else(|| anyhow!("{node:?} is not an upgraded custom element"))?;
        let result = {
            let cell = handle
                .as_any()
                .downcast_ref::<RefCell<ElementLifecycle<E>>>()
                .ok_or_else(|| {
                    anyhow!("{node:?} is `{}`, not `{}`", handle.base_name(), E::BASE_NAME)
                })?;
            let mut lifecycle = cell
                .try_borrow_mut()
                .map_err(|_| anyhow!("`{}` at {node:?} is already borrowed", E::BASE_NAME))?;
            action(&mut lifecycle)
        };
        let pumped = self.pump();
        let value = result?;
        pumped?;
        Ok(value)
    }

    /// Flush the element at `node` immediately instead of waiting for the frame.
    ///
    /// # Errors
    /// Returns hook errors.
    pub fn flush_now(&mut self, node: NodeId) -> Result<()> {
        let handle = self
            .instance(node)
            .ok_or_else(|| anyhow!("{node:?} is not an upgraded custom element"))?;
        let flushed = handle.flush_now();
        let pumped = self.pump();
        flushed?;
        pumped?;
        Ok(())
    }

    /// Receiver for every batch of mutation records the host delivers.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<DOMUpdate>> {
        self.updater.subscribe()
    }

    pub fn create_mirror<T: DOMSubscriber>(&self, mirror: T) -> DOMMirror<T> {
        DOMMirror::new(self.subscribe(), mirror)
    }

    /// Sum of every instance's counters. Instances borrowed right now are skipped.
    pub fn counters(&self) -> LifecycleCounters {
        let mut total = LifecycleCounters::default();
        for handle in self.instances.values() {
            match handle.counters() {
                Ok(counters) => total += counters,
                Err(err) => warn!("skipping counters: {err}"),
            }
        }
        total
    }

    fn emit_telemetry_if_enabled(&self) {
        if !self.config.telemetry_enabled {
            return;
        }
        maybe_emit(true, &counters_json(&self.counters()));
    }

    fn document_ref(&self) -> Result<core::cell::Ref<'_, Document>> {
        self.document
            .try_borrow()
            .map_err(|_| anyhow!("document is mutably borrowed"))
    }

    fn document_mut(&self) -> Result<RefMut<'_, Document>> {
        self.document
            .try_borrow_mut()
            .map_err(|_| anyhow!("document is already borrowed"))
    }
}

/// Keep the first error; later ones are only logged.
fn record(first_error: &mut Option<Error>, outcome: Result<()>) {
    if let Err(err) = outcome {
        if first_error.is_some() {
            warn!("further lifecycle error: {err:#}");
        } else {
            *first_error = Some(err);
        }
    }
}
