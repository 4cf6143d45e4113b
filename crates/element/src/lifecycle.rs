//! Two-phase element lifecycle: one idempotent first render, then batched
//! incremental updates at most once per frame.
//!
//! A lifecycle is always owned through `Rc<RefCell<_>>`. Its frame scheduler holds
//! a weak handle back to it, so a flush requested for an element that has since
//! been dropped does nothing.

use alloc::rc::{Rc, Weak};
use core::any::Any;
use core::cell::RefCell;

use anyhow::{Result, anyhow};
use dom::{NodeId, SharedDocument};
use log::{debug, trace, warn};
use scheduler::{FrameHost, FrameScheduler};

use crate::attributes::AttributeChangeBuffer;
use crate::config::ElementConfig;
use crate::data::InternalData;
use crate::hooks::{CustomElement, ElementContext, HookPhase, Isolation, UpdateFlow, UpdateMode};
use crate::telemetry::LifecycleCounters;

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Rendering,
    Mounted,
    /// Mounted with a flush scheduled and not yet run.
    FlushArmed,
    Unmounting,
    Destroyed,
}

/// Runtime state wrapped around one concrete element.
pub struct ElementLifecycle<E: CustomElement> {
    element: E,
    host: NodeId,
    document: SharedDocument,
    config: Rc<ElementConfig>,
    frames: Rc<dyn FrameHost>,
    state: LifecycleState,
    /// Set by the first successful render and never cleared.
    mounted: bool,
    container: NodeId,
    data: InternalData,
    pending: AttributeChangeBuffer,
    scheduler: FrameScheduler<()>,
    counters: LifecycleCounters,
}

impl<E: CustomElement> ElementLifecycle<E> {
    /// Wrap `element` for the node `host`. Flushes are requested from `frames`.
    pub fn spawn(
        element: E,
        host: NodeId,
        document: SharedDocument,
        config: Rc<ElementConfig>,
        frames: Rc<dyn FrameHost>,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let target = Weak::clone(weak);
            let scheduler = FrameScheduler::new(Rc::clone(&frames), move |()| {
                let Some(lifecycle) = target.upgrade() else {
                    trace!("flush for dropped element {host:?} skipped");
                    return Ok(());
                };
                let mut lifecycle = lifecycle
                    .try_borrow_mut()
                    .map_err(|_| anyhow!("element {host:?} is busy; its scheduled flush could not run"))?;
                lifecycle.flush()
            });
            RefCell::new(Self {
                element,
                host,
                document,
                config,
                frames,
                state: LifecycleState::Constructed,
                mounted: false,
                container: host,
                data: InternalData::new(),
                pending: AttributeChangeBuffer::new(),
                scheduler,
                counters: LifecycleCounters::default(),
            })
        })
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut E {
        &mut self.element
    }

    pub fn data(&self) -> &InternalData {
        &self.data
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn pending(&self) -> &AttributeChangeBuffer {
        &self.pending
    }

    pub fn counters(&self) -> LifecycleCounters {
        self.counters
    }

    pub fn state(&self) -> LifecycleState {
        match self.state {
            LifecycleState::Mounted if self.scheduler.is_armed() => LifecycleState::FlushArmed,
            state => state,
        }
    }

    /// First render. Does nothing once the element has mounted.
    ///
    /// A failed render leaves the element unmounted and the error is returned.
    ///
    /// # Errors
    /// Returns the first error raised by a render hook or by the document.
    pub fn render(&mut self) -> Result<()> {
        if self.mounted {
            trace!("render of {:?} skipped: already mounted", self.host);
            return Ok(());
        }
        self.state = LifecycleState::Rendering;
        if let Err(err) = self.render_steps() {
            self.state = LifecycleState::Constructed;
            return Err(err.context(format!("rendering <{}> failed", E::BASE_NAME)));
        }
        self.mounted = true;
        self.state = LifecycleState::Mounted;
        self.counters.renders += 1;
        debug!("rendered <{}> at {:?}", E::BASE_NAME, self.host);
        Ok(())
    }

    fn render_steps(&mut self) -> Result<()> {
        self.run_hook(HookPhase::PreLoad, |element, ctx| element.pre_load(ctx))?;
        self.container = self.mount_container()?;
        if let Some(template) = self.element.template() {
            let mut document = self
                .document
                .try_borrow_mut()
                .map_err(|_| anyhow!("document is borrowed"))?;
            document.instantiate(template, self.container)?;
        }
        self.run_hook(HookPhase::BuildDom, |element, ctx| element.build_dom(ctx))?;
        self.run_hook(HookPhase::Attach, |element, ctx| element.attach(ctx))
    }

    /// Resolve the container and, when scoped, install the element's styles in it.
    fn mount_container(&self) -> Result<NodeId> {
        let mut document = self
            .document
            .try_borrow_mut()
            .map_err(|_| anyhow!("document is borrowed"))?;
        match self.element.isolation() {
            Isolation::Light => Ok(self.host),
            Isolation::Scoped => {
                let root = document.attach_shadow(self.host)?;
                if let Some(css) = self.element.style() {
                    let style = document.create_element("style");
                    let text = document.create_text(css);
                    document.append_child(style, text)?;
                    document.append_child(root, style)?;
                }
                let shared = self.element.shared_styles();
                if !shared.is_empty() {
                    document.adopt_styles(root, &shared)?;
                }
                Ok(root)
            }
        }
    }

    /// The host inserted the element into the live tree.
    ///
    /// # Errors
    /// Returns render errors.
    pub fn connected(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Constructed => self.render(),
            LifecycleState::Unmounting | LifecycleState::Destroyed => {
                warn!(
                    "<{}> at {:?} re-connected after removal; it will not render again",
                    E::BASE_NAME,
                    self.host
                );
                Ok(())
            }
            LifecycleState::Rendering | LifecycleState::Mounted | LifecycleState::FlushArmed => Ok(()),
        }
    }

    /// The host removed the element from the live tree.
    ///
    /// Both unload hooks run even if the first fails; the first error is returned.
    /// An element that never mounted has nothing to unload.
    ///
    /// # Errors
    /// Returns the first error raised by an unload hook.
    pub fn disconnected(&mut self) -> Result<()> {
        if !self.mounted || self.state == LifecycleState::Destroyed {
            trace!("disconnect of {:?} ignored in state {:?}", self.host, self.state);
            return Ok(());
        }
        self.state = LifecycleState::Unmounting;
        let unloaded = self.run_hook(HookPhase::PreUnload, |element, ctx| element.pre_unload(ctx));
        let detached = self.run_hook(HookPhase::Detach, |element, ctx| element.detach(ctx));
        self.state = LifecycleState::Destroyed;
        debug!("destroyed <{}> at {:?}", E::BASE_NAME, self.host);
        unloaded.and(detached)
    }

    /// The host observed a change of `name` from `old` to `new`.
    ///
    /// Ignored until mounted. Afterwards the change is buffered and one flush is
    /// requested for the next frame.
    pub fn attribute_changed(&mut self, name: &str, old: Option<&str>, new: Option<&str>) {
        self.counters.notifications += 1;
        if !self.mounted {
            self.counters.ignored_before_mount += 1;
            trace!("`{name}` on {:?} ignored: not mounted", self.host);
            return;
        }
        if self.pending.set(name, old, new) {
            self.counters.coalesced += 1;
            trace!("`{name}` on {:?} coalesced into pending change", self.host);
        }
        self.scheduler.schedule(());
    }

    /// Dispatch every buffered change, then run the after-flush hook.
    ///
    /// The buffer is emptied before dispatch, so it ends up empty even when an
    /// update stops early or fails. Changes made by the hooks are delivered by the
    /// host afterwards and land in a later flush.
    ///
    /// While the document is borrowed elsewhere nothing is dispatched: the
    /// changes stay buffered and the flush moves to the next frame.
    ///
    /// # Errors
    /// Returns the first hook error; remaining changes of this flush are dropped.
    /// Returns an error if the flush had to be postponed.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            trace!("flush of {:?}: nothing pending", self.host);
            return Ok(());
        }
        if self.document.try_borrow_mut().is_err() {
            self.scheduler.schedule(());
            return Err(anyhow!(
                "document is borrowed; flush of <{}> postponed to the next frame",
                E::BASE_NAME
            ));
        }
        let changes = self.pending.take();
        if self.state == LifecycleState::Destroyed {
            debug!("flushing <{}> at {:?} after removal", E::BASE_NAME, self.host);
        }
        self.counters.flushes += 1;
        debug!("flushing {} changes on <{}>", changes.len(), E::BASE_NAME);
        match self.element.update_mode() {
            UpdateMode::Batch => {
                self.run_hook(HookPhase::Update, |element, ctx| element.update_all(ctx, &changes))?;
            }
            UpdateMode::PerAttribute => {
                for (index, change) in changes.iter().enumerate() {
                    let flow = self.run_hook(HookPhase::Update, |element, ctx| element.update(ctx, change))?;
                    if flow == UpdateFlow::Stop {
                        self.counters.early_stops += 1;
                        debug!(
                            "update of `{}` stopped the flush; {} changes skipped",
                            change.name,
                            changes.len() - index - 1
                        );
                        break;
                    }
                }
            }
        }
        self.run_hook(HookPhase::AfterFlush, |element, ctx| element.after_flush(ctx))
    }

    /// Flush synchronously without waiting for the frame. A scheduled flush stays
    /// armed and finds the buffer empty.
    ///
    /// # Errors
    /// Returns hook errors.
    pub fn flush_now(&mut self) -> Result<()> {
        self.flush()
    }

    /// Run `action` against the element with a hook context, e.g. to call a setter
    /// that writes to the document.
    ///
    /// # Errors
    /// Returns the error raised by `action`, or an error if the document is borrowed.
    pub fn invoke<R>(&mut self, action: impl FnOnce(&mut E, &mut ElementContext<'_>) -> Result<R>) -> Result<R> {
        self.run_hook(HookPhase::External, action)
    }

    fn run_hook<R>(
        &mut self,
        phase: HookPhase,
        hook: impl FnOnce(&mut E, &mut ElementContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut document = self.document.try_borrow_mut().map_err(|_| {
            anyhow!("document is borrowed; cannot run {phase:?} for <{}>", E::BASE_NAME)
        })?;
        let mut ctx = ElementContext {
            document: &mut *document,
            shared: &self.document,
            frames: &self.frames,
            host: self.host,
            container: self.container,
            data: &mut self.data,
            config: &self.config,
            phase,
        };
        self.counters.hook_calls += 1;
        hook(&mut self.element, &mut ctx)
    }
}

/// Type-erased view of a lifecycle, as stored by a host.
///
/// Each method borrows the lifecycle for the duration of the call and reports a
/// conflicting borrow as an error.
pub trait ElementHandle {
    fn host(&self) -> Result<NodeId>;
    fn base_name(&self) -> &'static str;
    fn observes(&self, name: &str) -> bool;
    fn state(&self) -> Result<LifecycleState>;
    fn counters(&self) -> Result<LifecycleCounters>;
    /// # Errors
    /// Returns render errors or a borrow conflict.
    fn connected(&self) -> Result<()>;
    /// # Errors
    /// Returns unload hook errors or a borrow conflict.
    fn disconnected(&self) -> Result<()>;
    /// # Errors
    /// Returns a borrow conflict.
    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) -> Result<()>;
    /// # Errors
    /// Returns hook errors or a borrow conflict.
    fn flush_now(&self) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

impl<E: CustomElement> ElementHandle for RefCell<ElementLifecycle<E>> {
    fn host(&self) -> Result<NodeId> {
        Ok(borrow(self)?.host)
    }

    fn base_name(&self) -> &'static str {
        E::BASE_NAME
    }

    fn observes(&self, name: &str) -> bool {
        E::observed_attributes().iter().any(|observed| observed.eq_ignore_ascii_case(name))
    }

    fn state(&self) -> Result<LifecycleState> {
        Ok(borrow(self)?.state())
    }

    fn counters(&self) -> Result<LifecycleCounters> {
        Ok(borrow(self)?.counters)
    }

    fn connected(&self) -> Result<()> {
        borrow_mut(self)?.connected()
    }

    fn disconnected(&self) -> Result<()> {
        borrow_mut(self)?.disconnected()
    }

    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) -> Result<()> {
        borrow_mut(self)?.attribute_changed(name, old, new);
        Ok(())
    }

    fn flush_now(&self) -> Result<()> {
        borrow_mut(self)?.flush_now()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn borrow<E: CustomElement>(cell: &RefCell<ElementLifecycle<E>>) -> Result<core::cell::Ref<'_, ElementLifecycle<E>>> {
    cell.try_borrow()
        .map_err(|_| anyhow!("<{}> is being mutated", E::BASE_NAME))
}

fn borrow_mut<E: CustomElement>(
    cell: &RefCell<ElementLifecycle<E>>,
) -> Result<core::cell::RefMut<'_, ElementLifecycle<E>>> {
    cell.try_borrow_mut()
        .map_err(|_| anyhow!("<{}> is already borrowed", E::BASE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeChange;
    use dom::Document;
    use scheduler::FrameQueue;

    #[derive(Default)]
    struct Plain {
        built: u32,
        updated: Vec<String>,
    }

    impl CustomElement for Plain {
        const BASE_NAME: &'static str = "plain";

        fn isolation(&self) -> Isolation {
            Isolation::Light
        }

        fn build_dom(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
            self.built += 1;
            Ok(())
        }

        fn update(&mut self, _ctx: &mut ElementContext<'_>, change: &AttributeChange) -> Result<UpdateFlow> {
            self.updated.push(change.name.clone());
            Ok(UpdateFlow::Continue)
        }
    }

    fn spawn_plain() -> (Rc<FrameQueue>, SharedDocument, Rc<RefCell<ElementLifecycle<Plain>>>) {
        let document = Document::shared();
        let host = document.borrow_mut().create_element("ui-plain");
        let frames = Rc::new(FrameQueue::new());
        let lifecycle = ElementLifecycle::spawn(
            Plain::default(),
            host,
            Rc::clone(&document),
            Rc::new(ElementConfig::default()),
            Rc::clone(&frames) as Rc<dyn FrameHost>,
        );
        (frames, document, lifecycle)
    }

    #[test]
    fn state_walks_through_the_lifecycle() {
        let (frames, _document, lifecycle) = spawn_plain();
        let mut instance = lifecycle.borrow_mut();
        assert_eq!(instance.state(), LifecycleState::Constructed);
        instance.connected().unwrap();
        assert_eq!(instance.state(), LifecycleState::Mounted);
        instance.attribute_changed("x", None, Some("1"));
        assert_eq!(instance.state(), LifecycleState::FlushArmed);
        drop(instance);
        frames.run_frame().unwrap();

        let mut instance = lifecycle.borrow_mut();
        assert_eq!(instance.state(), LifecycleState::Mounted);
        instance.disconnected().unwrap();
        assert_eq!(instance.state(), LifecycleState::Destroyed);
        instance.connected().unwrap();
        assert_eq!(instance.element().built, 1);
        assert!(instance.is_mounted());
    }

    #[test]
    fn flush_of_a_borrowed_lifecycle_is_an_error() {
        let (frames, _document, lifecycle) = spawn_plain();
        lifecycle.borrow_mut().render().unwrap();
        lifecycle.borrow_mut().attribute_changed("x", None, Some("1"));
        let held = lifecycle.borrow();
        assert!(frames.run_frame().is_err());
        drop(held);
    }

    #[test]
    fn flush_against_a_borrowed_document_moves_to_the_next_frame() {
        let (frames, document, lifecycle) = spawn_plain();
        lifecycle.borrow_mut().render().unwrap();
        lifecycle.borrow_mut().attribute_changed("x", None, Some("1"));

        let reading = document.borrow();
        assert!(frames.run_frame().is_err());
        drop(reading);
        {
            let instance = lifecycle.borrow();
            assert_eq!(instance.pending().len(), 1);
            assert_eq!(instance.state(), LifecycleState::FlushArmed);
        }

        assert_eq!(frames.run_frame().unwrap(), 1);
        let instance = lifecycle.borrow();
        assert_eq!(instance.element().updated, vec![String::from("x")]);
        assert!(instance.pending().is_empty());
        assert_eq!(instance.state(), LifecycleState::Mounted);
    }

    #[test]
    fn dropped_lifecycle_skips_its_flush() {
        let (frames, _document, lifecycle) = spawn_plain();
        lifecycle.borrow_mut().render().unwrap();
        lifecycle.borrow_mut().attribute_changed("x", None, Some("1"));
        drop(lifecycle);
        assert_eq!(frames.run_frame().unwrap(), 1);
    }
}
