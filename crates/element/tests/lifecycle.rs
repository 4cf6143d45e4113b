//! Render idempotence and flush coalescing of the element lifecycle, driven by a
//! manually stepped frame queue.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, bail};
use dom::{Document, NodeId, SharedDocument, SharedStyle, Template, TemplateNode};
use element::{
    AttributeChange, AttributeChangeBuffer, CustomElement, ElementConfig, ElementContext,
    ElementLifecycle, Isolation, LifecycleState, UpdateFlow, UpdateMode,
};
use events::EventHub;
use scheduler::{FrameHost, FrameQueue};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

type Calls = Rc<RefCell<Vec<AttributeChange>>>;

/// Records every update; optionally stops on a given attribute or writes back to
/// its own host while updating.
#[derive(Default)]
struct Watcher {
    calls: Calls,
    builds: u32,
    stop_on: Option<&'static str>,
    echo: bool,
    flushed: u32,
}

impl CustomElement for Watcher {
    const BASE_NAME: &'static str = "watcher";

    fn observed_attributes() -> &'static [&'static str] {
        &["a", "b", "c", "value"]
    }

    fn style(&self) -> Option<&str> {
        Some(":host { display: block }")
    }

    fn build_dom(&mut self, ctx: &mut ElementContext<'_>) -> Result<()> {
        self.builds += 1;
        ctx.append(&TemplateNode::element("span").attr("id", "label").text("watcher"))?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut ElementContext<'_>, change: &AttributeChange) -> Result<UpdateFlow> {
        self.calls.borrow_mut().push(change.clone());
        if self.echo && change.name == "a" {
            ctx.set_attribute("b", "echo")?;
        }
        if self.stop_on == Some(change.name.as_str()) {
            return Ok(UpdateFlow::Stop);
        }
        Ok(UpdateFlow::Continue)
    }

    fn after_flush(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        self.flushed += 1;
        Ok(())
    }
}

struct Fixture {
    frames: Rc<FrameQueue>,
    document: SharedDocument,
    host: NodeId,
}

impl Fixture {
    fn new() -> Self {
        init_logs();
        let document = Document::shared();
        let host = document.borrow_mut().create_element("ui-watcher");
        Self {
            frames: Rc::new(FrameQueue::new()),
            document,
            host,
        }
    }

    fn spawn<E: CustomElement>(&self, element: E) -> Rc<RefCell<ElementLifecycle<E>>> {
        ElementLifecycle::spawn(
            element,
            self.host,
            Rc::clone(&self.document),
            Rc::new(ElementConfig::default()),
            Rc::clone(&self.frames) as Rc<dyn FrameHost>,
        )
    }

    /// Set the attribute in the document and notify the lifecycle, as a host would.
    fn mutate<E: CustomElement>(&self, lifecycle: &Rc<RefCell<ElementLifecycle<E>>>, name: &str, value: &str) {
        let old = self
            .document
            .borrow_mut()
            .set_attribute(self.host, name, value)
            .unwrap();
        lifecycle
            .borrow_mut()
            .attribute_changed(name, old.as_deref(), Some(value));
    }
}

fn names(calls: &Calls) -> Vec<String> {
    calls.borrow().iter().map(|change| change.name.clone()).collect()
}

#[test]
fn burst_on_one_attribute_yields_one_update() {
    let fixture = Fixture::new();
    let watcher = Watcher::default();
    let calls = Rc::clone(&watcher.calls);
    let lifecycle = fixture.spawn(watcher);
    fixture
        .document
        .borrow_mut()
        .set_attribute(fixture.host, "value", "start")
        .unwrap();
    lifecycle.borrow_mut().render().unwrap();

    for value in ["1", "2", "3", "4"] {
        fixture.mutate(&lifecycle, "value", value);
    }
    assert!(calls.borrow().is_empty());
    assert_eq!(fixture.frames.pending(), 1);

    fixture.frames.run_frame().unwrap();
    assert_eq!(
        *calls.borrow(),
        vec![AttributeChange {
            name: String::from("value"),
            old: Some(String::from("start")),
            new: Some(String::from("4")),
        }]
    );
    let counters = lifecycle.borrow().counters();
    assert_eq!(counters.coalesced, 3);
    assert_eq!(counters.flushes, 1);
}

#[test]
fn distinct_attributes_update_in_first_occurrence_order() {
    let fixture = Fixture::new();
    let watcher = Watcher::default();
    let calls = Rc::clone(&watcher.calls);
    let lifecycle = fixture.spawn(watcher);
    lifecycle.borrow_mut().render().unwrap();

    fixture.mutate(&lifecycle, "c", "1");
    fixture.mutate(&lifecycle, "a", "1");
    fixture.mutate(&lifecycle, "c", "2");
    fixture.mutate(&lifecycle, "b", "1");
    fixture.frames.run_frame().unwrap();

    assert_eq!(names(&calls), vec!["c", "a", "b"]);
    assert!(lifecycle.borrow().pending().is_empty());
    assert_eq!(lifecycle.borrow().element().flushed, 1);
}

#[test]
fn render_twice_builds_once() {
    let fixture = Fixture::new();
    let lifecycle = fixture.spawn(Watcher::default());
    lifecycle.borrow_mut().render().unwrap();
    lifecycle.borrow_mut().render().unwrap();
    lifecycle.borrow_mut().connected().unwrap();

    let instance = lifecycle.borrow();
    assert_eq!(instance.element().builds, 1);
    assert_eq!(instance.counters().renders, 1);

    let document = fixture.document.borrow();
    let root = document.shadow_root(fixture.host).unwrap();
    assert_eq!(instance.container(), root);
    // One style element plus the label.
    assert_eq!(document.children(root).len(), 2);
    assert_eq!(document.text_content(document.find_by_id(root, "label").unwrap()), "watcher");
}

#[test]
fn stop_skips_the_rest_and_still_clears() {
    let fixture = Fixture::new();
    let watcher = Watcher {
        stop_on: Some("b"),
        ..Watcher::default()
    };
    let calls = Rc::clone(&watcher.calls);
    let lifecycle = fixture.spawn(watcher);
    lifecycle.borrow_mut().render().unwrap();

    fixture.mutate(&lifecycle, "a", "1");
    fixture.mutate(&lifecycle, "b", "1");
    fixture.mutate(&lifecycle, "c", "1");
    fixture.frames.run_frame().unwrap();

    assert_eq!(names(&calls), vec!["a", "b"]);
    let instance = lifecycle.borrow();
    assert!(instance.pending().is_empty());
    assert_eq!(instance.counters().early_stops, 1);
    assert_eq!(instance.element().flushed, 1);
    drop(instance);

    fixture.frames.run_frame().unwrap();
    assert_eq!(names(&calls), vec!["a", "b"]);
}

#[test]
fn changes_before_mount_are_ignored() {
    let fixture = Fixture::new();
    let watcher = Watcher::default();
    let calls = Rc::clone(&watcher.calls);
    let lifecycle = fixture.spawn(watcher);

    fixture.mutate(&lifecycle, "a", "early");
    assert_eq!(fixture.frames.pending(), 0);
    lifecycle.borrow_mut().render().unwrap();
    fixture.frames.run_frame().unwrap();

    assert!(calls.borrow().is_empty());
    assert_eq!(lifecycle.borrow().counters().ignored_before_mount, 1);
}

#[test]
fn writes_made_while_updating_wait_for_the_next_flush() {
    let fixture = Fixture::new();
    let watcher = Watcher {
        echo: true,
        ..Watcher::default()
    };
    let calls = Rc::clone(&watcher.calls);
    let lifecycle = fixture.spawn(watcher);
    lifecycle.borrow_mut().render().unwrap();
    drop(fixture.document.borrow_mut().take_updates());

    fixture.mutate(&lifecycle, "a", "1");
    drop(fixture.document.borrow_mut().take_updates());
    fixture.frames.run_frame().unwrap();
    assert_eq!(names(&calls), vec!["a"]);

    // The echo is only visible as a mutation record; deliver it as a host would.
    let echoed: Vec<_> = fixture.document.borrow_mut().take_updates();
    assert_eq!(echoed.len(), 1);
    fixture.mutate(&lifecycle, "b", "echo");
    fixture.frames.run_frame().unwrap();
    assert_eq!(names(&calls), vec!["a", "b"]);
}

#[test]
fn flush_now_runs_synchronously() {
    let fixture = Fixture::new();
    let watcher = Watcher::default();
    let calls = Rc::clone(&watcher.calls);
    let lifecycle = fixture.spawn(watcher);
    lifecycle.borrow_mut().render().unwrap();

    fixture.mutate(&lifecycle, "a", "1");
    lifecycle.borrow_mut().flush_now().unwrap();
    assert_eq!(names(&calls), vec!["a"]);
    assert_eq!(lifecycle.borrow().state(), LifecycleState::FlushArmed);

    fixture.frames.run_frame().unwrap();
    assert_eq!(names(&calls), vec!["a"]);
    assert_eq!(lifecycle.borrow().state(), LifecycleState::Mounted);
}

/// Batch-mode element that re-reads everything and publishes a summary on a hub.
struct Summary {
    changed: Rc<EventHub<Vec<String>>>,
    template: Template,
}

impl CustomElement for Summary {
    const BASE_NAME: &'static str = "summary";

    fn observed_attributes() -> &'static [&'static str] {
        &["a", "b"]
    }

    fn isolation(&self) -> Isolation {
        Isolation::Light
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Batch
    }

    fn template(&self) -> Option<&Template> {
        Some(&self.template)
    }

    fn update(&mut self, _ctx: &mut ElementContext<'_>, _change: &AttributeChange) -> Result<UpdateFlow> {
        bail!("per-attribute update must not run in batch mode")
    }

    fn update_all(&mut self, ctx: &mut ElementContext<'_>, changes: &AttributeChangeBuffer) -> Result<()> {
        let mut names: Vec<String> = changes.iter().map(|change| change.name.clone()).collect();
        names.sort();
        ctx.set_text_by_id("out", &names.join(","))?;
        self.changed.call(&names);
        Ok(())
    }
}

#[test]
fn batch_mode_calls_update_all_once() {
    let fixture = Fixture::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut hub: EventHub<Vec<String>> = EventHub::new();
    let sink = Rc::clone(&seen);
    hub.add("test", move |names: &Vec<String>| sink.borrow_mut().push(names.clone()));
    let lifecycle = fixture.spawn(Summary {
        changed: Rc::new(hub),
        template: Template::new().with(TemplateNode::element("p").attr("id", "out")),
    });
    lifecycle.borrow_mut().render().unwrap();

    fixture.mutate(&lifecycle, "b", "1");
    fixture.mutate(&lifecycle, "a", "1");
    fixture.mutate(&lifecycle, "b", "2");
    fixture.frames.run_frame().unwrap();

    assert_eq!(*seen.borrow(), vec![vec![String::from("a"), String::from("b")]]);
    let document = fixture.document.borrow();
    let out = document.find_by_id(fixture.host, "out").unwrap();
    assert_eq!(document.text_content(out), "a,b");
    assert!(document.shadow_root(fixture.host).is_none());
}

/// Element whose update rejects malformed input.
#[derive(Default)]
struct Strict;

impl CustomElement for Strict {
    const BASE_NAME: &'static str = "strict";

    fn shared_styles(&self) -> Vec<SharedStyle> {
        vec![SharedStyle::new("p { margin: 0 }")]
    }

    fn update(&mut self, _ctx: &mut ElementContext<'_>, change: &AttributeChange) -> Result<UpdateFlow> {
        match change.new.as_deref().map(str::parse::<u32>) {
            Some(Err(err)) => bail!("`{}` must be a number: {err}", change.name),
            Some(Ok(_)) | None => Ok(UpdateFlow::Continue),
        }
    }
}

#[test]
fn update_errors_surface_from_the_frame() {
    let fixture = Fixture::new();
    let lifecycle = fixture.spawn(Strict);
    lifecycle.borrow_mut().render().unwrap();
    {
        let document = fixture.document.borrow();
        let root = document.shadow_root(fixture.host).unwrap();
        assert_eq!(document.adopted_styles(root).len(), 1);
    }

    fixture.mutate(&lifecycle, "size", "big");
    let err = fixture.frames.run_frame().unwrap_err();
    assert!(err.to_string().contains("must be a number"));
    assert!(lifecycle.borrow().pending().is_empty());
}

#[test]
fn data_is_private_to_the_instance() {
    let fixture = Fixture::new();
    let lifecycle = fixture.spawn(Watcher::default());
    lifecycle
        .borrow_mut()
        .invoke(|_, ctx| {
            ctx.data_mut().insert("clicks", 2_u32);
            Ok(())
        })
        .unwrap();
    assert_eq!(lifecycle.borrow().data().get::<u32>("clicks"), Some(&2));
}
