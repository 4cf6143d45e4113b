//! Drives two demo elements through a scripted session and logs the document.

extern crate alloc;

use alloc::rc::Rc;
use std::process::ExitCode;

use anyhow::{Error, anyhow};
use dom::SharedStyle;
use element::ElementConfig;
use element_host::ElementHost;
use log::{error, info};
use scheduler::ListInput;
use serde_json::{Map, Value};

use crate::counter::Counter;
use crate::log_list::LogList;

mod counter;
mod log_list;

thread_local! {
    /// Theme adopted by every counter's shadow root without copying.
    static THEME: SharedStyle = SharedStyle::new(":host { color: #222; font-family: sans-serif }");
}

pub fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("showcase failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let config = ElementConfig::from_env();
    if !ElementConfig::install(config.clone()) {
        info!("process-wide element config was already installed");
    }
    let mut host = ElementHost::new(config);
    let counter_tag = host.define(Counter::default)?;
    let log_tag = host.define(LogList::default)?;
    info!("defined {:?}", host.defined_tags());

    let root = host.root()?;
    let log_list = host.create_element(&log_tag)?;
    host.append_child(root, log_list)?;
    let counter = host.create_element(&counter_tag)?;
    host.set_attribute(counter, "step", "5")?;
    host.append_child(root, counter)?;

    let feed = host
        .with_element::<LogList, _>(log_list, |lifecycle| Ok(lifecycle.element().feed()))?
        .ok_or_else(|| anyhow!("log list did not mount"))?;
    host.with_element::<Counter, _>(counter, |lifecycle| {
        let feed = Rc::clone(&feed);
        let counter = lifecycle.element_mut();
        counter
            .changed
            .add("log", move |count: &i64| feed.schedule(ListInput::Item(format!("count is now {count}"))));
        counter.decorate.add("parity", |state| {
            let even = state.value.get("count").and_then(Value::as_i64).is_some_and(|count| count % 2 == 0);
            let mut patch = Map::new();
            patch.insert(String::from("parity"), Value::from(if even { "even" } else { "odd" }));
            Some(patch)
        });
        Ok(())
    })?;

    // Three clicks inside one frame coalesce into a single render.
    for _ in 0..3 {
        host.with_element::<Counter, _>(counter, |lifecycle| {
            lifecycle.invoke(|element, ctx| element.increment(ctx))
        })?;
    }
    info!("callbacks waiting for the next frame: {}", host.pending_frame_callbacks());
    host.run_frame()?;
    // The counter's announcement was queued during that frame.
    host.run_frame()?;

    feed.schedule(vec![String::from("manual entry"), String::from("another entry")]);
    host.run_frame()?;

    let document = host.document();
    info!("document after the session:\n{:?}", document.borrow());
    info!("counters: {}", element::telemetry::counters_json(&host.counters()));

    host.remove(counter)?;
    host.run_frame()?;
    info!("snapshot:\n{}", document.borrow().to_json_string());
    Ok(())
}
