use alloc::rc::Rc;

use anyhow::{Result, anyhow};
use dom::{NodeId, SharedDocument, TemplateNode};
use element::{CustomElement, ElementContext, Isolation};
use log::debug;
use scheduler::{Batch, ListFrameScheduler, ListInput};

/// `<ui-log-list>`: an append-only list whose entries are written once per frame.
#[derive(Default)]
pub struct LogList {
    feed: Option<Rc<ListFrameScheduler<String>>>,
}

impl LogList {
    /// Scheduler accepting entries; available once the list has mounted.
    pub fn feed(&self) -> Option<Rc<ListFrameScheduler<String>>> {
        self.feed.as_ref().map(Rc::clone)
    }
}

fn write_batch(document: &SharedDocument, list: NodeId, batch: Batch<String>) -> Result<()> {
    let mut document = document
        .try_borrow_mut()
        .map_err(|_| anyhow!("document is borrowed"))?;
    match batch {
        Batch::Reset => {
            for child in document.children(list) {
                document.remove(child)?;
            }
        }
        Batch::Items(entries) => {
            debug!("log list: writing {} entries", entries.len());
            for entry in entries {
                document.build(list, &TemplateNode::element("li").text(&entry))?;
            }
        }
    }
    Ok(())
}

impl CustomElement for LogList {
    const BASE_NAME: &'static str = "log-list";

    fn isolation(&self) -> Isolation {
        Isolation::Light
    }

    fn build_dom(&mut self, ctx: &mut ElementContext<'_>) -> Result<()> {
        ctx.append(&TemplateNode::element("ol").attr("id", "entries"))?;
        Ok(())
    }

    fn attach(&mut self, ctx: &mut ElementContext<'_>) -> Result<()> {
        let list = ctx
            .find_by_id("entries")
            .ok_or_else(|| anyhow!("log list lost its entries container"))?;
        let document = ctx.shared_document();
        self.feed = Some(Rc::new(ListFrameScheduler::new(ctx.frames(), move |batch| {
            write_batch(&document, list, batch)
        })));
        Ok(())
    }

    fn detach(&mut self, _ctx: &mut ElementContext<'_>) -> Result<()> {
        if let Some(feed) = self.feed.take() {
            feed.schedule(ListInput::Reset);
        }
        Ok(())
    }
}
