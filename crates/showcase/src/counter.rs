use anyhow::{Result, bail};
use dom::{SharedStyle, TemplateNode};
use element::{AttributeChange, CustomElement, ElementContext, UpdateFlow};
use events::{CircularHub, EventHub};
use serde_json::{Map, Value};

/// `<ui-counter count="n" step="s">`: shows a value and announces changes to it.
#[derive(Default)]
pub struct Counter {
    /// Fired with the new value after each rendered change.
    pub changed: EventHub<i64>,
    /// Contributors to the `data-*` attributes of the value display.
    pub decorate: CircularHub<Map<String, Value>>,
}

impl Counter {
    /// Advance the count by the current step.
    pub fn increment(&mut self, ctx: &mut ElementContext<'_>) -> Result<()> {
        let step = parse(ctx.attribute("step"), 1)?;
        let count = parse(ctx.attribute("count"), 0)?;
        ctx.set_attribute("count", &(count + step).to_string())?;
        Ok(())
    }

    fn decorate_display(&self, ctx: &mut ElementContext<'_>, count: i64) -> Result<()> {
        let mut seed = Map::new();
        seed.insert(String::from("count"), Value::from(count));
        let decorated = self.decorate.call(seed);
        let Some(display) = ctx.find_by_id("value") else {
            return Ok(());
        };
        for (key, value) in decorated.value {
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            ctx.document_mut()
                .set_attribute(display, &format!("data-{key}"), &text)?;
        }
        Ok(())
    }
}

fn parse(raw: Option<&str>, fallback: i64) -> Result<i64> {
    match raw {
        None => Ok(fallback),
        Some(text) => match text.trim().parse() {
            Ok(value) => Ok(value),
            Err(err) => bail!("`{text}` is not a whole number: {err}"),
        },
    }
}

impl CustomElement for Counter {
    const BASE_NAME: &'static str = "counter";

    fn observed_attributes() -> &'static [&'static str] {
        &["count"]
    }

    fn style(&self) -> Option<&str> {
        Some(".value { font-variant-numeric: tabular-nums }")
    }

    fn shared_styles(&self) -> Vec<SharedStyle> {
        vec![crate::THEME.with(SharedStyle::clone)]
    }

    fn build_dom(&mut self, ctx: &mut ElementContext<'_>) -> Result<()> {
        let count = parse(ctx.attribute("count"), 0)?;
        ctx.append(
            &TemplateNode::element("span")
                .attr("id", "value")
                .attr("class", "value")
                .text(&count.to_string()),
        )?;
        self.decorate_display(ctx, count)
    }

    fn update(&mut self, ctx: &mut ElementContext<'_>, change: &AttributeChange) -> Result<UpdateFlow> {
        let count = parse(change.new.as_deref(), 0)?;
        ctx.set_text_by_id("value", &count.to_string())?;
        self.decorate_display(ctx, count)?;
        self.changed.call(&count);
        Ok(UpdateFlow::Continue)
    }
}
