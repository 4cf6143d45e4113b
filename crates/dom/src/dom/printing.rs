use core::fmt;

use indextree::NodeId;
use serde_json::{Map, Value, json};

use super::{DOMNode, Document, NodeKind};

// -----------------------
// Module-scope helpers
// -----------------------

fn sorted_attrs(node: &DOMNode) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = node.attrs.iter().cloned().collect();
    pairs.sort_by(|left, right| left.0.cmp(&right.0));
    pairs
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

fn children_to_json(doc: &Document, id: NodeId) -> Vec<Value> {
    id.children(&doc.dom)
        .map(|child| node_to_json(doc, child))
        .filter(|value| !value.is_null())
        .collect()
}

fn node_to_json(doc: &Document, id: NodeId) -> Value {
    let Some(node_ref) = doc.dom.get(id) else {
        return Value::Null;
    };
    let node = node_ref.get();
    match &node.kind {
        NodeKind::Document => json!({ "type": "document", "children": children_to_json(doc, id) }),
        NodeKind::Element { tag } => {
            let mut attrs_obj = Map::new();
            for (key, value) in sorted_attrs(node) {
                attrs_obj.insert(key, Value::String(value));
            }
            json!({
                "type": "element",
                "tag": tag,
                "attrs": Value::Object(attrs_obj),
                "children": children_to_json(doc, id),
            })
        }
        NodeKind::Text { text } => {
            if text.trim().is_empty() {
                Value::Null
            } else {
                json!({ "type": "text", "text": text })
            }
        }
        NodeKind::ShadowRoot { adopted } => json!({
            "type": "shadow-root",
            "adopted": adopted.len(),
            "children": children_to_json(doc, id),
        }),
    }
}

fn write_indent(out: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        out.write_str("  ")?;
    }
    Ok(())
}

fn fmt_node(doc: &Document, id: NodeId, out: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    let Some(node_ref) = doc.dom.get(id) else {
        return Ok(());
    };
    let node = node_ref.get();
    match &node.kind {
        NodeKind::Document => {
            write_indent(out, depth)?;
            writeln!(out, "#document")?;
        }
        NodeKind::Element { tag } => {
            write_indent(out, depth)?;
            write!(out, "<{tag}")?;
            for (key, value) in sorted_attrs(node) {
                write!(out, " {}=\"{}\"", key, escape_text(&value))?;
            }
            writeln!(out, ">")?;
        }
        NodeKind::Text { text } => {
            // Skip pure-whitespace text nodes in the printer for cleaner output
            if text.chars().all(char::is_whitespace) {
                return Ok(());
            }
            write_indent(out, depth)?;
            writeln!(out, "\"{}\"", escape_text(text))?;
            return Ok(());
        }
        NodeKind::ShadowRoot { adopted } => {
            write_indent(out, depth)?;
            writeln!(out, "#shadow-root (adopted: {})", adopted.len())?;
        }
    }
    for child in id.children(&doc.dom) {
        fmt_node(doc, child, out, depth + 1)?;
    }
    if let NodeKind::Element { tag } = &node.kind {
        write_indent(out, depth)?;
        writeln!(out, "</{tag}>")?;
    }
    Ok(())
}

impl fmt::Debug for Document {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(out, "DOM")?;
        fmt_node(self, self.root, out, 0)
    }
}

impl Document {
    /// Build a deterministic JSON representation of the subtree at `node`.
    /// Schema:
    /// - Document: { "type":"document", "children":[ ... ] }
    /// - Element: { "type":"element", "tag": "div", "attrs": {..}, "children":[ ... ] }
    /// - Shadow root: { "type":"shadow-root", "adopted": n, "children":[ ... ] }
    /// - Text: { "type":"text", "text":"..." }
    pub fn to_json_value(&self, node: NodeId) -> Value {
        node_to_json(self, node)
    }

    /// Pretty JSON string of the whole document for snapshots and test comparisons.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value(self.root))
            .unwrap_or_else(|_| String::from("{}"))
    }
}
