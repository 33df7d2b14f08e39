//! Tree inspector.
//!
//! Writes an indented, colourised dump of an output tree to any
//! `io::Write` (a terminal, or a `Vec<u8>` in tests):
//!
//! ```text
//! <div>#1
//!   <span>#2 [sig]
//!     "5"#3
//!   <!--v-if-->#4 [placeholder]
//! ```

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use crate::primitives::{Node, NodeFlags, NodeKind, StaticPolicy};

/// Dump `root` and its descendants.
pub fn inspect(out: &mut impl Write, root: &Node) -> io::Result<()> {
    write_node(out, root, 0)?;
    out.flush()
}

/// Dump to a string without colour codes.
pub fn inspect_plain(root: &Node) -> String {
    let mut out = String::new();
    plain_node(&mut out, root, 0);
    out
}

fn markers(node: &Node) -> Vec<&'static str> {
    let flags = node.flags();
    let mut found = Vec::new();
    if node.signature().is_some() {
        found.push("sig");
    }
    if flags.contains(NodeFlags::HIDDEN) {
        found.push("hidden");
    }
    if flags.contains(NodeFlags::PLACEHOLDER) {
        found.push("placeholder");
    }
    if flags.contains(NodeFlags::FILLER) {
        found.push("filler");
    }
    match node.policy() {
        Some(StaticPolicy::Keep) => found.push("keep"),
        Some(StaticPolicy::Replace) => found.push("replace"),
        None => {}
    }
    found
}

fn label(node: &Node) -> (Color, String) {
    match node.kind() {
        NodeKind::Element(tag) => {
            let mut text = format!("<{tag}");
            for (name, value) in node.attrs() {
                text.push_str(&format!(" {name}={value:?}"));
            }
            if let Some(value) = node.value() {
                text.push_str(&format!(" .value={value:?}"));
            }
            text.push('>');
            (Color::Cyan, text)
        }
        NodeKind::Text => (Color::White, format!("{:?}", node.text_value())),
        NodeKind::Comment => (Color::DarkGrey, format!("<!--{}-->", node.text_value())),
    }
}

fn write_node(out: &mut impl Write, node: &Node, depth: usize) -> io::Result<()> {
    let (color, text) = label(node);
    queue!(
        out,
        Print("  ".repeat(depth)),
        SetForegroundColor(color),
        Print(text),
        SetForegroundColor(Color::DarkGrey),
        Print(format!("#{}", node.id()))
    )?;
    let markers = markers(node);
    if !markers.is_empty() {
        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print(format!(" [{}]", markers.join(", ")))
        )?;
    }
    queue!(out, ResetColor, Print("\n"))?;

    for child in node.children() {
        write_node(out, &child, depth + 1)?;
    }
    Ok(())
}

fn plain_node(out: &mut String, node: &Node, depth: usize) {
    let (_, text) = label(node);
    out.push_str(&"  ".repeat(depth));
    out.push_str(&text);
    let markers = markers(node);
    if !markers.is_empty() {
        out.push_str(&format!(" [{}]", markers.join(", ")));
    }
    out.push('\n');
    for child in node.children() {
        plain_node(out, &child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_dump_shows_markers() {
        let root = Node::element("div");
        let span = Node::element("span");
        span.set_signature(Some(9));
        span.append_child(Node::text("5"));
        root.append_child(span);
        root.append_child(Node::placeholder());

        let dump = inspect_plain(&root);
        assert_eq!(
            dump,
            "<div>\n  <span> [sig]\n    \"5\"\n  <!--v-if--> [placeholder]\n"
        );
    }

    #[test]
    fn test_colour_dump_writes_every_node() {
        let root = Node::element("ul");
        root.append_child(Node::element("li"));
        let mut buffer = Vec::new();

        inspect(&mut buffer, &root).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("<ul>"));
        assert!(text.contains("<li>"));
    }
}
