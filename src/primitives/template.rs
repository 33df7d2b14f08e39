//! Static template tree.
//!
//! Templates are immutable and supplied by an external loader; this crate
//! never parses markup. Build them in code:
//!
//! ```ignore
//! let template: TemplateNode = TemplateElement::new("ul")
//!     .child(
//!         TemplateElement::new("li")
//!             .attr("v-for", "item in items")
//!             .text("{{ item }}"),
//!     )
//!     .into();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_SITE: AtomicUsize = AtomicUsize::new(1);

fn next_site() -> usize {
    NEXT_SITE.fetch_add(1, Ordering::Relaxed)
}

/// One attribute, plain or directive, in authoring order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateAttr {
    pub name: String,
    pub value: String,
}

/// Template element. Equality ignores the render-site id.
#[derive(Debug, Clone)]
pub struct TemplateElement {
    pub tag: String,
    pub attrs: Vec<TemplateAttr>,
    pub children: Vec<TemplateNode>,
    site: usize,
}

impl PartialEq for TemplateElement {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.attrs == other.attrs && self.children == other.children
    }
}

impl Eq for TemplateElement {}

impl TemplateElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
            site: next_site(),
        }
    }

    /// Add an attribute. The element gets a fresh site id, so anything
    /// cached against the old attribute list is never reused.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(TemplateAttr {
            name: name.to_string(),
            value: value.to_string(),
        });
        self.site = next_site();
        self
    }

    pub fn child(mut self, child: impl Into<TemplateNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append a text child.
    pub fn text(self, text: &str) -> Self {
        self.child(TemplateNode::Text(text.to_string()))
    }

    /// Value of the first attribute with this name.
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Render-site id, assigned when the element is built. Clones share it;
    /// it is never reused for another element.
    pub(crate) fn site(&self) -> usize {
        self.site
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Element(TemplateElement),
    Text(String),
    Comment(String),
}

impl TemplateNode {
    pub fn text(text: &str) -> Self {
        TemplateNode::Text(text.to_string())
    }

    pub fn comment(text: &str) -> Self {
        TemplateNode::Comment(text.to_string())
    }

    pub fn as_element(&self) -> Option<&TemplateElement> {
        match self {
            TemplateNode::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Text node made only of whitespace (formatting between elements).
    pub fn is_blank_text(&self) -> bool {
        matches!(self, TemplateNode::Text(text) if text.trim().is_empty())
    }
}

impl From<TemplateElement> for TemplateNode {
    fn from(element: TemplateElement) -> Self {
        TemplateNode::Element(element)
    }
}
