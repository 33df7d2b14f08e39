//! Render Output Node - The live tree.
//!
//! Output nodes are shared, mutable handles (`Rc<RefCell<..>>`). The renderer
//! creates them, the reconciler patches them in place, and hosts inspect or
//! dispatch events on them.
//!
//! # Ownership
//!
//! A node lists its children and keeps a weak reference to its parent.
//! [`Node::append_child`] reparents (detaching from the previous parent);
//! [`Node::push_alias`] lists a node under a second parent without moving it,
//! which is how reused loop output is placed into a fresh render before the
//! reconciler confirms it is already in place.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::state::events::Event;
use crate::state::focus;

/// Process-unique node id.
pub type NodeId = u64;

thread_local! {
    static NEXT_ID: Cell<NodeId> = const { Cell::new(1) };
}

fn next_id() -> NodeId {
    NEXT_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    })
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Visibility toggle evaluated false.
        const HIDDEN = 1 << 0;
        /// Stand-in for a false conditional.
        const PLACEHOLDER = 1 << 1;
        /// Padding inserted by the reconciler.
        const FILLER = 1 << 2;
        /// Replacement that takes over input focus after the swap.
        const FOCUS_PENDING = 1 << 3;
    }
}

/// Reconciliation policy carried by a static-policy marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticPolicy {
    /// Never touch or descend into the live node.
    Keep,
    /// Replace without comparing.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Text,
    Comment,
}

pub type ListenerFn = dyn Fn(&Event);

#[derive(Clone)]
pub struct Listener {
    pub event: String,
    pub handler: Rc<ListenerFn>,
}

struct NodeData {
    id: NodeId,
    kind: NodeKind,
    text: String,
    attrs: IndexMap<String, String>,
    children: Vec<Node>,
    parent: Weak<RefCell<NodeData>>,
    value: Option<String>,
    checked: Option<bool>,
    markup: Option<String>,
    flags: NodeFlags,
    policy: Option<StaticPolicy>,
    signature: Option<u64>,
    listeners: Vec<Listener>,
}

impl NodeData {
    fn new(kind: NodeKind, text: String) -> Self {
        Self {
            id: next_id(),
            kind,
            text,
            attrs: IndexMap::new(),
            children: Vec::new(),
            parent: Weak::new(),
            value: None,
            checked: None,
            markup: None,
            flags: NodeFlags::empty(),
            policy: None,
            signature: None,
            listeners: Vec::new(),
        }
    }
}

/// Handle to a live output node. Clones share the node.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    fn from_data(data: NodeData) -> Self {
        Self(Rc::new(RefCell::new(data)))
    }

    pub fn element(tag: &str) -> Self {
        Self::from_data(NodeData::new(NodeKind::Element(tag.to_string()), String::new()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::from_data(NodeData::new(NodeKind::Text, text.into()))
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::from_data(NodeData::new(NodeKind::Comment, text.into()))
    }

    /// Placeholder standing in for a false conditional.
    pub fn placeholder() -> Self {
        let node = Self::comment("v-if");
        node.insert_flags(NodeFlags::PLACEHOLDER);
        node
    }

    /// Padding node used by the reconciler.
    pub fn filler() -> Self {
        let node = Self::comment("");
        node.insert_flags(NodeFlags::FILLER);
        node
    }

    // -------------------------------------------------------------------------
    // identity & kind
    // -------------------------------------------------------------------------

    pub fn id(&self) -> NodeId {
        self.0.borrow().id
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind.clone()
    }

    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Element(_))
    }

    /// Own text (text and comment nodes).
    pub fn text_value(&self) -> String {
        self.0.borrow().text.clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.0.borrow_mut().text = text.into();
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match data.kind {
            NodeKind::Text => data.text.clone(),
            NodeKind::Comment => String::new(),
            NodeKind::Element(_) => data.children.iter().map(Node::text_content).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // attributes & fields
    // -------------------------------------------------------------------------

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.get(name).cloned()
    }

    pub fn attrs(&self) -> IndexMap<String, String> {
        self.0.borrow().attrs.clone()
    }

    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        self.0.borrow_mut().attrs.insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&self, name: &str) -> Option<String> {
        self.0.borrow_mut().attrs.shift_remove(name)
    }

    /// Editable value field.
    pub fn value(&self) -> Option<String> {
        self.0.borrow().value.clone()
    }

    pub fn set_value(&self, value: Option<String>) {
        self.0.borrow_mut().value = value;
    }

    /// Editable checked field.
    pub fn checked(&self) -> Option<bool> {
        self.0.borrow().checked
    }

    pub fn set_checked(&self, checked: Option<bool>) {
        self.0.borrow_mut().checked = checked;
    }

    /// Injected raw inner markup.
    pub fn markup(&self) -> Option<String> {
        self.0.borrow().markup.clone()
    }

    pub fn set_markup(&self, markup: Option<String>) {
        self.0.borrow_mut().markup = markup;
    }

    pub fn flags(&self) -> NodeFlags {
        self.0.borrow().flags
    }

    pub fn set_flags(&self, flags: NodeFlags) {
        self.0.borrow_mut().flags = flags;
    }

    pub fn insert_flags(&self, flags: NodeFlags) {
        self.0.borrow_mut().flags.insert(flags);
    }

    pub fn remove_flags(&self, flags: NodeFlags) {
        self.0.borrow_mut().flags.remove(flags);
    }

    pub fn is_hidden(&self) -> bool {
        self.flags().contains(NodeFlags::HIDDEN)
    }

    pub fn is_placeholder(&self) -> bool {
        self.flags().contains(NodeFlags::PLACEHOLDER)
    }

    pub fn policy(&self) -> Option<StaticPolicy> {
        self.0.borrow().policy
    }

    pub fn set_policy(&self, policy: Option<StaticPolicy>) {
        self.0.borrow_mut().policy = policy;
    }

    /// Event signature stamped by the renderer.
    pub fn signature(&self) -> Option<u64> {
        self.0.borrow().signature
    }

    pub fn set_signature(&self, signature: Option<u64>) {
        self.0.borrow_mut().signature = signature;
    }

    // -------------------------------------------------------------------------
    // tree
    // -------------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.borrow().children.get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn has_element_children(&self) -> bool {
        self.0.borrow().children.iter().any(Node::is_element)
    }

    /// Append, detaching `child` from its current parent first.
    pub fn append_child(&self, child: Node) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child);
    }

    /// List `child` without touching its parent link.
    pub fn push_alias(&self, child: Node) {
        self.0.borrow_mut().children.push(child);
    }

    /// Put `child` at `index`, dropping whatever was there.
    pub fn replace_child(&self, index: usize, child: Node) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        let previous = {
            let mut data = self.0.borrow_mut();
            match data.children.get_mut(index) {
                Some(slot) => Some(std::mem::replace(slot, child)),
                None => {
                    data.children.push(child);
                    None
                }
            }
        };
        if let Some(previous) = previous {
            previous.clear_parent_if(self);
        }
    }

    /// Drop children past `len`.
    pub fn truncate_children(&self, len: usize) {
        let removed: Vec<Node> = {
            let mut data = self.0.borrow_mut();
            if data.children.len() <= len {
                return;
            }
            data.children.drain(len..).collect()
        };
        for child in removed {
            child.clear_parent_if(self);
        }
    }

    /// Remove this node from its parent's child list.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent
            .0
            .borrow_mut()
            .children
            .retain(|child| !child.ptr_eq(self));
        self.0.borrow_mut().parent = Weak::new();
    }

    /// Point every listed child's parent link at this node.
    pub fn adopt_children(&self) {
        for child in self.children() {
            child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        }
    }

    fn clear_parent_if(&self, parent: &Node) {
        let is_parent = self.parent().is_some_and(|p| p.ptr_eq(parent));
        if is_parent {
            self.0.borrow_mut().parent = Weak::new();
        }
    }

    /// Copy of this subtree with fresh ids. Listeners are shared.
    pub fn deep_clone(&self) -> Node {
        let copy = {
            let data = self.0.borrow();
            let mut copy = NodeData::new(data.kind.clone(), data.text.clone());
            copy.attrs = data.attrs.clone();
            copy.value = data.value.clone();
            copy.checked = data.checked;
            copy.markup = data.markup.clone();
            copy.flags = data.flags;
            copy.policy = data.policy;
            copy.signature = data.signature;
            copy.listeners = data.listeners.clone();
            Node::from_data(copy)
        };
        for child in self.children() {
            copy.append_child(child.deep_clone());
        }
        copy
    }

    /// Whether this subtree contains the node with `id`.
    pub fn contains(&self, id: NodeId) -> bool {
        self.id() == id || self.children().iter().any(|child| child.contains(id))
    }

    /// Whether this subtree holds input focus.
    pub fn contains_focus(&self) -> bool {
        focus::focused_node().is_some_and(|id| self.contains(id))
    }

    /// Child-index path from this node down to `id`.
    pub fn path_to(&self, id: NodeId) -> Option<Vec<usize>> {
        if self.id() == id {
            return Some(Vec::new());
        }
        self.children().iter().enumerate().find_map(|(index, child)| {
            child.path_to(id).map(|mut path| {
                path.insert(0, index);
                path
            })
        })
    }

    /// Follow a child-index path.
    pub fn descend(&self, path: &[usize]) -> Option<Node> {
        path.iter()
            .try_fold(self.clone(), |node, &index| node.child(index))
    }

    /// First node in document order matching `predicate`.
    pub fn find(&self, predicate: &dyn Fn(&Node) -> bool) -> Option<Node> {
        if predicate(self) {
            return Some(self.clone());
        }
        self.children().iter().find_map(|child| child.find(predicate))
    }

    /// All nodes in document order matching `predicate`.
    pub fn find_all(&self, predicate: &dyn Fn(&Node) -> bool) -> Vec<Node> {
        let mut found = Vec::new();
        self.collect(predicate, &mut found);
        found
    }

    fn collect(&self, predicate: &dyn Fn(&Node) -> bool, found: &mut Vec<Node>) {
        if predicate(self) {
            found.push(self.clone());
        }
        for child in self.children() {
            child.collect(predicate, found);
        }
    }

    /// First element with this tag.
    pub fn find_tag(&self, tag: &str) -> Option<Node> {
        self.find(&|node| node.tag().as_deref() == Some(tag))
    }

    /// All elements with this tag.
    pub fn find_all_tag(&self, tag: &str) -> Vec<Node> {
        self.find_all(&|node| node.tag().as_deref() == Some(tag))
    }

    // -------------------------------------------------------------------------
    // events
    // -------------------------------------------------------------------------

    pub fn add_listener(&self, event: &str, handler: impl Fn(&Event) + 'static) {
        self.0.borrow_mut().listeners.push(Listener {
            event: event.to_string(),
            handler: Rc::new(handler),
        });
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().listeners.len()
    }

    /// Invoke every listener registered for `event.kind`.
    pub fn dispatch(&self, event: &Event) {
        let handlers: Vec<Rc<ListenerFn>> = self
            .0
            .borrow()
            .listeners
            .iter()
            .filter(|listener| listener.event == event.kind)
            .map(|listener| listener.handler.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn click(&self) {
        self.dispatch(&Event::new("click"));
    }

    /// Simulate a user edit of the value field.
    pub fn input(&self, value: &str) {
        self.set_value(Some(value.to_string()));
        self.dispatch(&Event::new("input").with_value(value));
    }

    /// Simulate a user toggling the checked field.
    pub fn toggle(&self, checked: bool) {
        self.set_checked(Some(checked));
        let mut event = Event::new("change").with_checked(checked);
        event.value = self.value().or_else(|| self.attr("value"));
        self.dispatch(&event);
    }

    // -------------------------------------------------------------------------
    // serialization
    // -------------------------------------------------------------------------

    /// Markup form of this subtree (listeners and signatures omitted).
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text => out.push_str(&escape(&data.text)),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&data.text);
                out.push_str("-->");
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &data.attrs {
                    push_attr(out, name, value);
                }
                if let Some(value) = data
                    .value
                    .as_ref()
                    .filter(|_| !data.attrs.contains_key("value"))
                {
                    push_attr(out, "value", value);
                }
                if data.checked == Some(true) && !data.attrs.contains_key("checked") {
                    out.push_str(" checked");
                }
                if data.flags.contains(NodeFlags::HIDDEN) {
                    out.push_str(" hidden");
                }
                out.push('>');
                match &data.markup {
                    Some(markup) => out.push_str(markup),
                    None => {
                        for child in &data.children {
                            child.write_markup(out);
                        }
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    if !value.is_empty() {
        out.push_str("=\"");
        out.push_str(&escape(value).replace('"', "&quot;"));
        out.push('"');
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Element(tag) => write!(f, "<{tag}>#{}", data.id),
            NodeKind::Text => write!(f, "{:?}#{}", data.text, data.id),
            NodeKind::Comment => write!(f, "<!--{}-->#{}", data.text, data.id),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_reparents() {
        let a = Node::element("div");
        let b = Node::element("div");
        let child = Node::text("x");

        a.append_child(child.clone());
        b.append_child(child.clone());

        assert_eq!(a.child_count(), 0, "moved out of the first parent");
        assert!(child.parent().unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_push_alias_keeps_parent() {
        let live = Node::element("ul");
        let fresh = Node::element("ul");
        let item = Node::element("li");
        live.append_child(item.clone());

        fresh.push_alias(item.clone());

        assert_eq!(live.child_count(), 1);
        assert_eq!(fresh.child_count(), 1);
        assert!(item.parent().unwrap().ptr_eq(&live));
    }

    #[test]
    fn test_replace_child_swaps_in_place() {
        let parent = Node::element("div");
        let old = Node::text("old");
        parent.append_child(Node::text("first"));
        parent.append_child(old.clone());

        let new = Node::text("new");
        parent.replace_child(1, new.clone());

        assert!(parent.child(1).unwrap().ptr_eq(&new));
        assert!(old.parent().is_none());
        assert!(new.parent().unwrap().ptr_eq(&parent));
    }

    #[test]
    fn test_deep_clone_gets_fresh_ids() {
        let root = Node::element("p");
        root.set_attr("class", "a");
        root.append_child(Node::text("hi"));

        let copy = root.deep_clone();
        assert_ne!(copy.id(), root.id());
        assert_eq!(copy.to_markup(), root.to_markup());
        assert!(copy.child(0).unwrap().parent().unwrap().ptr_eq(&copy));
    }

    #[test]
    fn test_dispatch_invokes_matching_listeners() {
        let node = Node::element("button");
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        node.add_listener("click", move |_| counter.set(counter.get() + 1));
        node.add_listener("input", |_| panic!("wrong event"));

        node.click();
        node.click();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_markup_serialization() {
        let root = Node::element("div");
        root.set_attr("id", "main");
        root.set_attr("disabled", "");
        root.insert_flags(NodeFlags::HIDDEN);
        root.append_child(Node::text("a < b"));
        root.append_child(Node::placeholder());

        assert_eq!(
            root.to_markup(),
            r#"<div id="main" disabled hidden>a &lt; b<!--v-if--></div>"#
        );
    }

    #[test]
    fn test_path_to_and_descend() {
        let root = Node::element("div");
        let list = Node::element("ul");
        let item = Node::element("li");
        root.append_child(Node::text(" "));
        root.append_child(list.clone());
        list.append_child(item.clone());

        let path = root.path_to(item.id()).unwrap();
        assert_eq!(path, vec![1, 0]);
        assert!(root.descend(&path).unwrap().ptr_eq(&item));
    }

    #[test]
    fn test_truncate_clears_parent_links() {
        let root = Node::element("div");
        let extra = Node::text("b");
        root.append_child(Node::text("a"));
        root.append_child(extra.clone());

        root.truncate_children(1);
        assert_eq!(root.child_count(), 1);
        assert!(extra.parent().is_none());
    }
}
