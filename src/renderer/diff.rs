//! Tree reconciler.
//!
//! Patches a live (attached) output tree toward a freshly rendered, detached
//! one, keeping every compatible live node in place.
//!
//! # Algorithm
//!
//! For a root invocation only the children are compared. Per same-index
//! sibling pair `(old, new)`:
//!
//! 1. Same node (reused loop output): skip.
//! 2. `old` carries the `keep` policy: leave it untouched, do not recurse.
//! 3. Copy editable value/checked fields from `new` onto `old` if they differ.
//! 4. `old` carries the `replace` policy, or the pair is incompatible:
//!    swap `new` in at `old`'s position.
//! 5. Otherwise patch attributes, flags and markup in place and recurse.
//!
//! Child lists of different lengths are trimmed (old longer) or padded with
//! filler nodes (old shorter) before pairing; a filler never matches, so the
//! surplus new children are swapped in.
//!
//! # Compatibility
//!
//! - node kind (and element tag) must match
//! - if either side has an event signature, both must have the same one
//! - child counts may differ by at most the configured tolerance
//! - leaves (no element children) must have identical text content

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::primitives::{Node, NodeFlags, NodeId, StaticPolicy};
use crate::state::focus;

/// Outcome of one reconciliation.
#[derive(Default)]
pub struct ReconcileReport {
    /// Fresh node id -> live node that absorbed it.
    pub kept: HashMap<NodeId, Node>,
    /// Live nodes swapped out.
    pub replaced: usize,
    /// Fresh nodes that were already attached elsewhere and had to be copied.
    pub aliased: usize,
}

impl ReconcileReport {
    /// Whether the live tree was left structurally untouched.
    pub fn is_clean(&self) -> bool {
        self.replaced == 0 && self.aliased == 0
    }
}

pub struct Reconciler {
    tolerance: usize,
}

impl Reconciler {
    pub fn new(tolerance: usize) -> Self {
        Self { tolerance }
    }

    /// Patch `old` toward `new`.
    ///
    /// With `is_root` only the children are reconciled. Otherwise `old` is
    /// compared too and, when incompatible, replaced under its parent; a
    /// parentless `old` is then reconciled as a root.
    pub fn reconcile(&self, old: &Node, new: &Node, is_root: bool) -> ReconcileReport {
        let mut pass = Pass {
            tolerance: self.tolerance,
            report: ReconcileReport::default(),
            focus_target: None,
        };

        let parent = if is_root { None } else { old.parent() };
        match parent {
            Some(parent) => {
                let index = parent
                    .children()
                    .iter()
                    .position(|child| child.ptr_eq(old))
                    .unwrap_or(0);
                let new_parent = new.parent().unwrap_or_else(|| new.clone());
                pass.pair(&parent, index, old, new, &new_parent);
            }
            None => pass.children(old, new),
        }

        if let Some(target) = pass.focus_target.take() {
            target.remove_flags(NodeFlags::FOCUS_PENDING);
            focus::focus(target.id());
        }
        pass.report
    }

    /// The compatibility predicate on its own.
    pub fn is_compatible(&self, old: &Node, new: &Node) -> bool {
        compatible(old, new, self.tolerance)
    }
}

fn compatible(old: &Node, new: &Node, tolerance: usize) -> bool {
    if old.kind() != new.kind() {
        return false;
    }
    let (a, b) = (old.signature(), new.signature());
    if (a.is_some() || b.is_some()) && a != b {
        return false;
    }
    if old.child_count().abs_diff(new.child_count()) > tolerance {
        return false;
    }
    if !old.has_element_children() && !new.has_element_children() {
        return old.text_value() == new.text_value() && old.text_content() == new.text_content();
    }
    true
}

struct Pass {
    tolerance: usize,
    report: ReconcileReport,
    /// Replacement that inherits focus once the pass is over.
    focus_target: Option<Node>,
}

impl Pass {
    fn children(&mut self, old: &Node, new: &Node) {
        let fresh = new.children();

        old.truncate_children(fresh.len());
        while old.child_count() < fresh.len() {
            old.append_child(Node::filler());
        }

        for (index, (old_child, new_child)) in old.children().iter().zip(fresh.iter()).enumerate() {
            self.pair(old, index, old_child, new_child, new);
        }
    }

    fn pair(&mut self, parent: &Node, index: usize, old: &Node, new: &Node, new_parent: &Node) {
        if old.ptr_eq(new) {
            return;
        }

        if old.policy() == Some(StaticPolicy::Keep) {
            return;
        }

        // Reused output still attached elsewhere in the live tree
        let attached_elsewhere = new.parent().is_some_and(|p| !p.ptr_eq(new_parent));
        let new = if attached_elsewhere {
            self.report.aliased += 1;
            new.deep_clone()
        } else {
            new.clone()
        };

        if old.value() != new.value() {
            old.set_value(new.value());
        }
        if old.checked() != new.checked() {
            old.set_checked(new.checked());
        }

        if old.policy() == Some(StaticPolicy::Replace) || !compatible(old, &new, self.tolerance) {
            self.replace(parent, index, old, &new);
            return;
        }

        self.patch(old, &new);
        self.report.kept.insert(new.id(), old.clone());
    }

    fn patch(&mut self, old: &Node, new: &Node) {
        let fresh = new.attrs();
        for name in old.attrs().keys() {
            if !fresh.contains_key(name) {
                old.remove_attr(name);
            }
        }
        for (name, value) in &fresh {
            if old.attr(name).as_deref() != Some(value.as_str()) {
                old.set_attr(name, value.as_str());
            }
        }

        let flags =
            (old.flags() & NodeFlags::FOCUS_PENDING) | (new.flags() - NodeFlags::FOCUS_PENDING);
        if flags != old.flags() {
            old.set_flags(flags);
        }
        if old.markup() != new.markup() {
            old.set_markup(new.markup());
        }
        if old.policy() != new.policy() {
            old.set_policy(new.policy());
        }

        self.children(old, new);
    }

    fn replace(&mut self, parent: &Node, index: usize, old: &Node, new: &Node) {
        let focus_path = focus::focused_node().and_then(|id| old.path_to(id));

        new.adopt_children();
        parent.replace_child(index, new.clone());
        self.report.replaced += 1;
        trace!(old = ?old, new = ?new, "replaced");

        if let Some(path) = focus_path {
            let target = new.descend(&path).unwrap_or_else(|| new.clone());
            target.insert_flags(NodeFlags::FOCUS_PENDING);
            debug!(target = ?target, "focus moves to replacement");
            self.focus_target = Some(target);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(children: Vec<Node>) -> Node {
        let root = Node::element("div");
        for child in children {
            root.append_child(child);
        }
        root
    }

    fn span(text: &str) -> Node {
        let node = Node::element("span");
        node.append_child(Node::text(text));
        node
    }

    #[test]
    fn test_identical_trees_keep_identity() {
        let live = tree(vec![span("a"), span("b")]);
        let first = live.child(0).unwrap();

        let report = Reconciler::new(8).reconcile(&live, &tree(vec![span("a"), span("b")]), true);

        assert!(report.is_clean());
        assert!(live.child(0).unwrap().ptr_eq(&first));
        assert_eq!(report.kept.len(), 4, "two spans plus their text nodes");
    }

    #[test]
    fn test_changed_leaf_text_is_replaced() {
        let live = tree(vec![span("0")]);
        let before = live.child(0).unwrap();

        let report = Reconciler::new(8).reconcile(&live, &tree(vec![span("5")]), true);

        assert_eq!(report.replaced, 1);
        assert!(!live.child(0).unwrap().ptr_eq(&before));
        assert_eq!(live.to_markup(), "<div><span>5</span></div>");
    }

    #[test]
    fn test_attributes_patched_in_place() {
        let old = Node::element("p");
        old.set_attr("class", "a");
        old.set_attr("title", "t");
        let live = tree(vec![old.clone()]);

        let new = Node::element("p");
        new.set_attr("class", "b");
        Reconciler::new(8).reconcile(&live, &tree(vec![new]), true);

        assert!(live.child(0).unwrap().ptr_eq(&old));
        assert_eq!(old.attr("class").as_deref(), Some("b"));
        assert_eq!(old.attr("title"), None);
    }

    #[test]
    fn test_signature_mismatch_is_incompatible() {
        let reconciler = Reconciler::new(8);
        let a = Node::element("button");
        a.set_signature(Some(1));
        let b = Node::element("button");
        b.set_signature(Some(2));
        let plain = Node::element("button");

        assert!(!reconciler.is_compatible(&a, &b));
        assert!(!reconciler.is_compatible(&a, &plain));
        assert!(reconciler.is_compatible(&plain, &plain.deep_clone()));
    }

    #[test]
    fn test_child_count_tolerance() {
        let reconciler = Reconciler::new(1);
        let list = |n: usize| {
            let ul = Node::element("ul");
            for _ in 0..n {
                ul.append_child(Node::element("li"));
            }
            ul
        };
        assert!(reconciler.is_compatible(&list(2), &list(3)));
        assert!(!reconciler.is_compatible(&list(2), &list(4)));
    }

    #[test]
    fn test_padding_appends_new_children() {
        let ul = Node::element("ul");
        ul.append_child(span("1"));
        let live = tree(vec![ul.clone()]);
        let first = ul.child(0).unwrap();

        let fresh_ul = Node::element("ul");
        fresh_ul.append_child(span("1"));
        fresh_ul.append_child(span("2"));
        Reconciler::new(8).reconcile(&live, &tree(vec![fresh_ul]), true);

        assert!(live.child(0).unwrap().ptr_eq(&ul));
        assert!(ul.child(0).unwrap().ptr_eq(&first));
        assert_eq!(ul.to_markup(), "<ul><span>1</span><span>2</span></ul>");
    }

    #[test]
    fn test_trims_surplus_old_children() {
        let live = tree(vec![span("1"), span("2"), span("3")]);
        Reconciler::new(8).reconcile(&live, &tree(vec![span("1")]), true);
        assert_eq!(live.child_count(), 1);
    }

    #[test]
    fn test_keep_policy_is_untouched() {
        let kept = span("original");
        kept.set_policy(Some(StaticPolicy::Keep));
        let live = tree(vec![kept.clone()]);

        Reconciler::new(8).reconcile(&live, &tree(vec![span("changed")]), true);

        assert!(live.child(0).unwrap().ptr_eq(&kept));
        assert_eq!(kept.text_content(), "original");
    }

    #[test]
    fn test_replace_policy_skips_comparison() {
        let old = span("same");
        old.set_policy(Some(StaticPolicy::Replace));
        let live = tree(vec![old.clone()]);

        let report = Reconciler::new(8).reconcile(&live, &tree(vec![span("same")]), true);

        assert_eq!(report.replaced, 1);
        assert!(!live.child(0).unwrap().ptr_eq(&old));
    }

    #[test]
    fn test_value_field_copied_even_when_replaced() {
        let input = Node::element("input");
        input.set_value(Some("old".into()));
        let live = tree(vec![input.clone()]);

        let fresh = Node::element("input");
        fresh.set_value(Some("new".into()));
        Reconciler::new(8).reconcile(&live, &tree(vec![fresh]), true);

        assert!(live.child(0).unwrap().ptr_eq(&input), "inputs stay in place");
        assert_eq!(input.value().as_deref(), Some("new"));
    }

    #[test]
    fn test_focus_transfers_to_replacement() {
        focus::reset_focus_state();
        let old = Node::element("input");
        old.set_signature(Some(1));
        let live = tree(vec![old.clone()]);
        focus::focus(old.id());

        let fresh = Node::element("input");
        fresh.set_signature(Some(2));
        Reconciler::new(8).reconcile(&live, &tree(vec![fresh.clone()]), true);

        assert!(focus::is_focused(fresh.id()));
        assert!(!fresh.flags().contains(NodeFlags::FOCUS_PENDING));
        focus::reset_focus_state();
    }

    #[test]
    fn test_aliased_fresh_node_is_copied() {
        let shared = span("x");
        let live = tree(vec![Node::comment("c")]);
        let elsewhere = Node::element("aside");
        elsewhere.append_child(shared.clone());

        let fresh = Node::element("div");
        fresh.push_alias(shared.clone());
        let report = Reconciler::new(8).reconcile(&live, &fresh, true);

        assert_eq!(report.aliased, 1);
        assert!(elsewhere.child(0).unwrap().ptr_eq(&shared), "never stolen");
        assert_eq!(live.to_markup(), "<div><span>x</span></div>");
    }

    #[test]
    fn test_kept_node_ignores_aliased_counterpart() {
        let shared = span("x");
        let elsewhere = Node::element("aside");
        elsewhere.append_child(shared.clone());

        let live = tree(vec![span("a")]);
        live.child(0).unwrap().set_policy(Some(StaticPolicy::Keep));
        let fresh = Node::element("div");
        fresh.push_alias(shared);
        let report = Reconciler::new(8).reconcile(&live, &fresh, true);

        assert_eq!(report.aliased, 0, "nothing was copied");
        assert!(report.is_clean());
        assert_eq!(live.to_markup(), "<div><span>a</span></div>");
    }
}
