//! Template Renderer - Static template + scope -> fresh output tree.
//!
//! # Per-element directive order
//!
//! 1. **Conditional** (`v-if` / `v-else`): false emits one placeholder and
//!    stops.
//! 2. **Visibility** (`v-show`): false marks the rendered node hidden.
//! 3. **Iteration** (`v-for`): one clone per entry, each rendered under a
//!    copy of the scope extended with the loop variables. Unchanged
//!    collections reuse the previous output (see [`LoopCache`]).
//!
//! Then, in template order: plain attributes (with `{{ }}` substitution),
//! passthrough markers, attribute bindings, two-way binding, event bindings,
//! the event signature, and finally either injected markup or children.
//!
//! The renderer never touches the live tree; [`diff::Reconciler`] does.

pub mod diff;
pub mod inspect;
pub mod signature;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::expr::{Evaluator, Mode, Place, Scope};
use crate::primitives::{
    iterate, Conditional, ElementDirectives, ForSpec, LoopCache, LoopKey, Node, NodeFlags,
    TemplateElement, TemplateNode,
};
use crate::state::diagnostics::DiagnosticKind;
use crate::state::events::Event;
use crate::types::Value;

pub use diff::{ReconcileReport, Reconciler};
pub use inspect::{inspect, inspect_plain};
pub use signature::{content_checksum, event_signature, scope_hash};

/// How a two-way binding reads and writes its control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Text,
    Number,
    Checkbox,
    Radio,
    Select,
}

fn control_of(element: &TemplateElement) -> Control {
    match element.tag.as_str() {
        "select" => Control::Select,
        "input" => match element
            .attr_value("type")
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("checkbox") => Control::Checkbox,
            Some("radio") => Control::Radio,
            Some("number" | "range") => Control::Number,
            _ => Control::Text,
        },
        _ => Control::Text,
    }
}

/// List `node` under `parent`: fresh nodes are adopted, reused live nodes
/// are aliased so they stay where they are until reconciliation.
fn attach(parent: &Node, node: Node) {
    if node.parent().is_some() {
        parent.push_alias(node);
    } else {
        parent.append_child(node);
    }
}

/// Apply an evaluated attribute binding.
fn apply_binding(node: &Node, name: &str, value: &Value) {
    match value {
        Value::Bool(true) => node.set_attr(name, ""),
        Value::Bool(false) | Value::Undefined | Value::Null => {
            node.remove_attr(name);
        }
        // Class-list idiom: truthy keys, space-joined
        Value::Object(map) => {
            let keys: Vec<&str> = map
                .iter()
                .filter(|(_, enabled)| enabled.is_truthy())
                .map(|(key, _)| key.as_str())
                .collect();
            node.set_attr(name, keys.join(" "));
        }
        other => node.set_attr(name, other.to_display()),
    }

    match name {
        "value" => node.set_value(Some(value.to_display())),
        "checked" => node.set_checked(Some(value.is_truthy())),
        _ => {}
    }
}

pub struct Renderer {
    evaluator: Evaluator,
    loop_memo: bool,
    loops: RefCell<LoopCache>,
    directives: RefCell<HashMap<usize, Rc<ElementDirectives>>>,
}

impl Renderer {
    pub fn new(evaluator: Evaluator, loop_memo: bool) -> Self {
        Self {
            evaluator,
            loop_memo,
            loops: RefCell::new(LoopCache::new()),
            directives: RefCell::new(HashMap::new()),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    // -------------------------------------------------------------------------
    // passes
    // -------------------------------------------------------------------------

    /// Start a render pass.
    pub fn begin_pass(&self) {
        self.loops.borrow_mut().begin_pass();
    }

    /// Finish a pass once its output has been reconciled into the live tree.
    pub fn end_pass(&self, report: &ReconcileReport) {
        let mut loops = self.loops.borrow_mut();
        loops.sweep();
        if report.aliased > 0 {
            // Some reused output was copied; cached roots may no longer be live
            loops.clear();
        } else {
            loops.remap(&report.kept);
        }
    }

    /// Number of loop sites currently memoized.
    pub fn memoized_loops(&self) -> usize {
        self.loops.borrow().len()
    }

    /// Loop reuses since creation.
    pub fn loop_hits(&self) -> usize {
        self.loops.borrow().hits()
    }

    // -------------------------------------------------------------------------
    // rendering
    // -------------------------------------------------------------------------

    /// Render `template` as the only child list of `container`.
    pub fn render_into(&self, template: &TemplateNode, scope: &Scope, container: &Node) {
        self.render_children(std::slice::from_ref(template), scope, container);
    }

    /// Render one template node. `hide` marks the produced node(s) hidden.
    pub fn render(&self, template: &TemplateNode, scope: &Scope, hide: bool) -> Vec<Node> {
        match template {
            TemplateNode::Text(text) => vec![Node::text(self.interpolate(text, scope))],
            TemplateNode::Comment(text) => vec![Node::comment(text.as_str())],
            TemplateNode::Element(element) => {
                let directives = self.directives_for(element);
                if let Some(Conditional::If(expr)) = &directives.conditional {
                    if !self.truthy(expr, scope) {
                        return vec![Node::placeholder()];
                    }
                }
                self.render_element(element, &directives, scope, hide)
            }
        }
    }

    fn render_children(&self, children: &[TemplateNode], scope: &Scope, parent: &Node) {
        // Outcome of the nearest preceding `v-if` sibling
        let mut previous: Option<bool> = None;

        for child in children {
            let TemplateNode::Element(element) = child else {
                if !child.is_blank_text() {
                    previous = None;
                }
                for node in self.render(child, scope, false) {
                    attach(parent, node);
                }
                continue;
            };

            let directives = self.directives_for(element);
            let visible = match &directives.conditional {
                Some(Conditional::If(expr)) => {
                    let outcome = self.truthy(expr, scope);
                    previous = Some(outcome);
                    outcome
                }
                Some(Conditional::Else) => match previous.take() {
                    Some(outcome) => !outcome,
                    None => {
                        self.evaluator.diagnostics().report(
                            DiagnosticKind::Syntax,
                            "`v-else` without a preceding `v-if`",
                            element.tag.as_str(),
                        );
                        true
                    }
                },
                None => {
                    previous = None;
                    true
                }
            };

            let nodes = if visible {
                self.render_element(element, &directives, scope, false)
            } else {
                vec![Node::placeholder()]
            };
            for node in nodes {
                attach(parent, node);
            }
        }
    }

    fn render_element(
        &self,
        element: &TemplateElement,
        directives: &ElementDirectives,
        scope: &Scope,
        hide: bool,
    ) -> Vec<Node> {
        let hidden = hide
            || directives
                .show
                .as_ref()
                .is_some_and(|expr| !self.truthy(expr, scope));

        match &directives.each {
            Some(spec) => self.render_loop(element, directives, spec, scope, hidden),
            None => vec![self.build_element(element, directives, scope, hidden)],
        }
    }

    fn render_loop(
        &self,
        element: &TemplateElement,
        directives: &ElementDirectives,
        spec: &ForSpec,
        scope: &Scope,
        hidden: bool,
    ) -> Vec<Node> {
        let collection = self
            .evaluator
            .evaluate(&spec.source, scope, Mode::Expression);
        let checksum = content_checksum(&collection) ^ u64::from(hidden);
        let key = LoopKey {
            site: element.site(),
            source: spec.text.clone(),
            scope_hash: scope_hash(scope),
        };

        if self.loop_memo {
            if let Some(roots) = self.loops.borrow_mut().lookup(&key, checksum) {
                return roots;
            }
        }

        let entries = iterate(&collection).unwrap_or_else(|message| {
            self.evaluator
                .diagnostics()
                .report(DiagnosticKind::Type, message, spec.source.as_str());
            Vec::new()
        });

        // Loop variables remember where in the model they came from
        let origin = match self.evaluator.place_of(&spec.source, scope) {
            Ok(Place::Model(path)) => Some(path),
            _ => None,
        };

        let mut roots = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut local = scope.clone();
            match (&origin, &entry.segment) {
                (Some(base), Some(segment)) => {
                    local.bind_from(&spec.item, entry.item, base.child(segment));
                }
                _ => local.bind(&spec.item, entry.item),
            }
            if let Some(name) = &spec.index {
                local.bind(name, entry.index);
            }
            if let Some(name) = &spec.count {
                local.bind(name, entry.count);
            }
            roots.push(self.build_element(element, directives, &local, hidden));
        }

        if self.loop_memo {
            self.loops.borrow_mut().store(key, checksum, roots.clone());
        }
        roots
    }

    fn build_element(
        &self,
        element: &TemplateElement,
        directives: &ElementDirectives,
        scope: &Scope,
        hidden: bool,
    ) -> Node {
        let node = Node::element(&element.tag);

        for attr in &directives.plain {
            if directives.binds(&attr.name) {
                continue;
            }
            node.set_attr(&attr.name, self.interpolate(&attr.value, scope));
        }
        for marker in &directives.passthrough {
            node.set_attr(&marker.name, marker.value.as_str());
        }
        node.set_policy(directives.policy);

        for (name, expr) in &directives.bindings {
            let value = self.evaluator.evaluate(expr, scope, Mode::Expression);
            apply_binding(&node, name, &value);
        }

        if let Some(target) = &directives.model {
            self.bind_model(&node, element, target, scope);
        }
        for (event, handler) in &directives.events {
            self.bind_event(&node, event, handler, scope);
        }

        if directives.has_listeners() {
            let mut sources: Vec<&str> = Vec::new();
            for (event, handler) in &directives.events {
                sources.push(event);
                sources.push(handler);
            }
            if let Some(target) = &directives.model {
                sources.push("v-model");
                sources.push(target);
            }
            node.set_signature(Some(event_signature(sources, scope)));
        }

        if hidden {
            node.insert_flags(NodeFlags::HIDDEN);
        }

        match &directives.html {
            Some(expr) => {
                let markup = self.evaluator.evaluate(expr, scope, Mode::Expression);
                node.set_markup(Some(markup.to_display()));
            }
            None => self.render_children(&element.children, scope, &node),
        }

        node
    }

    // -------------------------------------------------------------------------
    // bindings
    // -------------------------------------------------------------------------

    /// Two-way binding: seed the control from the model and write user edits
    /// back, only when they differ from the currently bound value.
    fn bind_model(&self, node: &Node, element: &TemplateElement, target: &str, scope: &Scope) {
        let current = self.evaluator.evaluate(target, scope, Mode::Expression);

        let write_back = {
            let evaluator = self.evaluator.clone();
            let target = target.to_string();
            let scope = scope.clone();
            move |next: Value| {
                let last = evaluator.evaluate(&target, &scope, Mode::Expression);
                if last != next {
                    evaluator.assign(&target, &scope, next);
                }
            }
        };

        match control_of(element) {
            Control::Checkbox => {
                node.set_checked(Some(current.is_truthy()));
                node.add_listener("change", move |event: &Event| {
                    write_back(Value::Bool(event.checked.unwrap_or(false)));
                });
            }
            Control::Radio => {
                let own = node.attr("value").unwrap_or_default();
                node.set_checked(Some(current.to_display() == own));
                node.add_listener("change", move |event: &Event| {
                    if event.checked == Some(true) {
                        write_back(Value::from(own.as_str()));
                    }
                });
            }
            Control::Number => {
                node.set_value(Some(current.to_display()));
                node.add_listener("input", move |event: &Event| {
                    let raw = event.value.clone().unwrap_or_default();
                    let next = match raw.trim().parse::<f64>() {
                        Ok(n) => Value::Number(n),
                        Err(_) => Value::String(raw),
                    };
                    write_back(next);
                });
            }
            Control::Text | Control::Select => {
                let event_name = if control_of(element) == Control::Select {
                    "change"
                } else {
                    "input"
                };
                node.set_value(Some(current.to_display()));
                node.add_listener(event_name, move |event: &Event| {
                    write_back(Value::String(event.value.clone().unwrap_or_default()));
                });
            }
        }
    }

    /// Event binding: run the statement with `$event` in scope; a callable
    /// result is invoked with the event.
    fn bind_event(&self, node: &Node, event: &str, handler: &str, scope: &Scope) {
        let evaluator = self.evaluator.clone();
        let handler = handler.to_string();
        let scope = scope.clone();

        node.add_listener(event, move |event: &Event| {
            let payload = event.to_value();
            let local = scope.with("$event", payload.clone());
            if let Value::Function(func) = evaluator.evaluate(&handler, &local, Mode::Statement) {
                func.call(evaluator.surface(), &[payload]);
            }
        });
    }

    // -------------------------------------------------------------------------
    // helpers
    // -------------------------------------------------------------------------

    fn truthy(&self, expr: &str, scope: &Scope) -> bool {
        self.evaluator
            .evaluate(expr, scope, Mode::Expression)
            .is_truthy()
    }

    fn directives_for(&self, element: &TemplateElement) -> Rc<ElementDirectives> {
        let site = element.site();
        if let Some(parsed) = self.directives.borrow().get(&site) {
            return parsed.clone();
        }
        let parsed = Rc::new(ElementDirectives::parse(
            element,
            self.evaluator.diagnostics(),
        ));
        self.directives.borrow_mut().insert(site, parsed.clone());
        parsed
    }

    /// Substitute every `{{ expr }}` span.
    pub fn interpolate(&self, text: &str, scope: &Scope) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let inner = &rest[start + 2..];
            let Some(end) = inner.find("}}") else {
                self.evaluator
                    .diagnostics()
                    .report(DiagnosticKind::Syntax, "unclosed `{{`", text);
                out.push_str(&rest[start..]);
                return out;
            };
            let value = self
                .evaluator
                .evaluate(&inner[..end], scope, Mode::Expression);
            out.push_str(&value.to_display());
            rest = &inner[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

// =============================================================================
// Tests
// =============================================================================
