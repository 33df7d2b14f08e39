//! End-to-end behaviour of mounted units: write → schedule → render → reconcile.

use std::cell::RefCell;
use std::rc::Rc;

use spark_bind::engine::Handler;
use spark_bind::{
    focus, focused_node, mount, reset_focus_state, DiagnosticKind, ModelDefinition, Node,
    Path, Reactive, Reconciler, Renderer, Result, Scope, SchedulerState, TemplateElement,
    TemplateNode, Unit, UnitConfig, Value,
};

fn json_model(json: serde_json::Value) -> ModelDefinition {
    ModelDefinition::from_json(json)
}

fn mount_json(json: serde_json::Value, template: TemplateNode) -> (Node, Unit) {
    let anchor = Node::element("app");
    let unit = mount(json_model(json), template, &anchor, UnitConfig::default()).unwrap();
    (anchor, unit)
}

fn list_template() -> TemplateNode {
    TemplateElement::new("ul")
        .child(TemplateElement::new("li").attr("v-for", "item in items").text("{{ item }}"))
        .into()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_counter_text_follows_model() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"count": 0}),
        TemplateElement::new("span").text("{{count}}").into(),
    );
    assert_eq!(anchor.to_markup(), "<app><span>0</span></app>");

    unit.surface().write("count", 5).unwrap();
    assert_eq!(unit.surface().get("count"), Value::from(5), "write visible before render");

    assert!(unit.flush());
    assert_eq!(anchor.to_markup(), "<app><span>5</span></app>");
    assert_eq!(unit.render_count(), 2);
    assert_eq!(unit.state(), SchedulerState::Idle);
}

#[test]
fn test_appending_to_list_keeps_existing_items() {
    let (anchor, unit) = mount_json(serde_json::json!({"items": [1, 2, 3]}), list_template());
    let ul = anchor.child(0).unwrap();
    let before = ul.children();
    assert_eq!(ul.to_markup(), "<ul><li>1</li><li>2</li><li>3</li></ul>");

    unit.surface()
        .write("items", Value::from(serde_json::json!([1, 2, 3, 4])))
        .unwrap();
    unit.flush();

    assert_eq!(ul.to_markup(), "<ul><li>1</li><li>2</li><li>3</li><li>4</li></ul>");
    for (index, original) in before.iter().enumerate() {
        assert!(ul.child(index).unwrap().ptr_eq(original), "item {index} kept its identity");
    }
}

#[test]
fn test_user_edit_writes_exactly_one_path() {
    let writes = Rc::new(RefCell::new(Vec::new()));
    let seen = writes.clone();
    let definition = ModelDefinition::new()
        .data("name", "abc")
        .data("other", 1)
        .watch("name", move |new, old| seen.borrow_mut().push((new.clone(), old.clone())));

    let anchor = Node::element("app");
    let template = TemplateElement::new("input").attr("v-model", "name").into();
    let unit = mount(definition, template, &anchor, UnitConfig::default()).unwrap();
    let revision = unit.model().revision();
    let before = revision.get();

    anchor.child(0).unwrap().input("xyz");

    assert_eq!(unit.surface().get("name"), Value::from("xyz"));
    assert_eq!(revision.get(), before + 1, "no other path was written");
    assert_eq!(
        *writes.borrow(),
        vec![(Value::from("xyz"), Value::from("abc"))]
    );

    anchor.child(0).unwrap().input("xyz");
    assert_eq!(revision.get(), before + 1, "unchanged edit writes nothing");
}

/// Handler that records every write path.
struct Recorder {
    store: RefCell<Value>,
    log: RefCell<Vec<String>>,
}

impl Recorder {
    fn new(root: serde_json::Value) -> Rc<Self> {
        Rc::new(Self {
            store: RefCell::new(Value::from(root)),
            log: RefCell::new(Vec::new()),
        })
    }
}

impl Handler for Recorder {
    fn read(&self, path: &Path) -> Value {
        self.store.borrow().get_path(path).cloned().unwrap_or_default()
    }

    fn write(&self, path: &Path, value: Value) -> Result<bool> {
        self.log.borrow_mut().push(path.to_string());
        let (last, parents) = path.split_last().unwrap();
        let mut store = self.store.borrow_mut();
        let mut current = &mut *store;
        for segment in parents {
            current = current.get_mut(segment).unwrap();
        }
        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
        Ok(true)
    }

    fn erase(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }
}

#[test]
fn test_whole_object_write_notifies_leaves_then_parent() {
    let recorder = Recorder::new(serde_json::json!({"obj": {}}));
    let root = Reactive::new(recorder.clone());

    let obj = root.read("obj").as_nested().cloned().unwrap();
    obj.write("sub", Value::from(serde_json::json!({"a": 1, "b": 2})))
        .unwrap();

    assert_eq!(
        *recorder.log.borrow(),
        vec!["obj.sub", "obj.sub.a", "obj.sub.b", "obj.sub"],
        "seed, each leaf, then the whole replacement"
    );
    assert_eq!(
        root.read_path(&Path::parse("obj.sub.b")),
        Value::from(2)
    );
}

// =============================================================================
// Properties
// =============================================================================

fn assert_compatible_everywhere(reconciler: &Reconciler, a: &Node, b: &Node) {
    assert!(reconciler.is_compatible(a, b), "{a:?} vs {b:?}");
    for (left, right) in a.children().iter().zip(b.children().iter()) {
        assert_compatible_everywhere(reconciler, left, right);
    }
}

#[test]
fn test_rerender_without_mutation_is_compatible() {
    let definition = json_model(serde_json::json!({
        "title": "Tasks",
        "items": ["a", "b"],
        "open": true,
    }));
    let model = spark_bind::Model::new(definition).unwrap();
    let evaluator = spark_bind::Evaluator::new(
        model.surface().clone(),
        model.keys().clone(),
        spark_bind::Diagnostics::default(),
    );
    let renderer = Renderer::new(evaluator, false);
    let template: TemplateNode = TemplateElement::new("section")
        .child(TemplateElement::new("h1").attr(":title", "title").text("{{ title }}"))
        .child(
            TemplateElement::new("button")
                .attr("v-for", "(item, i) in items")
                .attr("@click", "open = !open")
                .text("{{ i }} {{ item }}"),
        )
        .child(TemplateElement::new("p").attr("v-if", "open").text("open"))
        .into();

    let first = Node::element("root");
    let second = Node::element("root");
    renderer.render_into(&template, &Scope::new(), &first);
    renderer.render_into(&template, &Scope::new(), &second);

    assert_compatible_everywhere(&Reconciler::new(8), &first, &second);
}

#[test]
fn test_changed_handler_scope_forces_replacement() {
    let definition = json_model(serde_json::json!({"items": [1, 2], "picked": 0})).method(
        "pick",
        |this, args| {
            let _ = this.write("picked", args.first().cloned().unwrap_or_default());
            Value::Undefined
        },
    );
    let anchor = Node::element("app");
    let template = TemplateElement::new("nav")
        .child(
            TemplateElement::new("button")
                .attr("v-for", "n in items")
                .attr("@click", "pick(n)")
                .text("go"),
        )
        .into();
    let unit = mount(definition, template, &anchor, UnitConfig::default()).unwrap();
    let nav = anchor.child(0).unwrap();
    let first = nav.child(0).unwrap();

    unit.surface()
        .write("items", Value::from(serde_json::json!([2, 1])))
        .unwrap();
    unit.flush();

    let now_first = nav.child(0).unwrap();
    assert!(!now_first.ptr_eq(&first), "same markup, different handler scope");
    now_first.click();
    assert_eq!(unit.surface().get("picked"), Value::from(2));
}

#[test]
fn test_unchanged_loop_reuses_elements() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"items": [1, 2, 3], "title": "x"}),
        TemplateElement::new("div")
            .child(TemplateElement::new("h2").text("{{ title }}"))
            .child(TemplateElement::new("li").attr("v-for", "item in items").text("{{ item }}"))
            .into(),
    );
    let div = anchor.child(0).unwrap();
    let item = div.child(1).unwrap();

    unit.surface().write("title", "y").unwrap();
    unit.flush();
    assert_eq!(unit.loop_cache_hits(), 1);
    assert!(div.child(1).unwrap().ptr_eq(&item));

    unit.surface().write("title", "z").unwrap();
    unit.flush();
    assert_eq!(unit.loop_cache_hits(), 2, "reuse survives consecutive renders");
    assert!(div.child(1).unwrap().ptr_eq(&item));

    unit.surface()
        .write("items", Value::from(serde_json::json!([1, 2, 4])))
        .unwrap();
    unit.flush();
    assert_eq!(unit.loop_cache_hits(), 2, "changed collection is never reused");
    assert_eq!(div.to_markup(), "<div><h2>z</h2><li>1</li><li>2</li><li>4</li></div>");
}

#[test]
fn test_loop_rerenders_on_changes_between_non_finite_values() {
    let anchor = Node::element("app");
    let definition =
        ModelDefinition::new().data("items", Value::Array(vec![Value::Number(f64::INFINITY)]));
    let template = TemplateElement::new("ul")
        .child(TemplateElement::new("li").attr("v-for", "n in items").text("[{{ n }}]"))
        .into();
    let unit = mount(definition, template, &anchor, UnitConfig::default()).unwrap();
    assert_eq!(anchor.to_markup(), "<app><ul><li>[Infinity]</li></ul></app>");

    let steps = [
        (Value::Number(f64::NEG_INFINITY), "[-Infinity]"),
        (Value::Number(f64::NAN), "[NaN]"),
        (Value::Null, "[]"),
        (Value::Undefined, "[]"),
    ];
    for (element, text) in steps {
        unit.surface().write("items", Value::Array(vec![element])).unwrap();
        assert!(unit.flush());
        assert_eq!(anchor.to_markup(), format!("<app><ul><li>{text}</li></ul></app>"));
    }
    assert_eq!(unit.loop_cache_hits(), 0, "every write changed the collection");
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn test_burst_of_writes_renders_once() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"count": 0}),
        TemplateElement::new("span").text("{{count}}").into(),
    );

    for n in 1..=10 {
        unit.surface().write("count", n).unwrap();
    }
    let deadline = unit.next_deadline().unwrap();
    assert!(unit.tick_at(deadline));
    assert!(!unit.tick_at(deadline), "nothing left to render");

    assert_eq!(unit.render_count(), 2);
    assert_eq!(anchor.to_markup(), "<app><span>10</span></app>");
}

#[test]
fn test_lock_holds_renders_until_unlock() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"count": 0}),
        TemplateElement::new("span").text("{{count}}").into(),
    );

    unit.lock();
    unit.surface().write("count", 7).unwrap();
    assert_eq!(unit.state(), SchedulerState::Locked);
    assert!(!unit.flush());
    assert_eq!(anchor.to_markup(), "<app><span>0</span></app>");

    assert!(unit.unlock());
    assert_eq!(anchor.to_markup(), "<app><span>7</span></app>");
}

// =============================================================================
// Binding
// =============================================================================

#[test]
fn test_todo_checkbox_writes_item_and_rerenders_class() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"todos": [
            {"text": "milk", "done": false},
            {"text": "eggs", "done": false},
        ]}),
        TemplateElement::new("ul")
            .child(
                TemplateElement::new("li")
                    .attr("v-for", "todo in todos")
                    .attr(":class", "{ done: todo.done }")
                    .child(
                        TemplateElement::new("input")
                            .attr("type", "checkbox")
                            .attr("v-model", "todo.done"),
                    )
                    .child(TemplateElement::new("span").text("{{ todo.text }}")),
            )
            .into(),
    );
    let ul = anchor.child(0).unwrap();

    ul.child(1).unwrap().child(0).unwrap().toggle(true);
    assert_eq!(
        unit.surface().read_path(&Path::parse("todos.1.done")),
        Value::Bool(true)
    );

    unit.flush();
    assert_eq!(ul.child(0).unwrap().attr("class").as_deref(), Some(""));
    assert_eq!(ul.child(1).unwrap().attr("class").as_deref(), Some("done"));
    assert_eq!(ul.child(1).unwrap().child(0).unwrap().checked(), Some(true));
}

#[test]
fn test_numeric_path_segments_bind_both_ways() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"todos": [{"done": false}, {"done": true}]}),
        TemplateElement::new("div")
            .child(
                TemplateElement::new("input")
                    .attr("type", "checkbox")
                    .attr("v-model", "todos.0.done"),
            )
            .child(TemplateElement::new("b").text("{{ todos.1.done }}"))
            .into(),
    );
    let div = anchor.child(0).unwrap();
    assert_eq!(div.child(0).unwrap().checked(), Some(false));
    assert_eq!(div.child(1).unwrap().to_markup(), "<b>true</b>");
    assert_eq!(unit.diagnostics().len(), 0);

    div.child(0).unwrap().toggle(true);
    assert_eq!(
        unit.surface().read_path(&Path::parse("todos.0.done")),
        Value::Bool(true)
    );

    unit.flush();
    assert_eq!(div.child(0).unwrap().checked(), Some(true));
    assert_eq!(unit.diagnostics().len(), 0);
}

#[test]
fn test_else_branch_swaps_with_condition() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"logged": false}),
        TemplateElement::new("header")
            .child(TemplateElement::new("b").attr("v-if", "logged").text("hi"))
            .child(TemplateElement::new("a").attr("v-else", "").text("login"))
            .into(),
    );
    assert_eq!(anchor.to_markup(), "<app><header><!--v-if--><a>login</a></header></app>");

    unit.surface().write("logged", true).unwrap();
    unit.flush();
    assert_eq!(anchor.to_markup(), "<app><header><b>hi</b><!--v-if--></header></app>");
}

#[test]
fn test_focus_follows_replaced_subtree() {
    reset_focus_state();
    let (anchor, unit) = mount_json(
        serde_json::json!({"query": "a"}),
        TemplateElement::new("form")
            .attr("v-static", "replace")
            .child(TemplateElement::new("input").attr("v-model", "query"))
            .into(),
    );
    let input = anchor.child(0).unwrap().child(0).unwrap();
    focus(input.id());

    input.input("ab");
    unit.flush();

    let replacement = anchor.child(0).unwrap().child(0).unwrap();
    assert!(!replacement.ptr_eq(&input));
    assert_eq!(focused_node(), Some(replacement.id()));
    assert_eq!(replacement.value().as_deref(), Some("ab"));
}

#[test]
fn test_kept_subtree_is_left_alone() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"n": 1}),
        TemplateElement::new("div")
            .child(TemplateElement::new("aside").attr("v-static", "keep").text("{{ n }}"))
            .child(TemplateElement::new("p").text("{{ n }}"))
            .into(),
    );

    unit.surface().write("n", 2).unwrap();
    unit.flush();
    assert_eq!(
        anchor.to_markup(),
        r#"<app><div><aside v-static="keep">1</aside><p>2</p></div></app>"#
    );
}

#[test]
fn test_errors_are_diagnosed_not_raised() {
    let (anchor, unit) = mount_json(
        serde_json::json!({"ok": 1}),
        TemplateElement::new("div")
            .attr("v-unknown", "x")
            .child(TemplateElement::new("p").text("{{ nope }}"))
            .child(TemplateElement::new("p").text("{{ ok + }}"))
            .child(TemplateElement::new("p").text("{{ ok }}"))
            .into(),
    );

    assert_eq!(anchor.to_markup(), "<app><div><p></p><p></p><p>1</p></div></app>");
    let diagnostics = unit.diagnostics();
    assert_eq!(diagnostics.count(DiagnosticKind::UnknownDirective), 1);
    assert_eq!(diagnostics.count(DiagnosticKind::Reference), 1);
    assert_eq!(diagnostics.count(DiagnosticKind::Syntax), 1);
}
