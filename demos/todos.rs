//! Todos Example - Loops, two-way binding and identity preservation
//!
//! This example demonstrates:
//! - Iterating a model collection with `v-for`
//! - Checkbox binding that writes back into a loop item
//! - Loop reuse when an unrelated key changes
//! - Batched edits rendering once
//!
//! Run with: RUST_LOG=spark_bind=trace cargo run --example todos

use std::io;

use spark_bind::{
    inspect, mount, ModelDefinition, Node, TemplateElement, UnitConfig, Value,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== spark-bind Todos Example ===\n");

    let config = UnitConfig::from_json(r#"{ "debounce_ms": 5 }"#)?;
    let definition = ModelDefinition::from_json(serde_json::json!({
        "title": "Groceries",
        "draft": "",
        "todos": [
            {"text": "milk", "done": false},
            {"text": "eggs", "done": true},
        ],
    }))
    .method("add", |this, _| {
        let draft = this.get("draft");
        if draft.to_display().trim().is_empty() {
            return Value::Undefined;
        }
        let mut todos = this.get("todos").as_array().map(<[Value]>::to_vec).unwrap_or_default();
        todos.push(Value::from(serde_json::json!({"text": draft.to_display(), "done": false})));
        let _ = this.write("todos", todos);
        let _ = this.write("draft", "");
        Value::Undefined
    });

    let template = TemplateElement::new("section")
        .child(TemplateElement::new("h1").text("{{ title }} ({{ todos.length }})"))
        .child(
            TemplateElement::new("ul").child(
                TemplateElement::new("li")
                    .attr("v-for", "(todo, i) in todos")
                    .attr(":class", "{ done: todo.done }")
                    .child(
                        TemplateElement::new("input")
                            .attr("type", "checkbox")
                            .attr("v-model", "todo.done"),
                    )
                    .child(TemplateElement::new("span").text("{{ i + 1 }}. {{ todo.text }}")),
            ),
        )
        .child(TemplateElement::new("input").attr("v-model", "draft"))
        .child(TemplateElement::new("button").attr("@click", "add()").text("add"))
        .into();

    let anchor = Node::element("app");
    let unit = mount(definition, template, &anchor, config)?;
    inspect(&mut io::stdout(), &anchor)?;

    let section = anchor.child(0).ok_or("nothing rendered")?;
    let list = section.child(1).ok_or("missing list")?;

    println!("\nTicking off 'milk'...");
    let first = list.child(0).ok_or("missing first item")?;
    first.child(0).ok_or("missing checkbox")?.toggle(true);
    unit.settle();
    println!("{}", list.to_markup());

    println!("\nRenaming the list (loop output reused)...");
    let kept = list.child(0).ok_or("missing first item")?;
    unit.surface().write("title", "Shopping")?;
    unit.settle();
    println!(
        "  first item identity kept: {}, loop reuses: {}",
        list.child(0).is_some_and(|node| node.ptr_eq(&kept)),
        unit.loop_cache_hits()
    );

    println!("\nAdding 'bread' in one batch...");
    let draft = section.child(2).ok_or("missing draft input")?;
    let add = section.child(3).ok_or("missing add button")?;
    unit.lock();
    draft.input("bread");
    add.click();
    unit.unlock();
    inspect(&mut io::stdout(), &anchor)?;

    println!("\nDiagnostics recorded: {}", unit.diagnostics().len());
    println!("\n=== Example Complete ===");
    Ok(())
}
