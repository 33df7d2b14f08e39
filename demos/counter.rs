//! Counter Example - Model writes and debounced renders
//!
//! This example demonstrates the basic cycle of spark-bind:
//! - Declaring a model and a template
//! - Clicking a bound button to write the model
//! - Letting the scheduler coalesce writes into one render
//!
//! Run with: RUST_LOG=spark_bind=debug cargo run --example counter

use std::io;

use spark_bind::{
    inspect, mount, ModelDefinition, Node, TemplateElement, UnitConfig, Value,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== spark-bind Counter Example ===\n");

    let definition = ModelDefinition::new()
        .data("count", 0)
        .method("reset", |this, _| {
            let _ = this.write("count", 0);
            Value::Undefined
        })
        .watch("count", |new, old| {
            println!("  watch: count {} -> {}", old.to_display(), new.to_display());
        });

    let template = TemplateElement::new("div")
        .attr("class", "counter")
        .child(TemplateElement::new("span").text("Count: {{ count }}"))
        .child(TemplateElement::new("button").attr("@click", "count++").text("+"))
        .child(TemplateElement::new("button").attr("@click", "count--").text("-"))
        .child(
            TemplateElement::new("button")
                .attr("@click", "reset()")
                .attr(":disabled", "count === 0")
                .text("reset"),
        )
        .into();

    let anchor = Node::element("app");
    let unit = mount(definition, template, &anchor, UnitConfig::default())?;

    println!("Initial tree:");
    inspect(&mut io::stdout(), &anchor)?;

    let div = anchor.child(0).ok_or("nothing rendered")?;
    let plus = div.child(1).ok_or("missing + button")?;
    println!("\nClicking + three times...");
    for _ in 0..3 {
        plus.click();
    }
    println!("  model now: {}", unit.surface().get("count").to_display());
    println!("  state: {:?}", unit.state());

    unit.settle();
    println!("\nAfter one debounced render (renders so far: {}):", unit.render_count());
    inspect(&mut io::stdout(), &anchor)?;

    println!("\nClicking reset...");
    div.child(3).ok_or("missing reset button")?.click();
    unit.settle();
    println!("{}", anchor.to_markup());

    println!("\n=== Example Complete ===");
    Ok(())
}
