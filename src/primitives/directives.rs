//! Directive vocabulary and per-element classification.
//!
//! | Authored                       | Meaning                                   |
//! |--------------------------------|-------------------------------------------|
//! | `v-if`, `v-else`               | Conditional render (placeholder if false) |
//! | `v-show`                       | Visibility toggle                         |
//! | `v-for`                        | Iteration                                 |
//! | `v-model`                      | Two-way value binding                     |
//! | `@event`, `v-on:event`         | Event binding                             |
//! | `:name`, `v-bind:name`         | Attribute-value binding                   |
//! | `v-html`                       | Raw-markup injection                      |
//! | `v-static`, `v-component`      | Passthrough markers (re-emitted verbatim) |
//!
//! `v-sig` is reserved for the renderer's own event-signature marker. Any
//! other `v-*` name is reported and ignored.

use super::node::StaticPolicy;
use super::template::{TemplateAttr, TemplateElement};
use crate::expr::is_identifier;
use crate::state::diagnostics::{DiagnosticKind, Diagnostics};

/// Reserved signature marker name.
pub const SIGNATURE_MARKER: &str = "v-sig";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional {
    If(String),
    Else,
}

/// Parsed `v-for` value: `item[, index[, count]] in source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForSpec {
    pub item: String,
    pub index: Option<String>,
    pub count: Option<String>,
    /// Collection expression.
    pub source: String,
    /// Whole directive value as authored.
    pub text: String,
}

/// Parse a `v-for` value.
///
/// ```ignore
/// let spec = parse_for("(todo, i) in todos")?;
/// assert_eq!(spec.index.as_deref(), Some("i"));
/// ```
pub fn parse_for(text: &str) -> Result<ForSpec, String> {
    let (vars, source) = text
        .split_once(" in ")
        .ok_or_else(|| format!("expected `item in collection`, got `{text}`"))?;

    let vars = vars.trim();
    let vars = vars
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(vars);
    let names: Vec<&str> = vars.split(',').map(str::trim).collect();
    if names.len() > 3 || names.iter().any(|name| !is_identifier(name)) {
        return Err(format!("invalid loop variables `{vars}`"));
    }

    let source = source.trim();
    if source.is_empty() {
        return Err("missing collection expression".to_string());
    }

    Ok(ForSpec {
        item: names[0].to_string(),
        index: names.get(1).map(|name| name.to_string()),
        count: names.get(2).map(|name| name.to_string()),
        source: source.to_string(),
        text: text.trim().to_string(),
    })
}

/// Everything the renderer needs to know about one element's attributes.
#[derive(Debug, Clone, Default)]
pub struct ElementDirectives {
    pub conditional: Option<Conditional>,
    pub show: Option<String>,
    pub each: Option<ForSpec>,
    pub model: Option<String>,
    /// `(event, statement)` pairs in authoring order.
    pub events: Vec<(String, String)>,
    /// `(attribute, expression)` pairs in authoring order.
    pub bindings: Vec<(String, String)>,
    pub html: Option<String>,
    pub policy: Option<StaticPolicy>,
    /// Markers copied to output verbatim.
    pub passthrough: Vec<TemplateAttr>,
    /// Non-directive attributes.
    pub plain: Vec<TemplateAttr>,
}

impl ElementDirectives {
    /// Classify an element's attributes, reporting unknown or malformed ones.
    pub fn parse(element: &TemplateElement, diagnostics: &Diagnostics) -> Self {
        let mut out = Self::default();

        for attr in &element.attrs {
            let name = attr.name.as_str();
            let value = attr.value.trim();

            if let Some(event) = name.strip_prefix('@').or_else(|| name.strip_prefix("v-on:")) {
                // Modifiers (`@click.prevent`) carry no meaning here
                let event = event.split('.').next().unwrap_or(event);
                out.events.push((event.to_string(), value.to_string()));
                continue;
            }
            if let Some(target) = name.strip_prefix(':').or_else(|| name.strip_prefix("v-bind:")) {
                out.bindings.push((target.to_string(), value.to_string()));
                continue;
            }
            if !name.starts_with("v-") {
                out.plain.push(attr.clone());
                continue;
            }

            match name {
                "v-if" => out.conditional = Some(Conditional::If(value.to_string())),
                "v-else" => out.conditional = Some(Conditional::Else),
                "v-show" => out.show = Some(value.to_string()),
                "v-for" => match parse_for(value) {
                    Ok(spec) => out.each = Some(spec),
                    Err(message) => diagnostics.report(DiagnosticKind::Syntax, message, value),
                },
                "v-model" => out.model = Some(value.to_string()),
                "v-html" => out.html = Some(value.to_string()),
                "v-static" => {
                    out.policy = match value {
                        "replace" => Some(StaticPolicy::Replace),
                        "" | "keep" => Some(StaticPolicy::Keep),
                        other => {
                            diagnostics.report(
                                DiagnosticKind::Syntax,
                                format!("unknown static policy `{other}`"),
                                other,
                            );
                            None
                        }
                    };
                    out.passthrough.push(attr.clone());
                }
                "v-component" => out.passthrough.push(attr.clone()),
                SIGNATURE_MARKER => diagnostics.report(
                    DiagnosticKind::UnknownDirective,
                    "`v-sig` is reserved and cannot be authored",
                    name,
                ),
                _ => diagnostics.report(
                    DiagnosticKind::UnknownDirective,
                    format!("unknown directive `{name}`"),
                    name,
                ),
            }
        }

        out
    }

    /// Whether a binding directive shadows the plain attribute `name`.
    pub fn binds(&self, name: &str) -> bool {
        self.bindings.iter().any(|(target, _)| target == name)
    }

    /// Whether the element carries event or value bindings (and so a signature).
    pub fn has_listeners(&self) -> bool {
        !self.events.is_empty() || self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_for_variants() {
        let spec = parse_for("item in items").unwrap();
        assert_eq!(spec.item, "item");
        assert_eq!(spec.index, None);
        assert_eq!(spec.source, "items");

        let spec = parse_for("(value, key, n) in user").unwrap();
        assert_eq!(spec.index.as_deref(), Some("key"));
        assert_eq!(spec.count.as_deref(), Some("n"));

        let spec = parse_for("n in [1, 2, 3]").unwrap();
        assert_eq!(spec.source, "[1, 2, 3]");
    }

    #[test]
    fn test_parse_for_rejects_malformed() {
        assert!(parse_for("items").is_err());
        assert!(parse_for("a, b, c, d in items").is_err());
        assert!(parse_for("1x in items").is_err());
        assert!(parse_for("item in ").is_err());
    }

    #[test]
    fn test_classification() {
        let element = TemplateElement::new("input")
            .attr("type", "text")
            .attr("v-model", "name")
            .attr("@keyup.enter", "submit()")
            .attr(":class", "{ active: on }")
            .attr("v-static", "replace");
        let diagnostics = Diagnostics::new(8);
        let directives = ElementDirectives::parse(&element, &diagnostics);

        assert_eq!(directives.model.as_deref(), Some("name"));
        assert_eq!(directives.events, vec![("keyup".into(), "submit()".into())]);
        assert!(directives.binds("class"));
        assert_eq!(directives.policy, Some(StaticPolicy::Replace));
        assert_eq!(directives.passthrough.len(), 1);
        assert_eq!(directives.plain.len(), 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_and_reserved_directives_are_reported() {
        let element = TemplateElement::new("div")
            .attr("v-frobnicate", "x")
            .attr("v-sig", "123");
        let diagnostics = Diagnostics::new(8);
        let directives = ElementDirectives::parse(&element, &diagnostics);

        assert_eq!(diagnostics.count(DiagnosticKind::UnknownDirective), 2);
        assert!(directives.plain.is_empty(), "directives never become plain attrs");
    }
}
