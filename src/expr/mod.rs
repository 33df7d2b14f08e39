//! Expression Evaluator - Bound expressions over model and local scope.
//!
//! Templates embed a narrow expression language in moustache spans,
//! directive values and event handlers:
//!
//! - literals (numbers, strings, `true`/`false`/`null`/`undefined`, arrays, objects)
//! - property access (`a.b`, `a[i]`), calls (`remove(i)`, `name.trim()`)
//! - arithmetic, comparison, logical (`&&`, `||`, `??`), ternary, `typeof`
//! - assignment (`=`, `+=`, `-=`, `*=`, `/=`) and `++`/`--`
//!
//! # Name resolution
//!
//! A bare identifier resolves, in order, to a transient binding made earlier
//! in the same statement list, a local from the [`Scope`], a declared model
//! key, or `$parent` (the reactive surface handed down by a parent unit).
//! Anything else is a reference error.
//!
//! # Writes
//!
//! Assignments to model keys route through the reactive write path.
//! Assignments to loop variables that remember where they were read from
//! (`item.done = true`) write back to that model location. Anything else is a
//! transient binding that disappears when evaluation ends.
//!
//! # Failure
//!
//! [`Evaluator::evaluate`] never fails: reference, syntax and type errors are
//! reported to the unit's [`Diagnostics`] and the result is `Value::Null`.

mod ast;
mod interpreter;
mod lexer;
mod parser;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::trace;

use crate::engine::Reactive;
use crate::state::diagnostics::{DiagnosticKind, Diagnostics};
use crate::types::{Path, Value};

pub use ast::Program;
pub use lexer::is_identifier;

use interpreter::Interpreter;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprErrorKind {
    Reference,
    Syntax,
    Type,
    InvalidPath,
}

impl fmt::Display for ExprErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExprErrorKind::Reference => "reference error",
            ExprErrorKind::Syntax => "syntax error",
            ExprErrorKind::Type => "type error",
            ExprErrorKind::InvalidPath => "invalid path",
        })
    }
}

/// Expression failure. Never escapes [`Evaluator::evaluate`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ExprError {
    pub kind: ExprErrorKind,
    pub message: String,
}

impl ExprError {
    pub fn new(kind: ExprErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self.kind {
            ExprErrorKind::Reference => DiagnosticKind::Reference,
            ExprErrorKind::Syntax => DiagnosticKind::Syntax,
            ExprErrorKind::Type => DiagnosticKind::Type,
            ExprErrorKind::InvalidPath => DiagnosticKind::InvalidPath,
        }
    }
}

impl From<crate::error::Error> for ExprError {
    fn from(err: crate::error::Error) -> Self {
        ExprError::new(ExprErrorKind::InvalidPath, err.to_string())
    }
}

// =============================================================================
// Scope
// =============================================================================

/// One local binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub value: Value,
    /// Model path the value was read from, if any.
    pub origin: Option<Path>,
}

/// Local variables visible to an expression (loop variables, `$event`).
///
/// Names starting with `$` are internal and excluded from
/// [`Scope::public`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: IndexMap<String, Local>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value with no model provenance.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) {
        self.vars.insert(
            name.to_string(),
            Local {
                value: value.into(),
                origin: None,
            },
        );
    }

    /// Bind a value read from `origin` in the model.
    pub fn bind_from(&mut self, name: &str, value: Value, origin: Path) {
        self.vars.insert(
            name.to_string(),
            Local {
                value,
                origin: Some(origin),
            },
        );
    }

    /// Copy of this scope with one extra binding.
    pub fn with(&self, name: &str, value: impl Into<Value>) -> Self {
        let mut scope = self.clone();
        scope.bind(name, value);
        scope
    }

    pub fn get(&self, name: &str) -> Option<&Local> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Non-internal bindings, in binding order.
    pub fn public(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars
            .iter()
            .filter(|(name, _)| !name.starts_with('$'))
            .map(|(name, local)| (name.as_str(), &local.value))
    }
}

// =============================================================================
// Places
// =============================================================================

/// Writable location an assignment target resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    /// Path in this unit's model.
    Model(Path),
    /// Path in the parent unit's model.
    Parent(Path),
    /// Transient local binding, optionally into a nested field.
    Local(String, Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Single expression (moustache spans, directive values).
    Expression,
    /// `;`-separated statements (event handlers).
    Statement,
}

// =============================================================================
// Evaluator
// =============================================================================

/// Parsed-program cache keyed by source and mode.
#[derive(Default)]
pub struct ExprCache {
    programs: RefCell<HashMap<(String, Mode), Rc<Result<Program, ExprError>>>>,
}

impl ExprCache {
    fn get_or_parse(&self, src: &str, mode: Mode) -> Rc<Result<Program, ExprError>> {
        let key = (src.to_string(), mode);
        if let Some(program) = self.programs.borrow().get(&key) {
            return program.clone();
        }
        let parsed = match mode {
            Mode::Expression => parser::parse_expression(src),
            Mode::Statement => parser::parse_statements(src),
        };
        let program = Rc::new(parsed);
        self.programs.borrow_mut().insert(key, program.clone());
        program
    }

    pub fn len(&self) -> usize {
        self.programs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.borrow().is_empty()
    }
}

/// Evaluates expressions for one unit.
///
/// Cloning is cheap; clones share the parse cache and diagnostics.
#[derive(Clone)]
pub struct Evaluator {
    surface: Reactive,
    keys: Rc<HashSet<String>>,
    parent: Option<Reactive>,
    cache: Rc<ExprCache>,
    diagnostics: Diagnostics,
}

impl Evaluator {
    pub fn new(surface: Reactive, keys: Rc<HashSet<String>>, diagnostics: Diagnostics) -> Self {
        Self {
            surface,
            keys,
            parent: None,
            cache: Rc::new(ExprCache::default()),
            diagnostics,
        }
    }

    /// Expose a parent unit's surface as `$parent`.
    pub fn with_parent(mut self, parent: Reactive) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn surface(&self) -> &Reactive {
        &self.surface
    }

    pub fn parent(&self) -> Option<&Reactive> {
        self.parent.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn cache(&self) -> &ExprCache {
        &self.cache
    }

    #[inline]
    pub fn is_model_key(&self, name: &str) -> bool {
        self.keys.contains(name)
    }

    /// Evaluate, reporting any failure and yielding `Value::Null` instead.
    pub fn evaluate(&self, src: &str, scope: &Scope, mode: Mode) -> Value {
        match self.try_evaluate(src, scope, mode) {
            Ok(value) => value,
            Err(err) => {
                self.report(&err, src);
                Value::Null
            }
        }
    }

    /// Evaluate, returning the failure to the caller.
    pub fn try_evaluate(&self, src: &str, scope: &Scope, mode: Mode) -> Result<Value, ExprError> {
        let trimmed = src.trim();

        // Fast path: a bare local or model key
        if is_identifier(trimmed) {
            if let Some(local) = scope.get(trimmed) {
                return Ok(Interpreter::new(self, scope).local_value(local));
            }
            if self.is_model_key(trimmed) {
                return Ok(self.surface.get(trimmed));
            }
        }

        let program = self.cache.get_or_parse(trimmed, mode);
        let program = program.as_ref().as_ref().map_err(Clone::clone)?;
        trace!(src = trimmed, "evaluate");
        Interpreter::new(self, scope).run(program)
    }

    /// Resolve an assignable expression to the location it names.
    pub fn place_of(&self, src: &str, scope: &Scope) -> Result<Place, ExprError> {
        let program = self.cache.get_or_parse(src.trim(), Mode::Expression);
        let program = program.as_ref().as_ref().map_err(Clone::clone)?;
        let target = program
            .0
            .first()
            .ok_or_else(|| ExprError::new(ExprErrorKind::Syntax, "empty binding target"))?;
        Interpreter::new(self, scope).place_of(target)
    }

    /// Store `value` at the location named by `src` (two-way binding write-back).
    ///
    /// Failures are reported and swallowed.
    pub fn assign(&self, src: &str, scope: &Scope, value: Value) {
        let result = self
            .place_of(src, scope)
            .and_then(|place| Interpreter::new(self, scope).store(&place, value));
        if let Err(err) = result {
            self.report(&err, src);
        }
    }

    pub(crate) fn report(&self, err: &ExprError, src: &str) {
        self.diagnostics
            .report(err.diagnostic_kind(), err.to_string(), src.trim());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Model, ModelDefinition};

    fn setup(json: serde_json::Value) -> (Model, Evaluator) {
        let model = Model::new(ModelDefinition::from_json(json)).unwrap();
        let evaluator = Evaluator::new(
            model.surface().clone(),
            model.keys().clone(),
            Diagnostics::new(16),
        );
        (model, evaluator)
    }

    #[test]
    fn test_fast_path_for_bare_identifiers() {
        let (_model, ev) = setup(serde_json::json!({"count": 3}));
        let scope = Scope::new().with("item", "x");

        assert_eq!(ev.evaluate("count", &scope, Mode::Expression), Value::from(3));
        assert_eq!(ev.evaluate(" item ", &scope, Mode::Expression), Value::from("x"));
        assert!(ev.cache().is_empty(), "fast path never parses");
    }

    #[test]
    fn test_locals_shadow_model_keys() {
        let (_model, ev) = setup(serde_json::json!({"name": "model"}));
        let scope = Scope::new().with("name", "local");
        assert_eq!(ev.evaluate("name + '!'", &scope, Mode::Expression), Value::from("local!"));
    }

    #[test]
    fn test_reference_error_is_reported_and_inert() {
        let (_model, ev) = setup(serde_json::json!({"count": 0}));
        let value = ev.evaluate("missing + 1", &Scope::new(), Mode::Expression);

        assert_eq!(value, Value::Null);
        assert_eq!(ev.diagnostics().count(DiagnosticKind::Reference), 1);
    }

    #[test]
    fn test_syntax_error_is_reported_and_inert() {
        let (_model, ev) = setup(serde_json::json!({"count": 0}));
        let value = ev.evaluate("count +", &Scope::new(), Mode::Expression);

        assert_eq!(value, Value::Null);
        assert_eq!(ev.diagnostics().count(DiagnosticKind::Syntax), 1);
    }

    #[test]
    fn test_model_assignment_routes_through_surface() {
        let (model, ev) = setup(serde_json::json!({"count": 1}));
        ev.evaluate("count = count + 4", &Scope::new(), Mode::Statement);
        assert_eq!(model.surface().get("count"), Value::from(5));

        ev.evaluate("count++; ++count", &Scope::new(), Mode::Statement);
        assert_eq!(model.surface().get("count"), Value::from(7));
    }

    #[test]
    fn test_non_model_assignment_is_transient() {
        let (model, ev) = setup(serde_json::json!({"count": 1}));
        let result = ev.evaluate("tmp = 2; tmp * 10", &Scope::new(), Mode::Statement);

        assert_eq!(result, Value::from(20));
        assert_eq!(model.snapshot().get("tmp"), None, "never reaches the model");
        assert_eq!(ev.diagnostics().len(), 0);
    }

    #[test]
    fn test_loop_variable_writes_back_to_origin() {
        let (model, ev) = setup(serde_json::json!({"todos": [{"done": false}]}));
        let mut scope = Scope::new();
        scope.bind_from(
            "item",
            Value::from(serde_json::json!({"done": false})),
            Path::parse("todos.0"),
        );

        ev.evaluate("item.done = !item.done", &scope, Mode::Statement);
        assert_eq!(
            model.surface().read_path(&Path::parse("todos.0.done")),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_numeric_member_segments_read_and_write() {
        let (model, ev) = setup(serde_json::json!({"todos": [{"done": true}, {"done": false}]}));
        let scope = Scope::new();

        assert_eq!(ev.evaluate("todos.0.done", &scope, Mode::Expression), Value::Bool(true));
        assert_eq!(ev.diagnostics().len(), 0);

        ev.evaluate("todos.1.done = true", &scope, Mode::Statement);
        assert_eq!(
            model.surface().read_path(&Path::parse("todos.1.done")),
            Value::Bool(true)
        );
        assert_eq!(
            ev.place_of("todos.1.done", &scope).unwrap(),
            Place::Model(Path::parse("todos.1.done"))
        );
    }

    #[test]
    fn test_place_of_resolution() {
        let (_model, ev) = setup(serde_json::json!({"form": {"name": ""}}));
        let mut scope = Scope::new();
        scope.bind("draft", "");

        assert_eq!(
            ev.place_of("form.name", &scope).unwrap(),
            Place::Model(Path::parse("form.name"))
        );
        assert_eq!(
            ev.place_of("draft", &scope).unwrap(),
            Place::Local("draft".into(), vec![])
        );
        assert!(ev.place_of("1 + 1", &scope).is_err());
    }

    #[test]
    fn test_parent_surface_access() {
        let (parent, _) = setup(serde_json::json!({"total": 2}));
        let (_child, ev) = setup(serde_json::json!({}));
        let ev = ev.with_parent(parent.surface().clone());

        ev.evaluate("$parent.total += 3", &Scope::new(), Mode::Statement);
        assert_eq!(parent.surface().get("total"), Value::from(5));
        assert_eq!(
            ev.evaluate("$parent.total", &Scope::new(), Mode::Expression),
            Value::from(5)
        );
    }

    #[test]
    fn test_scope_public_skips_internal_names() {
        let scope = Scope::new().with("item", 1).with("$event", 2);
        let names: Vec<_> = scope.public().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["item"]);
    }
}
