//! Tree-walking interpreter over parsed programs.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::ast::{BinaryOp, Expr, LogicalOp, Program, Prop, UnaryOp};
use super::{Evaluator, ExprError, ExprErrorKind, Local, Place, Scope};
use crate::engine::Reactive;
use crate::types::{Object, Path, Value};

const PARENT: &str = "$parent";

fn type_error(message: impl Into<String>) -> ExprError {
    ExprError::new(ExprErrorKind::Type, message)
}

/// One evaluation. Transient bindings live in `overlay` and die with it.
pub(super) struct Interpreter<'a> {
    ev: &'a Evaluator,
    scope: &'a Scope,
    overlay: HashMap<String, Value>,
}

impl<'a> Interpreter<'a> {
    pub(super) fn new(ev: &'a Evaluator, scope: &'a Scope) -> Self {
        Self {
            ev,
            scope,
            overlay: HashMap::new(),
        }
    }

    /// Value of a local. Locals with provenance are re-read from the model so
    /// handlers firing between renders see current data.
    pub(super) fn local_value(&self, local: &Local) -> Value {
        match &local.origin {
            Some(origin) => match self.ev.surface().read_path(origin) {
                Value::Undefined => local.value.clone(),
                live => live,
            },
            None => local.value.clone(),
        }
    }

    pub(super) fn run(&mut self, program: &Program) -> Result<Value, ExprError> {
        let mut last = Value::Undefined;
        for statement in &program.0 {
            last = self.eval(statement)?;
        }
        Ok(last)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(items) => Ok(Value::Array(self.eval_all(items)?)),
            Expr::Object(properties) => {
                let mut map = Object::new();
                for (key, value) in properties {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member(object, prop) => {
                let target = self.eval(object)?;
                let key = self.prop_key(prop)?;
                get_property(&target, &key)
            }
            Expr::Call(callee, args) => self.call(callee, args),
            Expr::Unary(UnaryOp::TypeOf, operand) => {
                // `typeof missing` is "undefined", not a reference error
                match self.eval(operand) {
                    Ok(value) => Ok(Value::from(value.type_of())),
                    Err(err) if err.kind == ExprErrorKind::Reference => {
                        Ok(Value::from("undefined"))
                    }
                    Err(err) => Err(err),
                }
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Coalesce => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign(op, target, value) => {
                let place = self.place_of(target)?;
                let next = match op.binary() {
                    None => self.eval(value)?,
                    Some(bop) => {
                        let current = self.load(&place)?;
                        let rhs = self.eval(value)?;
                        binary(bop, &current, &rhs)
                    }
                };
                self.store(&place, next.clone())?;
                Ok(next)
            }
            Expr::Update {
                target,
                delta,
                prefix,
            } => {
                let place = self.place_of(target)?;
                let old = self.load(&place)?.to_number();
                let new = old + delta;
                self.store(&place, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ExprError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn lookup(&self, name: &str) -> Result<Value, ExprError> {
        if let Some(value) = self.overlay.get(name) {
            return Ok(value.clone());
        }
        if let Some(local) = self.scope.get(name) {
            return Ok(self.local_value(local));
        }
        if self.ev.is_model_key(name) {
            return Ok(self.ev.surface().get(name));
        }
        if name == PARENT {
            return self.parent().map(Reactive::value);
        }
        Err(ExprError::new(
            ExprErrorKind::Reference,
            format!("`{name}` is not defined"),
        ))
    }

    fn parent(&self) -> Result<&Reactive, ExprError> {
        self.ev.parent().ok_or_else(|| {
            ExprError::new(ExprErrorKind::Reference, "`$parent` is not defined")
        })
    }

    fn is_parent_ref(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(name) if name == PARENT && !self.scope.contains(PARENT))
    }

    fn prop_key(&mut self, prop: &Prop) -> Result<String, ExprError> {
        match prop {
            Prop::Named(name) => Ok(name.clone()),
            Prop::Computed(expr) => Ok(self.eval(expr)?.to_display()),
        }
    }

    // -------------------------------------------------------------------------
    // calls
    // -------------------------------------------------------------------------

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, ExprError> {
        if let Expr::Member(object, prop) = callee {
            let receiver = self.eval(object)?;
            let name = self.prop_key(prop)?;
            let args = self.eval_all(args)?;

            if let Some(Value::Function(func)) =
                receiver.as_object().and_then(|map| map.get(&name))
            {
                let this = if self.is_parent_ref(object) {
                    self.parent()?
                } else {
                    self.ev.surface()
                };
                return Ok(func.call(this, &args));
            }
            return builtin_method(&receiver, &name, &args);
        }

        let target = self.eval(callee)?;
        let args = self.eval_all(args)?;
        match target {
            Value::Function(func) => Ok(func.call(self.ev.surface(), &args)),
            other => Err(type_error(format!("{} is not a function", other.type_of()))),
        }
    }

    // -------------------------------------------------------------------------
    // places
    // -------------------------------------------------------------------------

    pub(super) fn place_of(&mut self, expr: &Expr) -> Result<Place, ExprError> {
        match expr {
            Expr::Ident(name) => {
                if self.overlay.contains_key(name) {
                    return Ok(Place::Local(name.clone(), Vec::new()));
                }
                if let Some(local) = self.scope.get(name) {
                    return Ok(match &local.origin {
                        Some(origin) => Place::Model(origin.clone()),
                        None => Place::Local(name.clone(), Vec::new()),
                    });
                }
                if self.ev.is_model_key(name) {
                    return Ok(Place::Model(Path::root().child(name)));
                }
                if name == PARENT {
                    return Err(type_error("`$parent` cannot be reassigned"));
                }
                Ok(Place::Local(name.clone(), Vec::new()))
            }
            Expr::Member(object, prop) => {
                let key = self.prop_key(prop)?;
                if self.is_parent_ref(object) {
                    return Ok(Place::Parent(Path::root().child(&key)));
                }
                Ok(match self.place_of(object)? {
                    Place::Model(path) => Place::Model(path.child(&key)),
                    Place::Parent(path) => Place::Parent(path.child(&key)),
                    Place::Local(name, mut segments) => {
                        segments.push(key);
                        Place::Local(name, segments)
                    }
                })
            }
            _ => Err(ExprError::new(
                ExprErrorKind::Syntax,
                "invalid assignment target",
            )),
        }
    }

    fn load(&self, place: &Place) -> Result<Value, ExprError> {
        match place {
            Place::Model(path) => Ok(self.ev.surface().read_path(path)),
            Place::Parent(path) => Ok(self.parent()?.read_path(path)),
            Place::Local(name, segments) => {
                let base = self.lookup(name)?;
                Ok(segments
                    .iter()
                    .try_fold(&base, |current, segment| current.get(segment))
                    .cloned()
                    .unwrap_or_default())
            }
        }
    }

    pub(super) fn store(&mut self, place: &Place, value: Value) -> Result<(), ExprError> {
        match place {
            Place::Model(path) => {
                self.ev.surface().write_path(path, value)?;
            }
            Place::Parent(path) => {
                self.parent()?.write_path(path, value)?;
            }
            Place::Local(name, segments) if segments.is_empty() => {
                self.overlay.insert(name.clone(), value);
            }
            Place::Local(name, segments) => {
                let mut base = self.lookup(name)?;
                set_nested(&mut base, segments, value)?;
                self.overlay.insert(name.clone(), base);
            }
        }
        Ok(())
    }
}

fn set_nested(root: &mut Value, segments: &[String], value: Value) -> Result<(), ExprError> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut current = root;
    for segment in parents {
        current = current
            .get_mut(segment)
            .ok_or_else(|| type_error(format!("cannot set property of undefined `{segment}`")))?;
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items[index] = value;
                Ok(())
            }
            Ok(index) if index == items.len() => {
                items.push(value);
                Ok(())
            }
            _ => Err(type_error(format!("invalid index `{last}`"))),
        },
        other => Err(type_error(format!(
            "cannot set property `{last}` on {}",
            other.type_of()
        ))),
    }
}

// =============================================================================
// Builtins
// =============================================================================

fn get_property(target: &Value, key: &str) -> Result<Value, ExprError> {
    match target {
        Value::Undefined | Value::Null => Err(type_error(format!(
            "cannot read property `{key}` of {}",
            if matches!(target, Value::Null) { "null" } else { "undefined" }
        ))),
        Value::String(s) => Ok(match key {
            "length" => Value::from(s.chars().count()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default(),
        }),
        Value::Array(items) if key == "length" => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(match map.get(key) {
            Some(value) => value.clone(),
            None if key == "length" => Value::from(map.len()),
            None => Value::Undefined,
        }),
        other => Ok(other.get(key).cloned().unwrap_or_default()),
    }
}

fn builtin_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

    match receiver {
        Value::String(s) => {
            let needle = arg(0).to_display();
            Ok(match name {
                "toUpperCase" => Value::from(s.to_uppercase()),
                "toLowerCase" => Value::from(s.to_lowercase()),
                "trim" => Value::from(s.trim()),
                "includes" => Value::Bool(s.contains(&needle)),
                "startsWith" => Value::Bool(s.starts_with(&needle)),
                "endsWith" => Value::Bool(s.ends_with(&needle)),
                _ => return Err(type_error(format!("string.{name} is not a function"))),
            })
        }
        Value::Array(items) => {
            let needle = arg(0);
            Ok(match name {
                "includes" => Value::Bool(items.contains(&needle)),
                "indexOf" => match items.iter().position(|item| *item == needle) {
                    Some(index) => Value::from(index),
                    None => Value::from(-1),
                },
                "join" => {
                    let separator = match needle {
                        Value::Undefined => ",".to_string(),
                        other => other.to_display(),
                    };
                    Value::from(
                        items
                            .iter()
                            .map(Value::to_display)
                            .collect::<Vec<_>>()
                            .join(&separator),
                    )
                }
                _ => return Err(type_error(format!("array.{name} is not a function"))),
            })
        }
        other => Err(type_error(format!(
            "{}.{name} is not a function",
            other.type_of()
        ))),
    }
}

// =============================================================================
// Operators
// =============================================================================

fn concatenates(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Array(_) | Value::Object(_))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add if concatenates(left) || concatenates(right) => {
            Value::String(left.to_display() + &right.to_display())
        }
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::LooseEq => Value::Bool(loose_eq(left, right)),
        BinaryOp::LooseNe => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNe => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(a), Value::String(_)) => *a == right.to_number(),
        (Value::String(_), Value::Number(b)) => left.to_number() == *b,
        (Value::Bool(_), _) => loose_eq(&Value::Number(left.to_number()), right),
        (_, Value::Bool(_)) => loose_eq(left, &Value::Number(right.to_number())),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::Mode;
    use super::*;
    use crate::engine::{Model, ModelDefinition};
    use crate::state::diagnostics::Diagnostics;

    fn eval(src: &str) -> Value {
        let model = Model::new(
            ModelDefinition::from_json(serde_json::json!({
                "name": "  Ada  ",
                "tags": ["a", "b"],
                "user": {"first": "Ada", "age": 36},
                "count": 2
            }))
            .method("double", |_, args| {
                Value::Number(args.first().map(Value::to_number).unwrap_or(0.0) * 2.0)
            }),
        )
        .unwrap();
        let ev = Evaluator::new(
            model.surface().clone(),
            model.keys().clone(),
            Diagnostics::new(8),
        );
        ev.try_evaluate(src, &Scope::new(), Mode::Statement)
            .unwrap_or_else(|err| panic!("`{src}` failed: {err}"))
    }

    #[test]
    fn test_string_concatenation_and_arithmetic() {
        assert_eq!(eval("'n=' + count"), Value::from("n=2"));
        assert_eq!(eval("count + 1"), Value::from(3));
        assert_eq!(eval("7 % 4"), Value::from(3));
        assert_eq!(eval("-count * 2"), Value::from(-4));
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert_eq!(eval("count == '2'"), Value::Bool(true));
        assert_eq!(eval("count === '2'"), Value::Bool(false));
        assert_eq!(eval("null == undefined"), Value::Bool(true));
        assert_eq!(eval("null === undefined"), Value::Bool(false));
        assert_eq!(eval("1 == true"), Value::Bool(true));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(eval("0 || 'fallback'"), Value::from("fallback"));
        assert_eq!(eval("'x' && count"), Value::from(2));
        assert_eq!(eval("0 ?? 5"), Value::from(0));
        assert_eq!(eval("user.missing ?? 5"), Value::from(5));
    }

    #[test]
    fn test_ternary_and_comparison() {
        assert_eq!(eval("count > 1 ? 'many' : 'few'"), Value::from("many"));
        assert_eq!(eval("'b' < 'a'"), Value::Bool(false));
    }

    #[test]
    fn test_builtin_members() {
        assert_eq!(eval("name.trim()"), Value::from("Ada"));
        assert_eq!(eval("name.trim().toUpperCase()"), Value::from("ADA"));
        assert_eq!(eval("tags.length"), Value::from(2));
        assert_eq!(eval("user.length"), Value::from(2));
        assert_eq!(eval("tags.includes('b')"), Value::Bool(true));
        assert_eq!(eval("tags.indexOf('z')"), Value::from(-1));
        assert_eq!(eval("tags.join(' / ')"), Value::from("a / b"));
        assert_eq!(eval("user['first'].startsWith('A')"), Value::Bool(true));
    }

    #[test]
    fn test_typeof_tolerates_unknown_identifiers() {
        assert_eq!(eval("typeof nothing"), Value::from("undefined"));
        assert_eq!(eval("typeof count"), Value::from("number"));
        assert_eq!(eval("typeof double"), Value::from("function"));
    }

    #[test]
    fn test_method_call_receives_arguments() {
        assert_eq!(eval("double(count + 1)"), Value::from(6));
    }

    #[test]
    fn test_array_and_object_literals() {
        assert_eq!(
            eval("[1, 'two', count]"),
            Value::Array(vec![1.into(), "two".into(), 2.into()])
        );
        assert_eq!(
            eval("{ active: count > 1, 'is-big': false }"),
            Value::from(serde_json::json!({"active": true, "is-big": false}))
        );
    }

    #[test]
    fn test_transient_nested_assignment() {
        assert_eq!(eval("o = {a: {b: 1}}; o.a.b += 2; o.a.b"), Value::from(3));
    }

    #[test]
    fn test_member_of_null_is_type_error() {
        let model = Model::new(ModelDefinition::new().data("nothing", Value::Null)).unwrap();
        let ev = Evaluator::new(
            model.surface().clone(),
            model.keys().clone(),
            Diagnostics::new(8),
        );
        let err = ev
            .try_evaluate("nothing.field", &Scope::new(), Mode::Expression)
            .unwrap_err();
        assert_eq!(err.kind, ExprErrorKind::Type);
    }

    #[test]
    fn test_calling_a_number_is_type_error() {
        let model = Model::new(ModelDefinition::new().data("count", 1)).unwrap();
        let ev = Evaluator::new(
            model.surface().clone(),
            model.keys().clone(),
            Diagnostics::new(8),
        );
        let err = ev
            .try_evaluate("count()", &Scope::new(), Mode::Expression)
            .unwrap_err();
        assert_eq!(err.kind, ExprErrorKind::Type);
    }
}
