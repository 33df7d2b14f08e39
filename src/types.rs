//! Core types for spark-bind.
//!
//! These types define the foundation that everything builds on.
//! Model data flows through the reactive layer as [`Value`]s addressed by
//! [`Path`]s; bound callables are [`Callable`]s.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::engine::Reactive;

/// Ordered property map. Iteration follows insertion order.
pub type Object = IndexMap<String, Value>;

// =============================================================================
// Callable
// =============================================================================

/// Native function signature for bound callables.
///
/// The first argument is the reactive surface of the unit the callable is
/// invoked from, so methods can read and write the model through it.
pub type NativeFn = dyn Fn(&Reactive, &[Value]) -> Value;

/// A named, bound callable stored in the model.
///
/// Equality is identity: two callables are equal only if they share the same
/// function allocation.
#[derive(Clone)]
pub struct Callable {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl Callable {
    /// Create a callable from a closure.
    pub fn new(name: &str, func: impl Fn(&Reactive, &[Value]) -> Value + 'static) -> Self {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    /// Name the callable was declared with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with `this` bound to the given surface.
    pub fn call(&self, this: &Reactive, args: &[Value]) -> Value {
        (self.func)(this, args)
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.func, &b.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

// =============================================================================
// Opaque
// =============================================================================

/// Host reference the reactive layer never looks into.
///
/// Opaque values are stored and returned verbatim and are never wrapped.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Rc<dyn Any>,
}

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Rc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A model value.
///
/// Plain objects are the only values the reactive layer wraps; everything
/// else (including sequences) is treated as a scalar.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    Function(Callable),
    Opaque(Opaque),
}

impl Value {
    /// Empty plain object.
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    /// True for plain objects (the only wrappable kind).
    #[inline]
    pub fn is_plain_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Truthiness with script semantics: `false`, `0`, `NaN`, `""`, `null`
    /// and `undefined` are falsy; every container is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Opaque(_) => true,
        }
    }

    /// Numeric coercion used by arithmetic and relational operators.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) if items.is_empty() => 0.0,
            Value::Array(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// Text form used for moustache substitution and attribute values.
    ///
    /// `null` and `undefined` render as the empty string.
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_display)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
            Value::Function(f) => format!("function {}()", f.name()),
            Value::Opaque(o) => format!("[opaque {}]", o.type_name()),
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Opaque(_) => "object",
        }
    }

    /// Own property lookup for objects (by key) and arrays (by index).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Mutable own property lookup.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Object(map) => map.get_mut(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        }
    }

    /// Lookup along a path of segments.
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(self, |current, segment| current.get(segment))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Format a number the way script engines print it (`1` not `1.0`).
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Callable::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Opaque::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Number(_) => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Function(f) => serializer.serialize_str(&format!("function {}()", f.name())),
            Value::Opaque(o) => serializer.serialize_str(&format!("[opaque {}]", o.type_name())),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl From<Callable> for Value {
    fn from(f: Callable) -> Self {
        Value::Function(f)
    }
}

// =============================================================================
// Path
// =============================================================================

/// Ordered property-name segments from the model root to a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path (model root).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path (`"obj.sub.a"`).
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// This path extended by one segment.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    /// This path extended by several segments.
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Split into (parent segments, last segment).
    pub fn split_last(&self) -> Option<(&str, &[String])> {
        self.0
            .split_last()
            .map(|(last, parents)| (last.as_str(), parents))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

// =============================================================================
// Tests
// =============================================================================
